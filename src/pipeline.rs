//! Preprocessing + classifier as a single fit/predict unit

use crate::data::{CustomerRecord, FeatureSchema};
use crate::error::{ChurnError, Result};
use crate::preprocessing::FeaturePreprocessor;
use crate::training::{Classifier, ModelKind};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Fitted feature transform followed by a classifier.
///
/// The preprocessor is always fitted on exactly the records the classifier
/// is fitted on, so cross-validation folds never see statistics from their
/// held-out rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnPipeline {
    preprocessor: FeaturePreprocessor,
    classifier: Classifier,
}

impl ChurnPipeline {
    pub fn new(schema: FeatureSchema, classifier: Classifier) -> Self {
        Self {
            preprocessor: FeaturePreprocessor::new(schema),
            classifier,
        }
    }

    /// Fit the preprocessor and the classifier on the same records
    pub fn fit(&mut self, records: &[CustomerRecord], labels: &Array1<f64>) -> Result<&mut Self> {
        if records.len() != labels.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} labels", records.len()),
                actual: format!("{} labels", labels.len()),
            });
        }
        let x = self.preprocessor.fit_transform(records)?;
        self.classifier.fit(&x, labels)?;
        Ok(self)
    }

    /// Churn probability for each record
    pub fn predict_proba(&self, records: &[CustomerRecord]) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ChurnError::ModelNotFitted);
        }
        let x = self.preprocessor.transform(records)?;
        self.classifier.predict_proba(&x)
    }

    pub fn kind(&self) -> ModelKind {
        self.classifier.kind()
    }

    pub fn preprocessor(&self) -> &FeaturePreprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Expanded model input column names
    pub fn feature_names(&self) -> Vec<String> {
        self.preprocessor.feature_names()
    }

    pub fn is_fitted(&self) -> bool {
        self.preprocessor.is_fitted() && self.classifier.is_fitted()
    }
}

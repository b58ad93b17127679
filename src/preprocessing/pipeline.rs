//! Column transformer for customer records

use crate::data::{CustomerRecord, FeatureSchema, FeatureValue};
use crate::error::{ChurnError, Result};
use super::{encoder::OneHotEncoder, scaler::StandardScaler};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Feature preprocessor: standard-scaled numeric columns followed by
/// one-hot blocks of the categorical columns.
///
/// Column roles come from the schema. Output layout is fixed at fit time:
/// numeric columns in schema order, then each categorical column's sorted
/// categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePreprocessor {
    schema: FeatureSchema,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    is_fitted: bool,
}

impl FeaturePreprocessor {
    pub fn new(schema: FeatureSchema) -> Self {
        let numeric_columns = schema.numeric_columns().into_iter().map(String::from).collect();
        let categorical_columns = schema.categorical_columns().into_iter().map(String::from).collect();
        Self {
            schema,
            numeric_columns,
            categorical_columns,
            scaler: StandardScaler::new(),
            encoder: OneHotEncoder::new(),
            is_fitted: false,
        }
    }

    /// Learn scaling parameters and category sets from training records
    pub fn fit(&mut self, records: &[CustomerRecord]) -> Result<&mut Self> {
        let start = Instant::now();
        if records.is_empty() {
            return Err(ChurnError::PreprocessingError(
                "cannot fit preprocessor on an empty record set".to_string(),
            ));
        }

        let numeric = self.numeric_matrix(records)?;
        let categorical = self.categorical_rows(records)?;

        let num_cols: Vec<&str> = self.numeric_columns.iter().map(String::as_str).collect();
        let cat_cols: Vec<&str> = self.categorical_columns.iter().map(String::as_str).collect();
        self.scaler.fit(&num_cols, &numeric)?;
        self.encoder.fit(&cat_cols, &categorical)?;
        self.is_fitted = true;

        debug!(
            rows = records.len(),
            features_out = self.n_features_out(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Preprocessor fitted"
        );
        Ok(self)
    }

    /// Transform records into the model feature matrix
    pub fn transform(&self, records: &[CustomerRecord]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        let numeric = self.scaler.transform(&self.numeric_matrix(records)?)?;
        let categorical = self.encoder.transform(&self.categorical_rows(records)?)?;
        concatenate(Axis(1), &[numeric.view(), categorical.view()]).map_err(ChurnError::from)
    }

    pub fn fit_transform(&mut self, records: &[CustomerRecord]) -> Result<Array2<f64>> {
        self.fit(records)?;
        self.transform(records)
    }

    /// Output column names, numeric first, then `column=category`
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric_columns.clone();
        names.extend(self.encoder.feature_names());
        names
    }

    pub fn n_features_out(&self) -> usize {
        self.numeric_columns.len() + self.encoder.n_outputs()
    }

    /// Categories learned for a categorical column
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.encoder.categories(column)
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn numeric_matrix(&self, records: &[CustomerRecord]) -> Result<Array2<f64>> {
        let n_cols = self.numeric_columns.len();
        let mut out = Array2::zeros((records.len(), n_cols));
        for (i, record) in records.iter().enumerate() {
            for (j, name) in self.numeric_columns.iter().enumerate() {
                match record.value(name) {
                    Some(FeatureValue::Number(v)) => out[[i, j]] = v,
                    _ => {
                        return Err(ChurnError::PreprocessingError(format!(
                            "column '{}' is not a numeric customer attribute",
                            name
                        )))
                    }
                }
            }
        }
        Ok(out)
    }

    fn categorical_rows<'a>(&self, records: &'a [CustomerRecord]) -> Result<Vec<Vec<&'a str>>> {
        records
            .iter()
            .map(|record| {
                self.categorical_columns
                    .iter()
                    .map(|name| match record.value(name) {
                        Some(FeatureValue::Category(s)) => Ok(s),
                        _ => Err(ChurnError::PreprocessingError(format!(
                            "column '{}' is not a categorical customer attribute",
                            name
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }
}

impl Default for FeaturePreprocessor {
    fn default() -> Self {
        Self::new(FeatureSchema::telco())
    }
}

//! Dataset loading
//!
//! Reads the churn CSV with polars, every column as a string, so that
//! numeric coercion and label mapping are explicit and every rejected cell
//! is reported with its row and column.

use crate::error::{ChurnError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use super::schema::{CustomerRecord, FeatureSchema, OwnedValue, ID_COLUMN, LABEL_COLUMN};

/// Number of dropped customer ids echoed into the log
const DROPPED_ID_SAMPLE: usize = 10;

/// Labeled customer dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Customer identifiers, aligned with `records`
    pub ids: Vec<String>,
    pub records: Vec<CustomerRecord>,
    /// Churn labels encoded as 0.0 / 1.0
    pub labels: Array1<f64>,
    /// Rows removed because a coerced column was missing or non-numeric
    pub dropped_rows: usize,
    pub dropped_ids: Vec<String>,
}

impl Dataset {
    /// Build a dataset from in-memory records
    pub fn from_records(records: Vec<CustomerRecord>, labels: Vec<f64>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} labels", records.len()),
                actual: format!("{} labels", labels.len()),
            });
        }
        if let Some(bad) = labels.iter().find(|&&l| l != 0.0 && l != 1.0) {
            return Err(ChurnError::ValidationError(format!("labels must be 0 or 1, got {}", bad)));
        }
        let ids = (0..records.len()).map(|i| format!("row-{}", i + 1)).collect();
        Ok(Self {
            ids,
            records,
            labels: Array1::from_vec(labels),
            dropped_rows: 0,
            dropped_ids: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count of (negative, positive) labels
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.labels.iter().filter(|&&l| l > 0.5).count();
        (self.labels.len() - positives, positives)
    }

    /// Records and labels at the given row indices
    pub fn subset(&self, indices: &[usize]) -> (Vec<CustomerRecord>, Array1<f64>) {
        let records = indices.iter().map(|&i| self.records[i].clone()).collect();
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        (records, labels)
    }
}

/// CSV loader for churn datasets
pub struct DataLoader {
    schema: FeatureSchema,
    /// Numeric columns whose unparseable cells count as missing (row dropped)
    coerce_columns: Vec<String>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a loader for the Telco schema
    pub fn new() -> Self {
        Self {
            schema: FeatureSchema::telco(),
            coerce_columns: vec!["TotalCharges".to_string()],
        }
    }

    /// Use a different feature schema
    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Load and validate a labeled dataset from CSV
    pub fn load_dataset(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let start = Instant::now();
        let df = self.read_csv(path)?;
        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            "Read dataset"
        );

        let dataset = self.dataset_from_frame(&df)?;
        let (negatives, positives) = dataset.class_counts();
        info!(
            rows = dataset.len(),
            dropped_rows = dataset.dropped_rows,
            churned = positives,
            retained = negatives,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset loaded"
        );
        Ok(dataset)
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            ChurnError::DataError(format!("cannot open dataset {}: {}", path.display(), e))
        })?;

        // Schema inference disabled: every column arrives as a string.
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| ChurnError::DataError(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Convert a string-typed frame into a dataset
    pub fn dataset_from_frame(&self, df: &DataFrame) -> Result<Dataset> {
        let mut required: Vec<&str> = vec![ID_COLUMN];
        required.extend(self.schema.column_names());
        required.push(LABEL_COLUMN);

        let missing: Vec<String> = required
            .iter()
            .filter(|name| df.column(name).is_err())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ChurnError::MissingColumns(missing));
        }

        let ids = string_column(df, ID_COLUMN)?;
        let labels_raw = string_column(df, LABEL_COLUMN)?;
        let features: Vec<Vec<Option<String>>> = self
            .schema
            .columns()
            .iter()
            .map(|spec| string_column(df, &spec.name))
            .collect::<Result<_>>()?;

        let mut out_ids = Vec::with_capacity(df.height());
        let mut records = Vec::with_capacity(df.height());
        let mut labels = Vec::with_capacity(df.height());
        let mut dropped_ids = Vec::new();
        let mut off_vocabulary: BTreeMap<String, usize> = BTreeMap::new();

        'rows: for row in 0..df.height() {
            // 1-based data row, header excluded
            let line = row + 1;
            let id = ids[row].clone().unwrap_or_default();

            for (spec, column) in self.schema.columns().iter().zip(&features) {
                if !self.coerce_columns.contains(&spec.name) {
                    continue;
                }
                // Range checks still apply below; only absent numbers drop the row
                let missing = match column[row].as_deref().map(str::trim) {
                    None | Some("") => true,
                    Some(raw) => raw.parse::<f64>().is_err(),
                };
                if missing {
                    dropped_ids.push(id);
                    continue 'rows;
                }
            }

            let label = match labels_raw[row].as_deref().map(str::trim) {
                Some("Yes") => 1.0,
                Some("No") => 0.0,
                other => {
                    return Err(ChurnError::InvalidLabel {
                        row: line,
                        value: other.unwrap_or("<null>").to_string(),
                    })
                }
            };

            let mut record = CustomerRecord::default();
            for (spec, column) in self.schema.columns().iter().zip(&features) {
                let raw = column[row].as_deref().ok_or_else(|| ChurnError::InvalidValue {
                    column: spec.name.clone(),
                    row: line,
                    value: "<null>".to_string(),
                })?;
                let value = spec.parse_text(raw).map_err(|_| ChurnError::InvalidValue {
                    column: spec.name.clone(),
                    row: line,
                    value: raw.to_string(),
                })?;
                if let OwnedValue::Category(ref category) = value {
                    if !spec.allows(category) {
                        *off_vocabulary.entry(spec.name.clone()).or_insert(0) += 1;
                    }
                }
                if !record.set(&spec.name, value) {
                    return Err(ChurnError::DataError(format!(
                        "column {} is not a customer attribute",
                        spec.name
                    )));
                }
            }

            out_ids.push(id);
            records.push(record);
            labels.push(label);
        }

        if !dropped_ids.is_empty() {
            warn!(
                dropped_rows = dropped_ids.len(),
                columns = ?self.coerce_columns,
                sample_ids = ?dropped_ids.iter().take(DROPPED_ID_SAMPLE).collect::<Vec<_>>(),
                "Dropped rows with missing or non-numeric values"
            );
        }
        for (column, count) in &off_vocabulary {
            warn!(
                column = %column,
                rows = count,
                "Categorical values outside the declared vocabulary; the prediction service will reject them"
            );
        }

        Ok(Dataset {
            ids: out_ids,
            records,
            labels: Array1::from_vec(labels),
            dropped_rows: dropped_ids.len(),
            dropped_ids,
        })
    }
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| ChurnError::MissingColumns(vec![name.to_string()]))?;
    let series = column.as_materialized_series();
    let ca = series
        .str()
        .map_err(|e| ChurnError::DataError(format!("column {}: {}", name, e)))?;
    Ok(ca.into_iter().map(|v| v.map(|s| s.to_string())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,PhoneService,MultipleLines,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,StreamingTV,StreamingMovies,Contract,PaperlessBilling,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

    fn write_csv(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_load_valid_rows() {
        let file = write_csv(&[
            HEADER,
            "7590-VHVEG,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No",
            "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,Yes",
        ]);
        let dataset = DataLoader::new().load_dataset(file.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels.to_vec(), vec![0.0, 1.0]);
        assert_eq!(dataset.ids[0], "7590-VHVEG");
        assert_eq!(dataset.records[1].payment_method, "Mailed check");
        assert_eq!(dataset.records[1].tenure, 2);
        assert_eq!(dataset.dropped_rows, 0);
    }

    #[test]
    fn test_blank_total_charges_dropped_and_counted() {
        let file = write_csv(&[
            HEADER,
            "4472-LVYGI,Female,0,Yes,Yes,0,No,No phone service,DSL,Yes,No,Yes,Yes,Yes,No,Two year,Yes,Bank transfer (automatic),52.55, ,No",
            "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,Yes",
        ]);
        let dataset = DataLoader::new().load_dataset(file.path()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.dropped_rows, 1);
        assert_eq!(dataset.dropped_ids, vec!["4472-LVYGI".to_string()]);
    }

    #[test]
    fn test_negative_total_charges_is_an_error() {
        let file = write_csv(&[
            HEADER,
            "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,-5,Yes",
        ]);
        let err = DataLoader::new().load_dataset(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ChurnError::InvalidValue { ref column, row: 1, ref value } if column == "TotalCharges" && value == "-5"
        ));
    }

    #[test]
    fn test_non_numeric_total_charges_dropped() {
        let file = write_csv(&[
            HEADER,
            "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,n/a,Yes",
        ]);
        let dataset = DataLoader::new().load_dataset(file.path()).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.dropped_rows, 1);
    }

    #[test]
    fn test_invalid_label_rejected() {
        let file = write_csv(&[
            HEADER,
            "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,Maybe",
        ]);
        let err = DataLoader::new().load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, ChurnError::InvalidLabel { row: 1, ref value } if value == "Maybe"));
    }

    #[test]
    fn test_missing_columns_reported() {
        let file = write_csv(&["customerID,gender,Churn", "0001,Female,No"]);
        let err = DataLoader::new().load_dataset(file.path()).unwrap_err();
        match err {
            ChurnError::MissingColumns(cols) => {
                assert!(cols.contains(&"tenure".to_string()));
                assert!(!cols.contains(&"gender".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unparseable_tenure_is_an_error() {
        let file = write_csv(&[
            HEADER,
            "3668-QPYBK,Male,0,No,No,two,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,Yes",
        ]);
        let err = DataLoader::new().load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, ChurnError::InvalidValue { ref column, row: 1, .. } if column == "tenure"));
    }

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new().load_dataset("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, ChurnError::DataError(_)));
    }

    #[test]
    fn test_from_records_rejects_bad_labels() {
        let err = Dataset::from_records(vec![CustomerRecord::default()], vec![2.0]).unwrap_err();
        assert!(matches!(err, ChurnError::ValidationError(_)));
    }
}

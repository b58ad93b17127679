//! Integration test: CSV loading and preprocessing on generated data

mod common;

use kolosal_churn::data::{DataLoader, FeatureSchema};
use kolosal_churn::error::ChurnError;
use kolosal_churn::preprocessing::FeaturePreprocessor;
use kolosal_churn::training::stratified_train_test_split;

#[test]
fn test_generated_csv_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("customers.csv");
    common::write_csv(&path, 120, 3, 9);

    let dataset = DataLoader::new().load_dataset(&path).unwrap();
    // 120 generated customers plus the anchor record
    assert_eq!(dataset.len(), 121);
    assert_eq!(dataset.dropped_rows, 3);
    assert_eq!(dataset.dropped_ids, vec!["0000-NEW", "0001-NEW", "0002-NEW"]);
    assert_eq!(dataset.ids.len(), dataset.records.len());

    let (expected_records, expected_labels) = common::synthetic_records(120, 9);
    assert_eq!(dataset.records, expected_records);
    assert_eq!(dataset.labels.to_vec(), expected_labels);
}

#[test]
fn test_bad_label_names_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("customers.csv");
    common::write_csv(&path, 10, 0, 2);
    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = text.lines().map(String::from).collect();
    let last = lines.len() - 1;
    let row = lines[last].rsplit_once(',').unwrap().0.to_string();
    lines[last] = format!("{},Maybe", row);
    std::fs::write(&path, lines.join("\n")).unwrap();

    match DataLoader::new().load_dataset(&path) {
        Err(ChurnError::InvalidLabel { row, value }) => {
            assert_eq!(row, last);
            assert_eq!(value, "Maybe");
        }
        other => panic!("expected InvalidLabel, got {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn test_missing_label_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unlabeled.csv");
    let header = common::HEADER.trim_end_matches(",Churn");
    std::fs::write(&path, format!("{}\n", header)).unwrap();

    let err = DataLoader::new().load_dataset(&path).unwrap_err();
    assert!(matches!(err, ChurnError::MissingColumns(ref cols) if cols == &["Churn".to_string()]));
}

#[test]
fn test_split_and_preprocess_without_leakage() {
    let dataset = common::synthetic_dataset(200, 4);
    let (train_idx, test_idx) = stratified_train_test_split(&dataset.labels, 0.2, 42).unwrap();
    let (train, _) = dataset.subset(&train_idx);
    let (test, _) = dataset.subset(&test_idx);

    let mut pre = FeaturePreprocessor::new(FeatureSchema::telco());
    let x_train = pre.fit_transform(&train).unwrap();
    let x_test = pre.transform(&test).unwrap();
    assert_eq!(x_train.ncols(), x_test.ncols());
    assert_eq!(x_train.ncols(), pre.feature_names().len());

    // Scaled numeric columns are centered on the training rows only
    let n_numeric = FeatureSchema::telco().numeric_columns().len();
    for j in 0..n_numeric {
        let mean = x_train.column(j).mean().unwrap();
        assert!(mean.abs() < 1e-9, "column {} mean {}", j, mean);
    }
}

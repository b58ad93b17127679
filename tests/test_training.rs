//! Integration test: training run, selection and artifact round trip

mod common;

use kolosal_churn::artifact::ChurnArtifact;
use kolosal_churn::data::{DataLoader, Dataset};
use kolosal_churn::error::ChurnError;
use kolosal_churn::inference::ChurnPredictor;
use kolosal_churn::training::{select_best, TrainEngine, TrainingConfig};
use serde_json::Value;
use std::path::Path;

#[test]
fn test_fit_dataset_reports_every_candidate() {
    let dataset = common::synthetic_dataset(400, 11);
    let (artifact, report) = TrainEngine::new(common::fast_config()).fit_dataset(&dataset).unwrap();

    let names: Vec<&str> = report.candidates.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["logreg", "random_forest", "gradient_boosting"]);
    assert_eq!(report.n_train + report.n_test, dataset.len());

    for c in &report.candidates {
        assert!((0.0..=1.0).contains(&c.cv_roc_auc), "{}: {}", c.name(), c.cv_roc_auc);
        assert!(c.test_roc_auc > 0.75, "{} test auc {}", c.name(), c.test_roc_auc);
        assert_eq!(
            c.classification_report.classes[0].support + c.classification_report.classes[1].support,
            report.n_test
        );
    }

    assert_eq!(artifact.metadata.model_name, report.winner);
    assert_eq!(artifact.pipeline.kind().name(), report.winner);
    assert_eq!(artifact.metadata.n_train, report.n_train);
    assert_eq!(artifact.metadata.seed, 42);
}

#[test]
fn test_winner_is_highest_test_auc() {
    let dataset = common::synthetic_dataset(400, 3);
    let (_, report) = TrainEngine::new(common::fast_config()).fit_dataset(&dataset).unwrap();

    let (best, score) = select_best(&report.test_scores).unwrap();
    assert_eq!(report.winner, best);
    assert_eq!(report.winner_test_roc_auc, score);
    assert!(report.candidates.iter().all(|c| c.test_roc_auc <= score));
}

#[test]
fn test_training_is_deterministic() {
    let dataset = common::synthetic_dataset(300, 5);
    let engine = TrainEngine::new(common::fast_config());
    let (first, first_report) = engine.fit_dataset(&dataset).unwrap();
    let (second, second_report) = engine.fit_dataset(&dataset).unwrap();

    assert_eq!(first_report.winner, second_report.winner);
    assert_eq!(first_report.test_scores, second_report.test_scores);

    let (probe, _) = common::synthetic_records(50, 999);
    let a = first.pipeline.predict_proba(&probe).unwrap();
    let b = second.pipeline.predict_proba(&probe).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_different_seed_changes_split() {
    let dataset = common::synthetic_dataset(300, 5);
    let (_, a) = TrainEngine::new(common::fast_config()).fit_dataset(&dataset).unwrap();
    let (_, b) = TrainEngine::new(common::fast_config().with_random_seed(7))
        .fit_dataset(&dataset)
        .unwrap();
    assert_eq!(a.n_test, b.n_test);
    assert_ne!(a.test_scores, b.test_scores);
}

#[test]
fn test_single_class_dataset_rejected() {
    let (records, _) = common::synthetic_records(60, 1);
    let labels = vec![0.0; records.len()];
    let dataset = Dataset::from_records(records, labels).unwrap();
    let err = TrainEngine::new(common::fast_config()).fit_dataset(&dataset).unwrap_err();
    assert!(matches!(err, ChurnError::TrainingError(_)), "{err}");
}

#[test]
fn test_invalid_config_rejected_before_loading() {
    let config = common::fast_config()
        .with_data_path("does/not/exist.csv")
        .with_test_size(1.5);
    let err = TrainEngine::new(config).run().unwrap_err();
    assert!(matches!(err, ChurnError::InvalidParameter { .. }));
}

#[test]
fn test_unreadable_dataset_is_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::fast_config()
        .with_data_path(dir.path().join("missing.csv"))
        .with_artifact_path(dir.path().join("model.json"));
    let err = TrainEngine::new(config).run().unwrap_err();
    assert!(matches!(err, ChurnError::DataError(_)));
    assert!(!dir.path().join("model.json").exists());
}

#[test]
fn test_run_writes_loadable_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("customers.csv");
    let model = dir.path().join("out").join("churn_model.json");
    common::write_csv(&data, 300, 4, 21);

    let config = common::fast_config().with_data_path(&data).with_artifact_path(&model);
    let report = TrainEngine::new(config).run().unwrap();
    assert_eq!(report.dropped_rows, 4);
    assert_eq!(report.artifact_path.as_deref(), Some(model.as_path()));

    let artifact = ChurnArtifact::load(&model).unwrap();
    assert_eq!(artifact.metadata.model_name, report.winner);
    assert_eq!(artifact.metadata.dropped_rows, 4);
    assert_eq!(artifact.metadata.candidate_scores, report.test_scores);
    assert_eq!(artifact.metadata.crate_version, kolosal_churn::VERSION);

    // No temporary file is left next to the artifact
    let leftovers: Vec<_> = std::fs::read_dir(model.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    let predictor = ChurnPredictor::load(&model).unwrap();
    let dataset = DataLoader::new().load_dataset(&data).unwrap();
    for p in predictor.predict_batch(&dataset.records[..50]).unwrap() {
        assert!((0.0..=1.0).contains(&p.churn_probability));
        assert_eq!(p.churn_prediction == 1, p.churn_probability >= predictor.threshold());
    }
}

#[test]
fn test_save_overwrites_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn_model.json");
    std::fs::write(&path, b"stale").unwrap();

    common::trained_artifact().save(&path).unwrap();
    let loaded = ChurnArtifact::load(&path).unwrap();
    assert_eq!(loaded.metadata, common::trained_artifact().metadata);
}

#[test]
fn test_failed_save_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    // A non-empty directory cannot be replaced by the rename
    let path = dir.path().join("churn_model.json");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("keep"), b"x").unwrap();

    let err = common::trained_artifact().save(&path).unwrap_err();
    assert!(matches!(err, ChurnError::ArtifactError(_)), "{err}");

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["churn_model.json".to_string()]);
}

#[test]
fn test_reloaded_artifact_predicts_like_original() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn_model.json");
    let original = common::trained_artifact();
    original.save(&path).unwrap();
    let loaded = ChurnArtifact::load(&path).unwrap();

    let (probe, _) = common::synthetic_records(40, 123);
    let a = original.pipeline.predict_proba(&probe).unwrap();
    let b = loaded.pipeline.predict_proba(&probe).unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() < 1e-9, "{} vs {}", x, y);
    }
}

fn rewrite_artifact(path: &Path, edit: impl FnOnce(&mut Value)) {
    let mut doc: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    edit(&mut doc);
    std::fs::write(path, serde_json::to_vec(&doc).unwrap()).unwrap();
}

#[test]
fn test_reordered_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn_model.json");
    common::trained_artifact().save(&path).unwrap();

    rewrite_artifact(&path, |doc| {
        doc["schema"]["columns"].as_array_mut().unwrap().swap(0, 1);
    });
    let err = ChurnArtifact::load(&path).unwrap_err();
    assert!(matches!(err, ChurnError::SchemaMismatch(_)), "{err}");
    assert!(ChurnPredictor::load(&path).is_err());
}

#[test]
fn test_unsupported_format_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn_model.json");
    common::trained_artifact().save(&path).unwrap();

    rewrite_artifact(&path, |doc| doc["format_version"] = Value::from(99));
    let err = ChurnArtifact::load(&path).unwrap_err();
    assert!(matches!(err, ChurnError::SchemaMismatch(_)));
}

#[test]
fn test_missing_or_corrupt_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let missing = ChurnArtifact::load(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, ChurnError::ArtifactError(_)));

    let corrupt = dir.path().join("corrupt.json");
    std::fs::write(&corrupt, b"{\"format_version\": 1, \"schema\":").unwrap();
    let err = ChurnArtifact::load(&corrupt).unwrap_err();
    assert!(matches!(err, ChurnError::ArtifactError(_)));
}

#[test]
fn test_sample_customer_predicted_to_stay() {
    let predictor = ChurnPredictor::new(common::trained_artifact().clone()).unwrap();
    let p = predictor.predict(&common::sample_record()).unwrap();
    assert_eq!(p.churn_prediction, 0);
    assert!(p.churn_probability < 0.5);
}

#[test]
fn test_predictor_applies_artifact_threshold() {
    let (customer, probability, threshold) = common::borderline_customer();
    assert!(probability >= 0.5 && probability < threshold);

    let default = ChurnPredictor::new(common::trained_artifact().clone()).unwrap();
    assert_eq!(default.predict(&customer).unwrap().churn_prediction, 1);

    let strict = ChurnPredictor::new(common::artifact_with_threshold(threshold)).unwrap();
    assert_eq!(strict.threshold(), threshold);
    let p = strict.predict(&customer).unwrap();
    assert_eq!(p.churn_probability, probability);
    assert_eq!(p.churn_prediction, 0);
}

#[test]
fn test_threshold_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn_model.json");
    common::artifact_with_threshold(0.9).save(&path).unwrap();
    assert_eq!(ChurnPredictor::load(&path).unwrap().threshold(), 0.9);
}

#[test]
fn test_out_of_range_threshold_rejected() {
    assert!(ChurnPredictor::new(common::artifact_with_threshold(1.5)).is_err());
}

/// Full default grid on the public Telco dataset
#[test]
#[ignore = "requires data/Telco-Customer-Churn.csv"]
fn test_canonical_dataset() {
    let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/Telco-Customer-Churn.csv");
    assert!(
        data.exists(),
        "download the Telco customer churn CSV to {} to run this test",
        data.display()
    );
    let dataset = DataLoader::new().load_dataset(&data).unwrap();
    assert_eq!(dataset.dropped_rows, 11);

    let (artifact, report) = TrainEngine::new(TrainingConfig::default()).fit_dataset(&dataset).unwrap();
    assert!(report.winner_test_roc_auc > 0.8);

    let predictor = ChurnPredictor::new(artifact).unwrap();
    let p = predictor.predict(&common::sample_record()).unwrap();
    assert_eq!(p.churn_prediction, 0);
    assert!(p.churn_probability < 0.5);
}

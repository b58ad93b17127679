//! Shared fixtures: a deterministic Telco-shaped customer generator

#![allow(dead_code)]

use kolosal_churn::artifact::ChurnArtifact;
use kolosal_churn::data::{CustomerRecord, Dataset};
use kolosal_churn::inference::ChurnPredictor;
use kolosal_churn::training::{CandidateSpec, ModelKind, ParamGrid, TrainEngine, TrainingConfig};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

const YES_NO: &[&str] = &["No", "Yes"];
const ADDON: &[&str] = &["No", "No internet service", "Yes"];
const CONTRACTS: &[&str] = &["Month-to-month", "One year", "Two year"];
const PAYMENTS: &[&str] = &[
    "Bank transfer (automatic)",
    "Credit card (automatic)",
    "Electronic check",
    "Mailed check",
];

pub const HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,PhoneService,\
MultipleLines,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,\
StreamingTV,StreamingMovies,Contract,PaperlessBilling,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

fn pick<'a>(rng: &mut ChaCha8Rng, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or(values[0])
}

/// First customer of the public Telco dataset
pub fn sample_record() -> CustomerRecord {
    CustomerRecord {
        gender: "Female".into(),
        senior_citizen: 0,
        partner: "Yes".into(),
        dependents: "No".into(),
        tenure: 1,
        phone_service: "No".into(),
        multiple_lines: "No phone service".into(),
        internet_service: "DSL".into(),
        online_security: "No".into(),
        online_backup: "Yes".into(),
        device_protection: "No".into(),
        tech_support: "No".into(),
        streaming_tv: "No".into(),
        streaming_movies: "No".into(),
        contract: "Month-to-month".into(),
        paperless_billing: "Yes".into(),
        payment_method: "Electronic check".into(),
        monthly_charges: 29.85,
        total_charges: 29.85,
    }
}

pub fn sample_payload() -> Value {
    json!({
        "gender": "Female",
        "SeniorCitizen": 0,
        "Partner": "Yes",
        "Dependents": "No",
        "tenure": 1,
        "PhoneService": "No",
        "MultipleLines": "No phone service",
        "InternetService": "DSL",
        "OnlineSecurity": "No",
        "OnlineBackup": "Yes",
        "DeviceProtection": "No",
        "TechSupport": "No",
        "StreamingTV": "No",
        "StreamingMovies": "No",
        "Contract": "Month-to-month",
        "PaperlessBilling": "Yes",
        "PaymentMethod": "Electronic check",
        "MonthlyCharges": 29.85,
        "TotalCharges": 29.85
    })
}

/// Churn is driven by high monthly charges combined with a short tenure
/// or a month-to-month contract, with a few flipped labels.
fn churn_label(rng: &mut ChaCha8Rng, record: &CustomerRecord) -> f64 {
    let risky = record.monthly_charges > 70.0 && (record.tenure < 24 || record.contract == "Month-to-month");
    let flip = rng.gen_bool(0.03);
    if risky != flip { 1.0 } else { 0.0 }
}

fn random_record(rng: &mut ChaCha8Rng) -> CustomerRecord {
    let tenure = rng.gen_range(1..=72);
    let monthly = (rng.gen_range(18.0..120.0_f64) * 100.0).round() / 100.0;
    let internet = pick(rng, &["DSL", "Fiber optic", "No"]);
    let addon = |rng: &mut ChaCha8Rng| {
        if internet == "No" { "No internet service".to_string() } else { pick(rng, YES_NO).to_string() }
    };
    let phone = pick(rng, YES_NO);
    CustomerRecord {
        gender: pick(rng, &["Female", "Male"]).into(),
        senior_citizen: i64::from(rng.gen_bool(0.16)),
        partner: pick(rng, YES_NO).into(),
        dependents: pick(rng, YES_NO).into(),
        tenure,
        phone_service: phone.into(),
        multiple_lines: if phone == "No" { "No phone service".into() } else { pick(rng, YES_NO).into() },
        internet_service: internet.into(),
        online_security: addon(rng),
        online_backup: addon(rng),
        device_protection: addon(rng),
        tech_support: addon(rng),
        streaming_tv: addon(rng),
        streaming_movies: addon(rng),
        contract: pick(rng, CONTRACTS).into(),
        paperless_billing: pick(rng, YES_NO).into(),
        payment_method: pick(rng, PAYMENTS).into(),
        monthly_charges: monthly,
        total_charges: ((monthly * tenure as f64) * 100.0).round() / 100.0,
    }
}

/// `n` customers and their labels, identical for the same seed
pub fn synthetic_records(n: usize, seed: u64) -> (Vec<CustomerRecord>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let record = random_record(&mut rng);
        labels.push(churn_label(&mut rng, &record));
        records.push(record);
    }
    // Anchor the low-charge region with the canonical retained customer
    records.push(sample_record());
    labels.push(0.0);
    (records, labels)
}

pub fn synthetic_dataset(n: usize, seed: u64) -> Dataset {
    let (records, labels) = synthetic_records(n, seed);
    Dataset::from_records(records, labels).unwrap()
}

fn csv_row(id: &str, r: &CustomerRecord, total: &str, churn: &str) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        id,
        r.gender,
        r.senior_citizen,
        r.partner,
        r.dependents,
        r.tenure,
        r.phone_service,
        r.multiple_lines,
        r.internet_service,
        r.online_security,
        r.online_backup,
        r.device_protection,
        r.tech_support,
        r.streaming_tv,
        r.streaming_movies,
        r.contract,
        r.paperless_billing,
        r.payment_method,
        r.monthly_charges,
        total,
        churn
    )
}

/// Write a dataset CSV; the last `blank_total` customers are new
/// (tenure 0) with a blank TotalCharges cell.
pub fn write_csv(path: &Path, n: usize, blank_total: usize, seed: u64) {
    let (records, labels) = synthetic_records(n, seed);
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for (i, (r, &y)) in records.iter().zip(&labels).enumerate() {
        let churn = if y > 0.5 { "Yes" } else { "No" };
        writeln!(file, "{}", csv_row(&format!("{:04}-CUST", i), r, &r.total_charges.to_string(), churn)).unwrap();
    }
    for i in 0..blank_total {
        let mut r = sample_record();
        r.tenure = 0;
        writeln!(file, "{}", csv_row(&format!("{:04}-NEW", i), &r, " ", "No")).unwrap();
    }
}

/// Small grids so integration tests stay fast
pub fn fast_config() -> TrainingConfig {
    TrainingConfig::default()
        .with_cv_folds(3)
        .with_candidates(vec![
            CandidateSpec::new(
                ModelKind::Logreg,
                ParamGrid::new().add("C", vec![0.1.into(), 1.0.into()]),
            ),
            CandidateSpec::new(
                ModelKind::RandomForest,
                ParamGrid::new()
                    .add("n_estimators", vec![25.into()])
                    .add("max_depth", vec![6.into()]),
            ),
            CandidateSpec::new(
                ModelKind::GradientBoosting,
                ParamGrid::new()
                    .add("n_estimators", vec![40.into()])
                    .add("learning_rate", vec![0.1.into()])
                    .add("max_depth", vec![3.into()]),
            ),
        ])
}

/// Artifact trained once per test binary
pub fn trained_artifact() -> &'static ChurnArtifact {
    static ARTIFACT: OnceLock<ChurnArtifact> = OnceLock::new();
    ARTIFACT.get_or_init(|| {
        let dataset = synthetic_dataset(400, 7);
        let (artifact, _) = TrainEngine::new(fast_config()).fit_dataset(&dataset).unwrap();
        artifact
    })
}

/// The shared artifact with its decision threshold replaced
pub fn artifact_with_threshold(threshold: f64) -> ChurnArtifact {
    let mut artifact = trained_artifact().clone();
    artifact.metadata.threshold = threshold;
    artifact
}

/// A customer the shared model flags as churning at 0.5, plus a raised
/// threshold above its probability. The threshold is 0.9 unless the
/// customer already scores at or above that.
pub fn borderline_customer() -> (CustomerRecord, f64, f64) {
    let predictor = ChurnPredictor::new(trained_artifact().clone()).unwrap();
    let (records, _) = synthetic_records(500, 2024);
    let scored: Vec<(CustomerRecord, f64)> = records
        .into_iter()
        .map(|r| {
            let p = predictor.predict(&r).unwrap().churn_probability;
            (r, p)
        })
        .filter(|(_, p)| (0.5..1.0).contains(p))
        .collect();

    if let Some((record, p)) = scored.iter().find(|(_, p)| *p < 0.9) {
        return (record.clone(), *p, 0.9);
    }
    let (record, p) = scored
        .into_iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .expect("no customer scored in [0.5, 1.0)");
    (record, p, (p + 1.0) / 2.0)
}

//! Customer record and feature schema
//!
//! The schema is the single source of truth for column names, their order
//! and their value domain. The trainer, the preprocessing transform and the
//! prediction service all walk columns through it, and a copy is pinned in
//! every artifact.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Identifier column present in the dataset, never used as a feature
pub const ID_COLUMN: &str = "customerID";

/// Label column present in the dataset only
pub const LABEL_COLUMN: &str = "Churn";

const YES_NO: &[&str] = &["No", "Yes"];
const INTERNET_ADDON: &[&str] = &["No", "No internet service", "Yes"];

/// Value domain of a feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnKind {
    /// Whole number with inclusive bounds
    Integer { min: i64, max: Option<i64> },
    /// Finite real number with an optional lower bound
    Float { min: Option<f64> },
    /// String drawn from a declared enumeration
    Categorical { allowed: Vec<String> },
}

impl ColumnKind {
    fn categorical(allowed: &[&str]) -> Self {
        ColumnKind::Categorical {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnKind::Categorical { .. })
    }
}

/// A single named feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    fn new(name: &str, kind: ColumnKind) -> Self {
        Self { name: name.to_string(), kind }
    }

    /// Parse a raw CSV cell into a typed value.
    ///
    /// Categorical cells are accepted as-is here; enumeration membership is
    /// a request-time concern (see [`CustomerRecord::from_json`]).
    pub fn parse_text(&self, raw: &str) -> std::result::Result<OwnedValue, String> {
        let raw = raw.trim();
        match &self.kind {
            ColumnKind::Integer { .. } => {
                let v: f64 = raw.parse().map_err(|_| "expected an integer".to_string())?;
                self.check_integer(v).map(OwnedValue::Number)
            }
            ColumnKind::Float { .. } => {
                let v: f64 = raw.parse().map_err(|_| "expected a number".to_string())?;
                self.check_float(v).map(OwnedValue::Number)
            }
            ColumnKind::Categorical { .. } => {
                if raw.is_empty() {
                    Err("expected a non-empty category".to_string())
                } else {
                    Ok(OwnedValue::Category(raw.to_string()))
                }
            }
        }
    }

    fn check_integer(&self, v: f64) -> std::result::Result<f64, String> {
        let ColumnKind::Integer { min, max } = &self.kind else {
            return Ok(v);
        };
        if !v.is_finite() || v.fract() != 0.0 {
            return Err("expected an integer".to_string());
        }
        let iv = v as i64;
        if iv < *min || max.map_or(false, |m| iv > m) {
            return Err(match max {
                Some(m) => format!("must be between {} and {}", min, m),
                None => format!("must be at least {}", min),
            });
        }
        Ok(v)
    }

    fn check_float(&self, v: f64) -> std::result::Result<f64, String> {
        if !v.is_finite() {
            return Err("expected a finite number".to_string());
        }
        if let ColumnKind::Float { min: Some(min) } = &self.kind {
            if v < *min {
                return Err(format!("must be at least {}", min));
            }
        }
        Ok(v)
    }

    /// Whether a category belongs to the declared enumeration
    pub fn allows(&self, category: &str) -> bool {
        match &self.kind {
            ColumnKind::Categorical { allowed } => allowed.iter().any(|a| a == category),
            _ => false,
        }
    }
}

/// Ordered feature schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<ColumnSpec>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::telco()
    }
}

impl FeatureSchema {
    /// Build a schema from explicit columns
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// The Telco customer churn schema, in dataset column order
    pub fn telco() -> Self {
        use ColumnKind as K;
        Self::new(vec![
            ColumnSpec::new("gender", K::categorical(&["Female", "Male"])),
            ColumnSpec::new("SeniorCitizen", K::Integer { min: 0, max: Some(1) }),
            ColumnSpec::new("Partner", K::categorical(YES_NO)),
            ColumnSpec::new("Dependents", K::categorical(YES_NO)),
            ColumnSpec::new("tenure", K::Integer { min: 0, max: None }),
            ColumnSpec::new("PhoneService", K::categorical(YES_NO)),
            ColumnSpec::new("MultipleLines", K::categorical(&["No", "No phone service", "Yes"])),
            ColumnSpec::new("InternetService", K::categorical(&["DSL", "Fiber optic", "No"])),
            ColumnSpec::new("OnlineSecurity", K::categorical(INTERNET_ADDON)),
            ColumnSpec::new("OnlineBackup", K::categorical(INTERNET_ADDON)),
            ColumnSpec::new("DeviceProtection", K::categorical(INTERNET_ADDON)),
            ColumnSpec::new("TechSupport", K::categorical(INTERNET_ADDON)),
            ColumnSpec::new("StreamingTV", K::categorical(INTERNET_ADDON)),
            ColumnSpec::new("StreamingMovies", K::categorical(INTERNET_ADDON)),
            ColumnSpec::new("Contract", K::categorical(&["Month-to-month", "One year", "Two year"])),
            ColumnSpec::new("PaperlessBilling", K::categorical(YES_NO)),
            ColumnSpec::new(
                "PaymentMethod",
                K::categorical(&[
                    "Bank transfer (automatic)",
                    "Credit card (automatic)",
                    "Electronic check",
                    "Mailed check",
                ]),
            ),
            ColumnSpec::new("MonthlyCharges", K::Float { min: Some(0.0) }),
            ColumnSpec::new("TotalCharges", K::Float { min: Some(0.0) }),
        ])
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !c.kind.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Borrowed view of a single feature value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Number(f64),
    Category(&'a str),
}

/// Owned feature value, produced while parsing raw input
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedValue {
    Number(f64),
    Category(String),
}

/// A request field that failed schema validation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {reason}")]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

/// One customer, as presented at training and at prediction time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerRecord {
    pub gender: String,
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: i64,
    #[serde(rename = "Partner")]
    pub partner: String,
    #[serde(rename = "Dependents")]
    pub dependents: String,
    pub tenure: i64,
    #[serde(rename = "PhoneService")]
    pub phone_service: String,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: String,
    #[serde(rename = "InternetService")]
    pub internet_service: String,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: String,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: String,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: String,
    #[serde(rename = "TechSupport")]
    pub tech_support: String,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: String,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: String,
    #[serde(rename = "Contract")]
    pub contract: String,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

impl CustomerRecord {
    /// Look up a feature by its dataset column name
    pub fn value(&self, name: &str) -> Option<FeatureValue<'_>> {
        use FeatureValue::{Category, Number};
        let v = match name {
            "gender" => Category(&self.gender),
            "SeniorCitizen" => Number(self.senior_citizen as f64),
            "Partner" => Category(&self.partner),
            "Dependents" => Category(&self.dependents),
            "tenure" => Number(self.tenure as f64),
            "PhoneService" => Category(&self.phone_service),
            "MultipleLines" => Category(&self.multiple_lines),
            "InternetService" => Category(&self.internet_service),
            "OnlineSecurity" => Category(&self.online_security),
            "OnlineBackup" => Category(&self.online_backup),
            "DeviceProtection" => Category(&self.device_protection),
            "TechSupport" => Category(&self.tech_support),
            "StreamingTV" => Category(&self.streaming_tv),
            "StreamingMovies" => Category(&self.streaming_movies),
            "Contract" => Category(&self.contract),
            "PaperlessBilling" => Category(&self.paperless_billing),
            "PaymentMethod" => Category(&self.payment_method),
            "MonthlyCharges" => Number(self.monthly_charges),
            "TotalCharges" => Number(self.total_charges),
            _ => return None,
        };
        Some(v)
    }

    /// Assign a feature by its dataset column name.
    ///
    /// Returns `false` when the name is unknown or the value kind does not
    /// match the field.
    pub fn set(&mut self, name: &str, value: OwnedValue) -> bool {
        match value {
            OwnedValue::Number(v) => {
                match name {
                    "SeniorCitizen" => self.senior_citizen = v as i64,
                    "tenure" => self.tenure = v as i64,
                    "MonthlyCharges" => self.monthly_charges = v,
                    "TotalCharges" => self.total_charges = v,
                    _ => return false,
                }
                true
            }
            OwnedValue::Category(s) => {
                let slot = match name {
                    "gender" => &mut self.gender,
                    "Partner" => &mut self.partner,
                    "Dependents" => &mut self.dependents,
                    "PhoneService" => &mut self.phone_service,
                    "MultipleLines" => &mut self.multiple_lines,
                    "InternetService" => &mut self.internet_service,
                    "OnlineSecurity" => &mut self.online_security,
                    "OnlineBackup" => &mut self.online_backup,
                    "DeviceProtection" => &mut self.device_protection,
                    "TechSupport" => &mut self.tech_support,
                    "StreamingTV" => &mut self.streaming_tv,
                    "StreamingMovies" => &mut self.streaming_movies,
                    "Contract" => &mut self.contract,
                    "PaperlessBilling" => &mut self.paperless_billing,
                    "PaymentMethod" => &mut self.payment_method,
                    _ => return false,
                };
                *slot = s;
                true
            }
        }
    }

    /// Validate an untyped JSON payload against the schema.
    ///
    /// Fields are checked in schema order; the first failure is returned.
    /// Extra keys are rejected. With `strict`, categorical values must come
    /// from the declared enumeration.
    pub fn from_json(
        payload: &Value,
        schema: &FeatureSchema,
        strict: bool,
    ) -> std::result::Result<Self, FieldError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| FieldError::new("body", "expected a JSON object"))?;

        let mut record = CustomerRecord::default();
        for spec in schema.columns() {
            let raw = obj
                .get(&spec.name)
                .ok_or_else(|| FieldError::new(&spec.name, "field required"))?;
            let value = Self::validate_field(spec, raw, strict)
                .map_err(|reason| FieldError::new(&spec.name, reason))?;
            if !record.set(&spec.name, value) {
                return Err(FieldError::new(&spec.name, "not a customer attribute"));
            }
        }

        if let Some(extra) = obj.keys().find(|k| schema.column(k.as_str()).is_none()) {
            return Err(FieldError::new(extra.as_str(), "unknown field"));
        }

        Ok(record)
    }

    fn validate_field(
        spec: &ColumnSpec,
        raw: &Value,
        strict: bool,
    ) -> std::result::Result<OwnedValue, String> {
        match &spec.kind {
            ColumnKind::Integer { .. } => {
                let v = raw
                    .as_i64()
                    .map(|i| i as f64)
                    .or_else(|| raw.as_f64())
                    .ok_or_else(|| format!("expected an integer, got {}", json_type(raw)))?;
                spec.check_integer(v).map(OwnedValue::Number)
            }
            ColumnKind::Float { .. } => {
                let v = raw
                    .as_f64()
                    .ok_or_else(|| format!("expected a number, got {}", json_type(raw)))?;
                spec.check_float(v).map(OwnedValue::Number)
            }
            ColumnKind::Categorical { allowed } => {
                let s = raw
                    .as_str()
                    .ok_or_else(|| format!("expected a string, got {}", json_type(raw)))?;
                if strict && !spec.allows(s) {
                    return Err(format!(
                        "unexpected value {:?}; expected one of: {}",
                        s,
                        allowed.join(", ")
                    ));
                }
                Ok(OwnedValue::Category(s.to_string()))
            }
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

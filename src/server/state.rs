//! Application state shared across handlers

use super::ServerConfig;
use crate::inference::ChurnPredictor;
use chrono::{DateTime, Utc};

/// Immutable after startup; handlers only read it
#[derive(Debug)]
pub struct AppState {
    pub predictor: ChurnPredictor,
    pub config: ServerConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(predictor: ChurnPredictor, config: ServerConfig) -> Self {
        Self {
            predictor,
            config,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }
}

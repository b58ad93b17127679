//! Command-line interface: train, serve, predict

use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifact::ChurnArtifact;
use crate::inference::{ChurnPredictor, PredictError};
use crate::training::{CandidateSpec, ModelKind, TrainEngine, TrainingConfig, TrainingReport};

// ─── Output helpers ────────────────────────────────────────────────────────────

const PANEL_WIDTH: usize = 58;
const FIELD_KEY_WIDTH: usize = 10;

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn warn(s: &str) -> ColoredString  { s.truecolor(235, 190, 90) }

/// Open a progress line; `step_done` closes it
fn step_run(msg: &str) {
    print!("  {} {}... ", "›".truecolor(120, 170, 255), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", "done".truecolor(100, 210, 120), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

enum PanelRow {
    Title(String),
    Note(String),
    Field(&'static str, String),
    Rule,
}

/// Boxed summary used by the train report and the serve banner.
///
/// Rows are padded on their plain text, then colored.
#[derive(Default)]
struct Panel {
    rows: Vec<PanelRow>,
}

impl Panel {
    fn title(mut self, text: impl Into<String>) -> Self {
        self.rows.push(PanelRow::Title(text.into()));
        self
    }

    fn note(mut self, text: impl Into<String>) -> Self {
        self.rows.push(PanelRow::Note(text.into()));
        self
    }

    fn field(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.rows.push(PanelRow::Field(key, value.into()));
        self
    }

    fn rule(mut self) -> Self {
        self.rows.push(PanelRow::Rule);
        self
    }

    fn render(&self) -> Vec<String> {
        let bar = "─".repeat(PANEL_WIDTH + 3);
        let centered = |text: &str, styled: ColoredString| {
            let pad = PANEL_WIDTH.saturating_sub(text.chars().count());
            let left = pad / 2;
            format!("{}  {}{}{} {}", dim("│"), " ".repeat(left), styled, " ".repeat(pad - left), dim("│"))
        };

        let mut lines = vec![dim(&format!("┌{}┐", bar)).to_string()];
        for row in &self.rows {
            lines.push(match row {
                PanelRow::Title(text) => centered(text, text.white().bold()),
                PanelRow::Note(text) => centered(text, dim(text)),
                PanelRow::Field(key, value) => {
                    let used = FIELD_KEY_WIDTH + 1 + value.chars().count();
                    format!(
                        "{}  {} {}{} {}",
                        dim("│"),
                        muted(&format!("{:<width$}", key, width = FIELD_KEY_WIDTH)),
                        value.white(),
                        " ".repeat(PANEL_WIDTH.saturating_sub(used)),
                        dim("│")
                    )
                }
                PanelRow::Rule => dim(&format!("├{}┤", bar)).to_string(),
            });
        }
        lines.push(dim(&format!("└{}┘", bar)).to_string());
        lines
    }

    fn print(&self) {
        println!();
        for line in self.render() {
            println!("  {}", line);
        }
        println!();
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-churn")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Customer churn model training and prediction service")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train candidate models and persist the best one
    Train {
        /// Labeled customer CSV
        #[arg(short, long, default_value = "data/Telco-Customer-Churn.csv")]
        data: PathBuf,

        /// Artifact output path
        #[arg(short, long, default_value = "churn_model.json")]
        output: PathBuf,

        /// Seed for the split and the randomized models
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Held-out test fraction
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// Cross-validation folds for the grid search
        #[arg(long, default_value = "5")]
        cv_folds: usize,

        /// Candidate models (logreg, random_forest, gradient_boosting); all when omitted
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<ModelKind>,
    },

    /// Serve predictions over HTTP
    Serve {
        /// Server host [env: API_HOST, default 0.0.0.0]
        #[arg(long)]
        host: Option<String>,

        /// Server port [env: API_PORT, default 8000]
        #[arg(short, long)]
        port: Option<u16>,

        /// Trained artifact [env: MODEL_PATH, default churn_model.json]
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Accept categorical values outside the declared vocabulary
        #[arg(long)]
        lenient: bool,
    },

    /// Predict churn for customers in a JSON file
    Predict {
        /// Trained artifact
        #[arg(short, long, default_value = "churn_model.json")]
        model: PathBuf,

        /// JSON file with one customer object or an array of them
        #[arg(short, long)]
        input: PathBuf,

        /// Accept categorical values outside the declared vocabulary
        #[arg(long)]
        lenient: bool,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    output: &Path,
    seed: u64,
    test_size: f64,
    cv_folds: usize,
    models: &[ModelKind],
) -> anyhow::Result<()> {
    section("Train");

    let mut config = TrainingConfig::default()
        .with_data_path(data_path)
        .with_artifact_path(output)
        .with_random_seed(seed)
        .with_test_size(test_size)
        .with_cv_folds(cv_folds);
    if !models.is_empty() {
        config = config.with_candidates(models.iter().copied().map(CandidateSpec::with_default_grid).collect());
    }
    config.validate()?;

    let combos: usize = config.candidates.iter().map(|c| c.grid.len()).sum();
    println!("  {:<16} {}", muted("Data"), data_path.display());
    println!(
        "  {:<16} {}",
        muted("Search"),
        format!("{} configurations × {} folds", combos, cv_folds).white()
    );
    println!();

    step_run("Training candidates");
    let start = Instant::now();
    let report = TrainEngine::new(config).run()?;
    step_done(&format!("{:.1}s", start.elapsed().as_secs_f64()));

    print_training_report(&report);
    Ok(())
}

fn print_training_report(report: &TrainingReport) {
    section("Candidates");
    println!(
        "  {:<20} {:>10} {:>10} {:>10}",
        muted("Model"),
        muted("CV AUC"),
        muted("Test AUC"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(54)));
    for c in &report.candidates {
        let name = if c.name() == report.winner {
            c.name().green().bold()
        } else {
            c.name().white()
        };
        println!(
            "  {:<20} {:>10} {:>10} {:>10}",
            name,
            format!("{:.4}", c.cv_roc_auc),
            format!("{:.4}", c.test_roc_auc),
            format!("{:.1}s", c.search_time_secs)
        );
        println!("  {:<20} {}", "", dim(&c.best_params.to_string()));
    }

    for c in &report.candidates {
        section(&format!("Classification report: {}", c.name()));
        for line in c.classification_report.to_string().lines() {
            println!("  {}", line);
        }
    }

    if report.dropped_rows > 0 {
        println!();
        println!(
            "  {} {} rows dropped for missing TotalCharges",
            warn("!"),
            report.dropped_rows
        );
    }

    let mut panel = Panel::default()
        .title("Best model")
        .rule()
        .field("Model", report.winner.as_str())
        .field("Test AUC", format!("{:.4}", report.winner_test_roc_auc))
        .field("Split", format!("{} train / {} test", report.n_train, report.n_test));
    if let Some(path) = &report.artifact_path {
        panel = panel.field("Artifact", path.display().to_string());
    }
    panel.print();
}

pub fn cmd_predict(model_path: &Path, input: &Path, lenient: bool) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let predictor = ChurnPredictor::new(ChurnArtifact::load(model_path)?)?;
    step_done(&predictor.metadata().model_name);

    let text = std::fs::read_to_string(input)?;
    let payload: Value = serde_json::from_str(&text)?;
    let rows = match payload {
        Value::Array(items) => items,
        other => vec![other],
    };

    println!();
    println!("  {:<6} {:>12} {:>12}", muted("Row"), muted("Churn"), muted("Probability"));
    println!("  {}", dim(&"─".repeat(32)));
    for (i, row) in rows.iter().enumerate() {
        match predictor.predict_json(row, !lenient) {
            Ok(p) => {
                let label = if p.churn_prediction == 1 { "yes".red().bold() } else { "no".green() };
                println!("  {:<6} {:>12} {:>12}", i, label, format!("{:.4}", p.churn_probability));
            }
            Err(PredictError::Validation(e)) => {
                println!("  {:<6} {}", i, warn(&format!("invalid: {}", e)));
            }
            Err(PredictError::Internal(e)) => return Err(e.into()),
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    model: Option<PathBuf>,
    lenient: bool,
) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let mut config = ServerConfig::default().with_strict_categories(!lenient);
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(model) = model {
        config = config.with_model_path(model);
    }

    let base = format!("http://{}:{}", config.host, config.port);
    Panel::default()
        .title("Churn Prediction API")
        .note(format!("v{}", crate::VERSION))
        .rule()
        .field("Model", config.model_path.display().to_string())
        .field("Health", format!("{}/health", base))
        .field("Predict", format!("POST {}/predict", base))
        .rule()
        .note("ctrl+c to stop")
        .print();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_rows_share_width() {
        colored::control::set_override(false);
        let lines = Panel::default()
            .title("Best model")
            .rule()
            .field("Model", "random_forest")
            .note("ctrl+c to stop")
            .render();
        assert_eq!(lines.len(), 6);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width), "{:#?}", lines);
        assert!(lines[3].contains("Model      random_forest"));
    }

    #[test]
    fn test_parse_train_models() {
        let cli = Cli::try_parse_from(["kolosal-churn", "train", "--models", "logreg,gradient_boosting"]).unwrap();
        match cli.command {
            Commands::Train { models, seed, .. } => {
                assert_eq!(models, vec![ModelKind::Logreg, ModelKind::GradientBoosting]);
                assert_eq!(seed, 42);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_model() {
        assert!(Cli::try_parse_from(["kolosal-churn", "train", "--models", "svm"]).is_err());
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from(["kolosal-churn", "serve", "--port", "9001", "--lenient"]).unwrap();
        match cli.command {
            Commands::Serve { port, lenient, host, .. } => {
                assert_eq!(port, Some(9001));
                assert!(lenient);
                assert!(host.is_none());
            }
            _ => panic!("expected serve"),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;
use twentyq_core::game::GameConfig;

const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
const DEFAULT_REPORT_ROWS: usize = 10;
const DEFAULT_MIN_ATTEMPTS: usize = 3;
const MAX_QUESTIONS_CAP: usize = 200;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root simulation configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub run_id: String,
    pub catalog: CatalogConfig,
    pub games: GamesConfig,
    #[serde(default)]
    pub engine: GameConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: SimulationConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.catalog.validate()?;
        self.games.validate()?;
        validate_engine(&self.engine)?;
        self.outputs.validate(&self.run_id)?;
        self.metrics.validate()?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve `{run_id}` placeholders into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogConfig {
    pub data_dir: PathBuf,
}

impl CatalogConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(invalid("catalog.data_dir", "path must not be empty"));
        }
        Ok(())
    }
}

/// How simulated players pick the entity they think of.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelection {
    /// Weight by popularity rank, `1/sqrt(rank + 1)`.
    #[default]
    Weighted,
    Uniform,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GamesConfig {
    pub seed: Option<u64>,
    pub count: usize,
    #[serde(default)]
    pub selection: TargetSelection,
    /// Feed every outcome back through the weight learner and save.
    #[serde(default)]
    pub learn: bool,
}

impl GamesConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(invalid(
                "games.count",
                "number of games must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn validate_engine(engine: &GameConfig) -> Result<(), ValidationError> {
    if engine.max_questions == 0 || engine.max_questions > MAX_QUESTIONS_CAP {
        return Err(invalid(
            "engine.max_questions",
            format!("must be between 1 and {MAX_QUESTIONS_CAP}"),
        ));
    }
    for (field, value) in [
        ("engine.guess_threshold", engine.guess_threshold),
        ("engine.guess_margin", engine.guess_margin),
        ("engine.learning_rate", engine.learning_rate),
        ("engine.min_weight", engine.min_weight),
        ("engine.max_weight", engine.max_weight),
        ("engine.unknown_likelihood", engine.unknown_likelihood),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(invalid(field, "must be within [0, 1]"));
        }
    }
    if engine.min_weight >= engine.max_weight {
        return Err(invalid(
            "engine.min_weight",
            "must be lower than engine.max_weight",
        ));
    }
    if !(engine.smoothing >= 0.0 && engine.smoothing.is_finite()) {
        return Err(invalid("engine.smoothing", "must be a non-negative number"));
    }
    if !(engine.min_info_gain >= 0.0 && engine.min_info_gain.is_finite()) {
        return Err(invalid(
            "engine.min_info_gain",
            "must be a non-negative number",
        ));
    }
    Ok(())
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(label, "path must not be empty"));
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(invalid(label, "resolved path is invalid"));
            }
        }
        Ok(())
    }
}

/// Knobs for the Markdown summary.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Rows per ranked table (questions, hardest entities, confusions).
    #[serde(default = "default_report_rows")]
    pub report_rows: usize,
    /// Attempts before an entity is ranked by difficulty.
    #[serde(default = "default_min_attempts")]
    pub min_attempts: usize,
    #[serde(default)]
    pub suggestions: SuggestionThresholds,
}

/// Cut-offs for flagging weak questions, entities and categories.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuggestionThresholds {
    /// A question must be used more often than this before it can be flagged.
    pub min_question_uses: usize,
    /// Questions averaging less gain (bits) than this are flagged.
    pub min_avg_gain: f64,
    pub entity_accuracy: f64,
    pub category_accuracy: f64,
    /// Confusions listed per flagged entity.
    pub confusions_per_entity: usize,
}

impl Default for SuggestionThresholds {
    fn default() -> Self {
        Self {
            min_question_uses: 10,
            min_avg_gain: 0.1,
            entity_accuracy: 0.5,
            category_accuracy: 0.7,
            confusions_per_entity: 3,
        }
    }
}

impl SuggestionThresholds {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(self.min_avg_gain.is_finite() && self.min_avg_gain >= 0.0) {
            return Err(invalid(
                "metrics.suggestions.min_avg_gain",
                "must be a non-negative number",
            ));
        }
        for (field, value) in [
            ("metrics.suggestions.entity_accuracy", self.entity_accuracy),
            ("metrics.suggestions.category_accuracy", self.category_accuracy),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be within [0, 1]"));
            }
        }
        Ok(())
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            report_rows: DEFAULT_REPORT_ROWS,
            min_attempts: DEFAULT_MIN_ATTEMPTS,
            suggestions: SuggestionThresholds::default(),
        }
    }
}

impl MetricsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(invalid(
                "metrics.confidence_level",
                "must be strictly between 0 and 1",
            ));
        }
        if self.report_rows == 0 {
            return Err(invalid(
                "metrics.report_rows",
                "must be greater than zero",
            ));
        }
        if self.min_attempts == 0 {
            return Err(invalid(
                "metrics.min_attempts",
                "must be greater than zero",
            ));
        }
        self.suggestions.validate()
    }
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

fn default_report_rows() -> usize {
    DEFAULT_REPORT_ROWS
}

fn default_min_attempts() -> usize {
    DEFAULT_MIN_ATTEMPTS
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(invalid("run_id", "run_id must not be empty"));
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(invalid(
            "run_id",
            "run_id may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }

    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.into(),
    }
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
}

impl ResolvedOutputs {
    /// Directory shared by the summary and telemetry files.
    pub fn report_dir(&self) -> PathBuf {
        self.summary_md
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

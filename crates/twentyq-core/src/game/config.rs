use crate::belief::TrackerConfig;
use crate::learner::LearnerConfig;
use crate::selector::DEFAULT_MIN_INFO_GAIN;
use serde::{Deserialize, Serialize};
use std::env;

/// Tunables for one game engine. Every field has a default so partial
/// YAML/JSON blocks deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub max_questions: usize,
    /// Base probability the top entity must reach before guessing.
    pub guess_threshold: f64,
    /// Base lead over the runner-up required alongside the threshold.
    pub guess_margin: f64,
    pub learning_rate: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    pub unknown_likelihood: f64,
    pub smoothing: f64,
    pub min_info_gain: f64,
    /// Start from a popularity-weighted prior instead of uniform.
    pub use_popularity_prior: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_questions: 20,
            guess_threshold: 0.5,
            guess_margin: 0.15,
            learning_rate: 0.1,
            min_weight: 0.01,
            max_weight: 0.99,
            unknown_likelihood: 0.5,
            smoothing: 0.01,
            min_info_gain: DEFAULT_MIN_INFO_GAIN,
            use_popularity_prior: false,
        }
    }
}

impl GameConfig {
    /// Defaults overridden by `TWENTYQ_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `TWENTYQ_*` overrides on top of `self`. Unparseable values
    /// are ignored; parsed values are clamped to sane ranges.
    pub fn with_env_overrides(self) -> Self {
        let max_questions =
            parse_env_usize("TWENTYQ_MAX_QUESTIONS", self.max_questions).clamp(1, 200);
        let guess_threshold =
            parse_env_f64("TWENTYQ_GUESS_THRESHOLD", self.guess_threshold).clamp(0.05, 1.0);
        let guess_margin = parse_env_f64("TWENTYQ_GUESS_MARGIN", self.guess_margin).clamp(0.0, 1.0);
        let learning_rate =
            parse_env_f64("TWENTYQ_LEARNING_RATE", self.learning_rate).clamp(0.0, 1.0);
        let use_popularity_prior =
            parse_env_bool("TWENTYQ_POPULARITY_PRIOR", self.use_popularity_prior);

        Self {
            max_questions,
            guess_threshold,
            guess_margin,
            learning_rate,
            use_popularity_prior,
            ..self
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            unknown_likelihood: self.unknown_likelihood,
            smoothing: self.smoothing,
        }
    }

    pub fn learner_config(&self) -> LearnerConfig {
        LearnerConfig {
            learning_rate: self.learning_rate,
            min_weight: self.min_weight,
            max_weight: self.max_weight,
        }
    }
}

fn parse_env_f64(key: &str, fallback: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(fallback)
}

fn parse_env_usize(key: &str, fallback: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn parse_env_bool(key: &str, fallback: bool) -> bool {
    match env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

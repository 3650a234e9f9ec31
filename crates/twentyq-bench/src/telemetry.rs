//! Digest of the structured `telemetry.jsonl` log written during a run.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const GAME_TARGET: &str = "twentyq_bench::game";
const ENGINE_TARGET: &str = "twentyq_core::game::engine";
const LEARNER_TARGET: &str = "twentyq_core::learner";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub games: GameTelemetrySummary,
    pub guesses: GuessTelemetrySummary,
    /// Learner events keyed by message.
    pub learning: BTreeMap<String, usize>,
    pub warnings: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct GameTelemetrySummary {
    pub count: usize,
    pub correct: usize,
    pub avg_questions: Option<f64>,
    pub avg_final_probability: Option<f64>,
}

#[derive(Debug, Default, Serialize)]
pub struct GuessTelemetrySummary {
    pub count: usize,
    pub avg_confidence: Option<f64>,
}

#[derive(Debug)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregates game, guess and learning events. A missing log is empty.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut summary = TelemetrySummary::default();
    let mut questions_avg = Average::new();
    let mut probability_avg = Average::new();
    let mut confidence_avg = Average::new();

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let level = payload
            .get("level")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let message = fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if level.eq_ignore_ascii_case("warn") {
            summary.warnings += 1;
        }

        match target {
            GAME_TARGET => {
                summary.games.count += 1;
                if fields.get("correct").and_then(Value::as_bool) == Some(true) {
                    summary.games.correct += 1;
                }
                if let Some(questions) = fields.get("questions").and_then(Value::as_f64) {
                    questions_avg.add(questions);
                }
                if let Some(p) = fields.get("final_probability").and_then(Value::as_f64) {
                    probability_avg.add(p);
                }
            }
            ENGINE_TARGET if message == "guess made" => {
                summary.guesses.count += 1;
                if let Some(confidence) = fields.get("confidence").and_then(Value::as_f64) {
                    confidence_avg.add(confidence);
                }
            }
            LEARNER_TARGET => {
                let label = if message.is_empty() { "<unset>" } else { message };
                *summary.learning.entry(label.to_string()).or_insert(0) += 1;
            }
            _ => {}
        }
    }

    summary.games.avg_questions = questions_avg.mean();
    summary.games.avg_final_probability = probability_avg.mean();
    summary.guesses.avg_confidence = confidence_avg.mean();
    Ok(summary)
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
}

/// Writes `telemetry_summary.json` next to the log.
pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    std::fs::write(&json_path, serde_json::to_vec_pretty(&summary)?).map_err(|source| {
        TelemetryError::Io {
            context: "writing telemetry summary json",
            source,
        }
    })?;

    Ok(Some(TelemetryOutputs { summary, json_path }))
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let summary = &outputs.summary;
    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    section.push_str(&format!(
        "- Game events captured: {} ({} correct)\n",
        summary.games.count, summary.games.correct
    ));
    if let Some(value) = summary.games.avg_questions {
        section.push_str(&format!("- Avg questions: {value:.2}\n"));
    }
    if let Some(value) = summary.guesses.avg_confidence {
        section.push_str(&format!("- Avg guess confidence: {value:.3}\n"));
    }
    section.push_str(&format!("- Warnings: {}\n", summary.warnings));
    if !summary.learning.is_empty() {
        section.push_str("- Learning events:\n");
        for (label, count) in &summary.learning {
            section.push_str(&format!("  - {label}: {count}\n"));
        }
    }

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
        file
    }

    #[test]
    fn summarises_game_guess_and_learning_events() {
        let lines = [
            r#"{"level":"INFO","target":"twentyq_bench::game","fields":{"correct":true,"questions":6,"final_probability":0.9}}"#,
            r#"{"level":"INFO","target":"twentyq_bench::game","fields":{"correct":false,"questions":10,"final_probability":0.3}}"#,
            r#"{"level":"INFO","target":"twentyq_core::game::engine","fields":{"message":"guess made","confidence":0.8}}"#,
            r#"{"level":"INFO","target":"twentyq_core::game::engine","fields":{"message":"game started"}}"#,
            r#"{"level":"INFO","target":"twentyq_core::learner","fields":{"message":"session learned"}}"#,
            r#"{"level":"WARN","target":"twentyq_core::game::engine","fields":{"message":"failed to persist learned state; continuing in memory"}}"#,
        ];
        let file = write_temp_file(&lines);
        let summary = summarise_telemetry(file.path()).expect("summarise");
        assert_eq!(summary.games.count, 2);
        assert_eq!(summary.games.correct, 1);
        assert_eq!(summary.games.avg_questions, Some(8.0));
        assert!((summary.games.avg_final_probability.unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(summary.guesses.count, 1);
        assert_eq!(summary.learning.get("session learned"), Some(&1));
        assert_eq!(summary.warnings, 1);
    }

    #[test]
    fn handles_missing_file() {
        let summary =
            summarise_telemetry(Path::new("tests/does/not/exist.jsonl")).expect("summarise");
        assert_eq!(summary.games.count, 0);
        assert!(summary.guesses.avg_confidence.is_none());
    }

    #[test]
    fn appends_highlights_to_summary_markdown() {
        let mut summary_file = tempfile::NamedTempFile::new().expect("summary temp file");
        writeln!(summary_file, "# Simulation Summary").expect("seed summary content");

        let mut learning = BTreeMap::new();
        learning.insert("confusion adjusted".to_string(), 4);
        let outputs = TelemetryOutputs {
            summary: TelemetrySummary {
                games: GameTelemetrySummary {
                    count: 12,
                    correct: 9,
                    avg_questions: Some(7.5),
                    avg_final_probability: Some(0.7),
                },
                guesses: GuessTelemetrySummary {
                    count: 12,
                    avg_confidence: Some(0.64),
                },
                learning,
                warnings: 0,
            },
            json_path: PathBuf::from("unused.json"),
        };

        append_highlights_to_markdown(summary_file.path(), &outputs).expect("append highlights");
        let contents = std::fs::read_to_string(summary_file.path()).expect("read summary file");
        assert!(contents.contains("## Telemetry Highlights"));
        assert!(contents.contains("Game events captured: 12 (9 correct)"));
        assert!(contents.contains("Avg questions: 7.50"));
        assert!(contents.contains("confusion adjusted: 4"));
    }
}

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::config::MetricsConfig;
use crate::simulation::GameLogRow;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("no games were recorded")]
    NoGames,
    #[error("invalid confidence level {0}")]
    ConfidenceLevel(f64),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    attempts: usize,
    correct: usize,
}

impl Tally {
    fn record(&mut self, correct: bool) {
        self.attempts += 1;
        if correct {
            self.correct += 1;
        }
    }

    fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Default)]
struct QuestionAccumulator {
    uses: usize,
    total_gain: f64,
}

/// Folds [`GameLogRow`]s into run-level statistics.
pub struct AnalyticsCollector {
    metrics: MetricsConfig,
    overall: Tally,
    in_top5: usize,
    questions: Vec<f64>,
    categories: BTreeMap<String, Tally>,
    entities: BTreeMap<String, Tally>,
    question_usage: BTreeMap<String, QuestionAccumulator>,
    confusions: BTreeMap<(String, String), usize>,
    stop_reasons: BTreeMap<String, usize>,
}

impl AnalyticsCollector {
    pub fn new(metrics: &MetricsConfig) -> Self {
        Self {
            metrics: metrics.clone(),
            overall: Tally::default(),
            in_top5: 0,
            questions: Vec::new(),
            categories: BTreeMap::new(),
            entities: BTreeMap::new(),
            question_usage: BTreeMap::new(),
            confusions: BTreeMap::new(),
            stop_reasons: BTreeMap::new(),
        }
    }

    pub fn record_game(&mut self, row: &GameLogRow) {
        self.overall.record(row.correct);
        if row.target_in_top5 {
            self.in_top5 += 1;
        }
        self.questions.push(row.num_questions as f64);
        self.categories
            .entry(row.target_category.clone())
            .or_default()
            .record(row.correct);
        self.entities
            .entry(row.target_id.clone())
            .or_default()
            .record(row.correct);

        for (question, gain) in row.question_gains() {
            let acc = self.question_usage.entry(question.to_string()).or_default();
            acc.uses += 1;
            acc.total_gain += gain;
        }

        if !row.correct {
            if let Some((top, _)) = row.top_entities.first() {
                *self
                    .confusions
                    .entry((row.target_id.clone(), top.clone()))
                    .or_default() += 1;
            }
        }

        let reason = row.stop_reason.as_deref().unwrap_or("Budget");
        *self.stop_reasons.entry(reason.to_string()).or_default() += 1;
    }

    pub fn finalize(self) -> Result<AnalyticsSummary, AnalyticsError> {
        let games = self.overall.attempts;
        if games == 0 {
            return Err(AnalyticsError::NoGames);
        }
        let accuracy = self.overall.accuracy();
        let z = z_score(self.metrics.confidence_level)?;
        let ci = proportion_interval(accuracy, games, z);

        let avg_questions = self.questions.iter().mean();
        let std_questions = if games > 1 {
            self.questions.iter().std_dev()
        } else {
            0.0
        };

        let suggestions = self.suggestions();

        let categories = self
            .categories
            .iter()
            .map(|(category, tally)| CategoryReport {
                category: category.clone(),
                games: tally.attempts,
                correct: tally.correct,
                accuracy: tally.accuracy(),
            })
            .collect();

        let mut questions: Vec<QuestionReport> = self
            .question_usage
            .iter()
            .map(|(attribute, acc)| QuestionReport {
                attribute: attribute.clone(),
                uses: acc.uses,
                avg_info_gain: acc.total_gain / acc.uses as f64,
            })
            .collect();
        questions.sort_by(|a, b| b.uses.cmp(&a.uses));
        questions.truncate(self.metrics.report_rows);

        let mut hardest: Vec<EntityReport> = self
            .entities
            .iter()
            .filter(|(_, tally)| tally.attempts >= self.metrics.min_attempts)
            .map(|(entity, tally)| EntityReport {
                entity_id: entity.clone(),
                attempts: tally.attempts,
                correct: tally.correct,
                accuracy: tally.accuracy(),
            })
            .collect();
        hardest.sort_by(|a, b| {
            a.accuracy
                .total_cmp(&b.accuracy)
                .then_with(|| b.attempts.cmp(&a.attempts))
        });
        hardest.truncate(self.metrics.report_rows);

        let mut confusions: Vec<ConfusionReport> = self
            .confusions
            .into_iter()
            .map(|((target, guessed), count)| ConfusionReport {
                target,
                guessed,
                count,
            })
            .collect();
        confusions.sort_by(|a, b| b.count.cmp(&a.count));
        confusions.truncate(self.metrics.report_rows);

        Ok(AnalyticsSummary {
            games,
            correct: self.overall.correct,
            accuracy,
            confidence_level: self.metrics.confidence_level,
            accuracy_ci: ci,
            top5_rate: self.in_top5 as f64 / games as f64,
            avg_questions,
            std_questions,
            categories,
            questions,
            hardest,
            confusions,
            stop_reasons: self.stop_reasons,
            suggestions,
        })
    }

    fn suggestions(&self) -> Suggestions {
        let limits = &self.metrics.suggestions;

        let weak_questions = self
            .question_usage
            .iter()
            .filter(|(_, acc)| acc.uses > limits.min_question_uses)
            .map(|(attribute, acc)| QuestionReport {
                attribute: attribute.clone(),
                uses: acc.uses,
                avg_info_gain: acc.total_gain / acc.uses as f64,
            })
            .filter(|report| report.avg_info_gain < limits.min_avg_gain)
            .collect();

        let weak_entities = self
            .entities
            .iter()
            .filter(|(_, tally)| {
                tally.attempts >= self.metrics.min_attempts
                    && tally.accuracy() < limits.entity_accuracy
            })
            .map(|(entity, tally)| {
                let mut confused_with: Vec<(String, usize)> = self
                    .confusions
                    .iter()
                    .filter(|((target, _), _)| target == entity)
                    .map(|((_, guessed), count)| (guessed.clone(), *count))
                    .collect();
                confused_with.sort_by(|a, b| b.1.cmp(&a.1));
                confused_with.truncate(limits.confusions_per_entity);
                WeakEntity {
                    entity_id: entity.clone(),
                    accuracy: tally.accuracy(),
                    confused_with,
                }
            })
            .collect();

        let weak_categories = self
            .categories
            .iter()
            .filter(|(_, tally)| tally.attempts > 0 && tally.accuracy() < limits.category_accuracy)
            .map(|(category, tally)| CategoryReport {
                category: category.clone(),
                games: tally.attempts,
                correct: tally.correct,
                accuracy: tally.accuracy(),
            })
            .collect();

        Suggestions {
            weak_questions,
            weak_entities,
            weak_categories,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: String,
    pub games: usize,
    pub correct: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionReport {
    pub attribute: String,
    pub uses: usize,
    /// Mean entropy drop (bits) when this question was answered.
    pub avg_info_gain: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub entity_id: String,
    pub attempts: usize,
    pub correct: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfusionReport {
    pub target: String,
    pub guessed: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeakEntity {
    pub entity_id: String,
    pub accuracy: f64,
    /// Most frequent wrong top beliefs, with counts.
    pub confused_with: Vec<(String, usize)>,
}

/// Catalog areas worth revisiting: low-gain questions to drop, entities
/// that need distinguishing attributes, categories whose hierarchy fails.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Suggestions {
    pub weak_questions: Vec<QuestionReport>,
    pub weak_entities: Vec<WeakEntity>,
    pub weak_categories: Vec<CategoryReport>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.weak_questions.is_empty()
            && self.weak_entities.is_empty()
            && self.weak_categories.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub games: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub confidence_level: f64,
    pub accuracy_ci: (f64, f64),
    pub top5_rate: f64,
    pub avg_questions: f64,
    pub std_questions: f64,
    pub categories: Vec<CategoryReport>,
    pub questions: Vec<QuestionReport>,
    pub hardest: Vec<EntityReport>,
    pub confusions: Vec<ConfusionReport>,
    pub stop_reasons: BTreeMap<String, usize>,
    pub suggestions: Suggestions,
}

impl AnalyticsSummary {
    pub fn write_markdown(&self, path: impl AsRef<Path>, run_id: &str) -> Result<(), AnalyticsError> {
        fs::write(path.as_ref(), self.to_markdown(run_id)).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })
    }

    pub fn to_markdown(&self, run_id: &str) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Simulation Summary: {run_id}\n");
        md.push_str("| Games | Correct | Accuracy | CI | Top-5 % | Avg questions | Std questions |\n");
        md.push_str("|-------|---------|----------|----|---------|---------------|---------------|\n");
        let _ = writeln!(
            md,
            "| {games} | {correct} | {acc:.1}% | {level:.0}%: [{lo:.1}%, {hi:.1}%] | {top5:.1}% | {avg:.2} | {std:.2} |\n",
            games = self.games,
            correct = self.correct,
            acc = self.accuracy * 100.0,
            level = self.confidence_level * 100.0,
            lo = self.accuracy_ci.0 * 100.0,
            hi = self.accuracy_ci.1 * 100.0,
            top5 = self.top5_rate * 100.0,
            avg = self.avg_questions,
            std = self.std_questions,
        );

        md.push_str("## Accuracy by category\n\n");
        md.push_str("| Category | Games | Correct | Accuracy |\n");
        md.push_str("|----------|-------|---------|----------|\n");
        for row in &self.categories {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {:.1}% |",
                row.category,
                row.games,
                row.correct,
                row.accuracy * 100.0
            );
        }

        md.push_str("\n## Most used questions\n\n");
        md.push_str("| Attribute | Uses | Avg info gain (bits) |\n");
        md.push_str("|-----------|------|----------------------|\n");
        for row in &self.questions {
            let _ = writeln!(
                md,
                "| {} | {} | {:.3} |",
                row.attribute, row.uses, row.avg_info_gain
            );
        }

        md.push_str("\n## Hardest entities\n\n");
        if self.hardest.is_empty() {
            md.push_str("_No entity reached the minimum number of attempts._\n");
        } else {
            md.push_str("| Entity | Attempts | Correct | Accuracy |\n");
            md.push_str("|--------|----------|---------|----------|\n");
            for row in &self.hardest {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {:.1}% |",
                    row.entity_id,
                    row.attempts,
                    row.correct,
                    row.accuracy * 100.0
                );
            }
        }

        md.push_str("\n## Confusions\n\n");
        if self.confusions.is_empty() {
            md.push_str("_None._\n");
        } else {
            md.push_str("| Target | Top belief | Count |\n");
            md.push_str("|--------|------------|-------|\n");
            for row in &self.confusions {
                let _ = writeln!(md, "| {} | {} | {} |", row.target, row.guessed, row.count);
            }
        }

        md.push_str("\n## Stop reasons\n\n");
        for (reason, count) in &self.stop_reasons {
            let _ = writeln!(md, "- {reason}: {count}");
        }

        md.push_str("\n## Suggestions\n\n");
        let suggestions = &self.suggestions;
        if suggestions.is_empty() {
            md.push_str("_Nothing flagged._\n");
        }
        for row in &suggestions.weak_questions {
            let _ = writeln!(
                md,
                "- Consider removing `{}`: {:.3} bits on average over {} uses.",
                row.attribute, row.avg_info_gain, row.uses
            );
        }
        for row in &suggestions.weak_entities {
            let confused = row
                .confused_with
                .iter()
                .map(|(id, count)| format!("{id} ({count})"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(
                md,
                "- `{}` needs distinguishing attributes: {:.1}% success",
                row.entity_id,
                row.accuracy * 100.0
            );
            if confused.is_empty() {
                md.push_str(".\n");
            } else {
                let _ = writeln!(md, ", confused with {confused}.");
            }
        }
        for row in &suggestions.weak_categories {
            let _ = writeln!(
                md,
                "- Revisit the `{}` branch: {:.1}% accuracy over {} games.",
                row.category,
                row.accuracy * 100.0,
                row.games
            );
        }
        md
    }
}

/// Two-sided critical value of the standard normal.
fn z_score(confidence_level: f64) -> Result<f64, AnalyticsError> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(AnalyticsError::ConfidenceLevel(confidence_level));
    }
    let normal =
        Normal::new(0.0, 1.0).map_err(|_| AnalyticsError::ConfidenceLevel(confidence_level))?;
    Ok(normal.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0))
}

/// Normal-approximation interval for a proportion, clamped to [0, 1].
fn proportion_interval(p: f64, n: usize, z: f64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 0.0);
    }
    let margin = z * (p * (1.0 - p) / n as f64).sqrt();
    ((p - margin).max(0.0), (p + margin).min(1.0))
}

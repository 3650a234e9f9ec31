mod sampler;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Level, event};

use twentyq_core::catalog::{CatalogError, KnowledgeBase};
use twentyq_core::game::{EntityAnswerer, GameEngine, GameState};
use twentyq_core::implication::ImplicationEngine;
use twentyq_core::model::Entity;

use crate::analytics::{AnalyticsCollector, AnalyticsError, AnalyticsSummary};
use crate::config::{ResolvedOutputs, SimulationConfig};

use sampler::TargetSampler;

const TOP_K: usize = 5;

/// Plays configured batches of simulated games.
pub struct SimulationRunner {
    config: SimulationConfig,
    outputs: ResolvedOutputs,
    catalog: KnowledgeBase,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub games_played: usize,
    pub correct: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub analytics: AnalyticsSummary,
}

/// One JSONL row per simulated game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLogRow {
    pub run_id: String,
    pub game_index: usize,
    pub target_id: String,
    pub target_category: String,
    pub guess_id: Option<String>,
    pub correct: bool,
    pub num_questions: usize,
    /// 1-based rank of the target in the final beliefs.
    pub final_rank: Option<usize>,
    pub final_probability: f64,
    pub target_in_top5: bool,
    pub stop_reason: Option<String>,
    pub questions_asked: Vec<String>,
    /// Entropy before the first question, then after each answer.
    pub entropy_progression: Vec<f64>,
    pub top_entities: Vec<(String, f64)>,
}

impl GameLogRow {
    /// Realized information gain per asked question.
    pub fn question_gains(&self) -> impl Iterator<Item = (&str, f64)> {
        self.questions_asked
            .iter()
            .zip(self.entropy_progression.windows(2))
            .map(|(question, pair)| (question.as_str(), pair[0] - pair[1]))
    }
}

impl SimulationRunner {
    /// Loads the catalog named by a validated configuration.
    pub fn new(config: SimulationConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let catalog = KnowledgeBase::try_open(&config.catalog.data_dir)?;
        if catalog.entity_count() == 0 {
            return Err(RunnerError::EmptyCatalog {
                data_dir: config.catalog.data_dir.clone(),
            });
        }

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            catalog,
        })
    }

    pub fn catalog(&self) -> &KnowledgeBase {
        &self.catalog
    }

    /// Plays every game, streaming JSONL rows, then writes the Markdown summary.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut rng = StdRng::seed_from_u64(self.config.games.seed.unwrap_or(0));
        let sampler = TargetSampler::new(&self.catalog, self.config.games.selection)
            .map_err(|err| RunnerError::Sampling(err.to_string()))?;
        let mut analytics = AnalyticsCollector::new(&self.config.metrics);

        let catalog = if self.config.games.learn {
            self.catalog.clone()
        } else {
            // Evaluation runs never touch disk.
            KnowledgeBase::in_memory(
                self.catalog.entities().cloned().collect(),
                self.catalog.attributes().cloned().collect(),
            )
        };
        let mut engine = GameEngine::new(
            catalog,
            ImplicationEngine::default(),
            self.config.engine.clone(),
        );

        let mut rows_written = 0usize;
        let mut correct = 0usize;
        for game_index in 0..self.config.games.count {
            let target = sampler
                .sample(&mut rng)
                .and_then(|id| engine.catalog().entity(id))
                .cloned()
                .ok_or_else(|| RunnerError::Sampling("sampled entity vanished".into()))?;

            let row = self.play_game(&mut engine, game_index, &target);
            if row.correct {
                correct += 1;
            }
            analytics.record_game(&row);
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
            rows_written += 1;
        }
        writer.flush()?;

        let summary = analytics.finalize()?;
        summary.write_markdown(&self.outputs.summary_md, &self.config.run_id)?;

        Ok(RunSummary {
            games_played: self.config.games.count,
            correct,
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            analytics: summary,
        })
    }

    fn play_game(&self, engine: &mut GameEngine, game_index: usize, target: &Entity) -> GameLogRow {
        let mut answerer = EntityAnswerer::new(target, engine.implications());
        engine.start();
        let initial_entropy = engine.beliefs().entropy();
        let guess = engine.play(&mut answerer);

        let history = engine.turn_history();
        let mut entropy_progression = Vec::with_capacity(history.len() + 1);
        entropy_progression.push(initial_entropy);
        entropy_progression.extend(history.iter().map(|turn| turn.entropy_after));

        let beliefs = engine.beliefs();
        let top_entities: Vec<(String, f64)> = beliefs
            .top_k(TOP_K)
            .into_iter()
            .map(|(id, p)| (id.to_string(), p))
            .collect();
        let guess_id = guess.map(|guess| guess.entity_id);
        let correct = guess_id.as_deref() == Some(target.id.as_str());

        let row = GameLogRow {
            run_id: self.config.run_id.clone(),
            game_index,
            target_id: target.id.clone(),
            target_category: target.branch().to_string(),
            guess_id,
            correct,
            num_questions: engine.answers().len(),
            final_rank: beliefs.rank_of(&target.id),
            final_probability: beliefs.probability(&target.id),
            target_in_top5: top_entities.iter().any(|(id, _)| id == &target.id),
            stop_reason: engine.stop_reason().map(|reason| format!("{reason:?}")),
            questions_asked: history.iter().map(|turn| turn.attribute.clone()).collect(),
            entropy_progression,
            top_entities,
        };

        if self.logging_enabled && tracing::enabled!(Level::INFO) {
            event!(
                target: "twentyq_bench::game",
                Level::INFO,
                run_id = %self.config.run_id,
                game_index = game_index as u64,
                target_id = %row.target_id,
                guess_id = row.guess_id.as_deref().unwrap_or("<none>"),
                correct = row.correct,
                questions = row.num_questions as u64,
                final_probability = row.final_probability
            );
        }

        self.finish_game(engine, &row, target);
        row
    }

    /// Training mode feeds the verdict to the learner; otherwise the session
    /// is dropped.
    fn finish_game(&self, engine: &mut GameEngine, row: &GameLogRow, target: &Entity) {
        if !self.config.games.learn || row.guess_id.is_none() {
            engine.abort();
            return;
        }
        let actual = (!row.correct).then_some(target.name.as_str());
        if engine.process_guess_result(row.correct, actual) == GameState::LearningNew {
            engine.abort();
        }
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("catalog at {data_dir:?} has no entities")]
    EmptyCatalog { data_dir: PathBuf },
    #[error("target sampling failed: {0}")]
    Sampling(String),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_gains_pair_questions_with_entropy_drops() {
        let row = GameLogRow {
            run_id: "t".into(),
            game_index: 0,
            target_id: "dog".into(),
            target_category: "animal".into(),
            guess_id: Some("dog".into()),
            correct: true,
            num_questions: 2,
            final_rank: Some(1),
            final_probability: 0.9,
            target_in_top5: true,
            stop_reason: None,
            questions_asked: vec!["is_animal".into(), "is_mammal".into()],
            entropy_progression: vec![5.0, 3.5, 1.0],
            top_entities: vec![("dog".into(), 0.9)],
        };
        let gains: Vec<_> = row.question_gains().collect();
        assert_eq!(gains, vec![("is_animal", 1.5), ("is_mammal", 2.5)]);
    }
}

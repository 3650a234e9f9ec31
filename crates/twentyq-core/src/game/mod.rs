//! Game orchestration: the turn loop, guessing, and learning commit points.

mod answerer;
mod config;
mod engine;

pub use answerer::{Answerer, CONFIDENT_NO, CONFIDENT_YES, EntityAnswerer};
pub use config::GameConfig;
pub use engine::{
    CurrentState, GameEngine, GameState, GameSummary, Guess, Question, RankedEntity, TurnResult,
    TurnSummary,
};

//! Probability distribution over entities and the Bayesian update rule.
//!
//! - `state`: the normalized distribution itself (`BeliefState`).
//! - `tracker`: likelihoods against the catalog, including implied answers.

mod state;
mod tracker;

pub use state::BeliefState;
pub use tracker::{BeliefTracker, TrackerConfig, popularity_weight};

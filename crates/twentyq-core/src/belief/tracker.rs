use super::BeliefState;
use crate::catalog::KnowledgeBase;
use crate::implication::ImplicationEngine;
use crate::model::Answer;
use tracing::debug;

/// Likelihood constants for the Bayesian update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Likelihood assigned to every entity when the answer is "maybe".
    pub unknown_likelihood: f64,
    /// Added to every likelihood so no entity ever reaches zero.
    pub smoothing: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            unknown_likelihood: 0.5,
            smoothing: 0.01,
        }
    }
}

/// Prior weight for a popularity rank: `1 / log2(rank + 2)`.
pub fn popularity_weight(rank: u32) -> f64 {
    1.0 / (f64::from(rank) + 2.0).log2()
}

/// Applies answers to beliefs using the catalog's per-entity likelihoods.
#[derive(Debug, Clone, Copy)]
pub struct BeliefTracker<'a> {
    catalog: &'a KnowledgeBase,
    implications: &'a ImplicationEngine,
    config: TrackerConfig,
}

impl<'a> BeliefTracker<'a> {
    pub fn new(
        catalog: &'a KnowledgeBase,
        implications: &'a ImplicationEngine,
        config: TrackerConfig,
    ) -> Self {
        Self {
            catalog,
            implications,
            config,
        }
    }

    /// Uniform prior over every catalog entity.
    pub fn initialize(&self) -> BeliefState {
        BeliefState::uniform(self.catalog.entity_ids())
    }

    /// Prior favouring well-known entities; see [`popularity_weight`].
    pub fn initialize_popularity(&self) -> BeliefState {
        BeliefState::from_weights(
            self.catalog
                .entities()
                .map(|entity| (entity.id.clone(), popularity_weight(entity.popularity_rank()))),
        )
    }

    /// `P(answer | entity)` given the entity's `P(yes)`.
    pub fn likelihood(&self, p_yes: f64, answer: f64) -> f64 {
        match Answer::classify(answer) {
            Answer::Yes => p_yes,
            Answer::No => 1.0 - p_yes,
            Answer::Maybe => self.config.unknown_likelihood,
        }
    }

    /// Posterior after `attribute = answer` and every direct implication of it.
    pub fn update(&self, beliefs: &BeliefState, attribute: &str, answer: f64) -> BeliefState {
        let result = self.simulate(beliefs, attribute, answer);
        debug!(
            attribute,
            answer,
            entropy = result.entropy(),
            confidence = result.confidence(),
            "beliefs updated"
        );
        result
    }

    /// Same rule as [`BeliefTracker::update`] without the trace event; used for
    /// look-ahead. `beliefs` is left untouched.
    pub fn simulate(&self, beliefs: &BeliefState, attribute: &str, answer: f64) -> BeliefState {
        let mut result = self.apply_single(beliefs, attribute, answer);
        for (implied_attribute, implied_value) in
            self.implications.get_implications(attribute, answer)
        {
            result = self.apply_single(&result, implied_attribute, *implied_value);
        }
        result
    }

    /// One Bayesian step. Entities no longer in the catalog drop out.
    fn apply_single(&self, beliefs: &BeliefState, attribute: &str, answer: f64) -> BeliefState {
        BeliefState::from_weights(beliefs.iter().filter_map(|(entity_id, prior)| {
            let entity = self.catalog.entity(entity_id)?;
            let likelihood = self.likelihood(entity.attribute_probability(attribute), answer);
            Some((entity_id, (likelihood + self.config.smoothing) * prior))
        }))
    }

    /// Marginal `P(yes)` for `attribute` under `beliefs`.
    pub fn answer_probability(&self, beliefs: &BeliefState, attribute: &str) -> f64 {
        beliefs
            .iter()
            .filter_map(|(entity_id, p)| {
                self.catalog
                    .entity(entity_id)
                    .map(|entity| entity.attribute_probability(attribute) * p)
            })
            .sum()
    }

    pub fn entropy(&self, beliefs: &BeliefState) -> f64 {
        beliefs.entropy()
    }

    pub fn confidence(&self, beliefs: &BeliefState) -> f64 {
        beliefs.confidence()
    }

    pub fn top_entity<'b>(&self, beliefs: &'b BeliefState) -> Option<&'b str> {
        beliefs.top().map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implication::RuleTable;
    use crate::model::{Attribute, Entity};

    const EPS: f64 = 1e-9;

    fn xyz() -> KnowledgeBase {
        KnowledgeBase::in_memory(
            vec![
                Entity::new("x", "x").with_attribute("a", 0.9),
                Entity::new("y", "y").with_attribute("a", 0.1),
                Entity::new("z", "z").with_attribute("a", 0.5),
            ],
            vec![Attribute::new("a", "Is it a?")],
        )
    }

    fn total(state: &BeliefState) -> f64 {
        state.iter().map(|(_, p)| p).sum()
    }

    #[test]
    fn yes_answer_favours_high_likelihood_entity() {
        let kb = xyz();
        let rules = ImplicationEngine::empty();
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let prior = tracker.initialize();
        let posterior = tracker.update(&prior, "a", 1.0);

        assert!((total(&posterior) - 1.0).abs() < EPS);
        let (x, y, z) = (
            posterior.probability("x"),
            posterior.probability("y"),
            posterior.probability("z"),
        );
        assert!(x > z && z > y);
        assert!((x - 0.91 / 1.53).abs() < EPS);
        assert_eq!(tracker.top_entity(&posterior), Some("x"));
    }

    #[test]
    fn update_preserves_likelihood_ordering() {
        let kb = KnowledgeBase::in_memory(
            (0..6)
                .map(|i| {
                    Entity::new(format!("e{i}"), format!("e{i}"))
                        .with_attribute("a", f64::from(i) / 5.0)
                })
                .collect(),
            vec![Attribute::new("a", "?")],
        );
        let rules = ImplicationEngine::empty();
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let prior = BeliefState::from_weights([
            ("e0", 0.3),
            ("e1", 0.1),
            ("e2", 0.2),
            ("e3", 0.15),
            ("e4", 0.05),
            ("e5", 0.2),
        ]);
        let posterior = tracker.update(&prior, "a", 1.0);
        for i in 0..6 {
            for j in 0..6 {
                if i <= j {
                    continue;
                }
                let (a, b) = (format!("e{i}"), format!("e{j}"));
                let before = prior.probability(&a) / prior.probability(&b);
                let after = posterior.probability(&a) / posterior.probability(&b);
                assert!(after > before, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn smoothing_keeps_contradicted_entities_alive() {
        let kb = xyz();
        let rules = ImplicationEngine::empty();
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let mut beliefs = tracker.initialize();
        for _ in 0..20 {
            beliefs = tracker.update(&beliefs, "a", 0.0);
        }
        assert!(beliefs.probability("x") > 0.0);
        assert!((total(&beliefs) - 1.0).abs() < EPS);
    }

    #[test]
    fn maybe_answer_leaves_beliefs_unchanged() {
        let kb = xyz();
        let rules = ImplicationEngine::empty();
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let prior = BeliefState::from_weights([("x", 0.6), ("y", 0.3), ("z", 0.1)]);
        let posterior = tracker.update(&prior, "a", 0.5);
        for id in ["x", "y", "z"] {
            assert!((posterior.probability(id) - prior.probability(id)).abs() < EPS);
        }
    }

    #[test]
    fn implied_answers_are_applied_after_the_direct_one() {
        let kb = KnowledgeBase::in_memory(
            vec![
                Entity::new("robin", "a robin")
                    .with_attribute("is_bird", 0.5)
                    .with_attribute("has_fur", 0.0),
                Entity::new("bear", "a bear")
                    .with_attribute("is_bird", 0.5)
                    .with_attribute("has_fur", 1.0),
            ],
            vec![],
        );
        let rules = ImplicationEngine::new(RuleTable::new().rule("is_bird", true, &[("has_fur", 0.0)]));
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let posterior = tracker.update(&tracker.initialize(), "is_bird", 1.0);
        assert!(posterior.probability("robin") > 0.9);

        // Maybe never fires implications.
        let unchanged = tracker.update(&tracker.initialize(), "is_bird", 0.5);
        assert!((unchanged.probability("robin") - 0.5).abs() < EPS);
    }

    #[test]
    fn simulate_does_not_mutate_input() {
        let kb = xyz();
        let rules = ImplicationEngine::empty();
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let prior = tracker.initialize();
        let snapshot = prior.clone();
        let simulated = tracker.simulate(&prior, "a", 1.0);
        assert_eq!(prior, snapshot);
        assert_eq!(simulated, tracker.update(&prior, "a", 1.0));
    }

    #[test]
    fn answer_probability_is_belief_weighted() {
        let kb = xyz();
        let rules = ImplicationEngine::empty();
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let uniform = tracker.initialize();
        assert!((tracker.answer_probability(&uniform, "a") - 0.5).abs() < EPS);
        let skewed = BeliefState::from_weights([("x", 1.0), ("y", 0.0), ("z", 0.0)]);
        assert!((tracker.answer_probability(&skewed, "a") - 0.9).abs() < EPS);
        // Unknown attribute: every entity answers 0.5.
        assert!((tracker.answer_probability(&skewed, "nope") - 0.5).abs() < EPS);
    }

    #[test]
    fn popularity_prior_prefers_low_ranks() {
        let kb = KnowledgeBase::in_memory(
            vec![
                Entity::new("dog", "a dog").with_popularity_rank(0),
                Entity::new("okapi", "an okapi").with_popularity_rank(900),
                Entity::new("plain", "unranked"),
            ],
            vec![],
        );
        let rules = ImplicationEngine::empty();
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let prior = tracker.initialize_popularity();
        assert!((total(&prior) - 1.0).abs() < EPS);
        assert!(prior.probability("dog") > prior.probability("plain"));
        assert!(prior.probability("plain") > prior.probability("okapi"));
        assert!((popularity_weight(0) - 1.0).abs() < EPS);
    }

    #[test]
    fn stale_entities_drop_out_of_the_update() {
        let kb = xyz();
        let rules = ImplicationEngine::empty();
        let tracker = BeliefTracker::new(&kb, &rules, TrackerConfig::default());
        let prior = BeliefState::uniform(["x", "ghost"]);
        let posterior = tracker.update(&prior, "a", 1.0);
        assert_eq!(posterior.len(), 1);
        assert!((posterior.probability("x") - 1.0).abs() < EPS);
    }
}

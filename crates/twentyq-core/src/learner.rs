//! Post-game feedback: nudges entity likelihoods toward what players said.

use crate::catalog::KnowledgeBase;
use crate::model::{Attribute, DEFAULT_ATTRIBUTE_PROBABILITY, Entity};
use tracing::info;

/// Category given to attributes minted from player-supplied questions.
pub const LEARNED_CATEGORY: &str = "learned";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnerConfig {
    pub learning_rate: f64,
    pub min_weight: f64,
    pub max_weight: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            min_weight: 0.01,
            max_weight: 0.99,
        }
    }
}

impl LearnerConfig {
    /// One exponential-moving-average step from `current` toward `target`.
    pub fn step(&self, current: f64, target: f64, rate: f64) -> f64 {
        (current + rate * (target - current)).clamp(self.min_weight, self.max_weight)
    }
}

/// A free-text question the player offered to tell their answer apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Distinguisher<'q> {
    pub question: &'q str,
    pub answer: f64,
}

/// Mutates the catalog's learned overlay. Persisting is left to the caller.
pub struct WeightLearner<'a> {
    catalog: &'a mut KnowledgeBase,
    config: LearnerConfig,
}

impl<'a> WeightLearner<'a> {
    pub fn new(catalog: &'a mut KnowledgeBase, config: LearnerConfig) -> Self {
        Self { catalog, config }
    }

    /// Moves `entity_id` toward every answer given this session.
    ///
    /// A wrong guess teaches at half rate. Unknown ids are ignored.
    pub fn update_from_session(
        &mut self,
        entity_id: &str,
        answers: &[(String, f64)],
        was_correct: bool,
    ) -> bool {
        let config = self.config;
        let rate = if was_correct {
            config.learning_rate
        } else {
            config.learning_rate * 0.5
        };
        let Some(entity) = self.catalog.entity_mut(entity_id) else {
            return false;
        };

        for (attribute, answer) in answers {
            let current = entity.attribute_probability(attribute);
            entity
                .attributes
                .insert(attribute.clone(), config.step(current, *answer, rate));
        }
        entity.times_played += 1;
        if was_correct {
            entity.times_guessed_correctly += 1;
        }
        info!(entity_id, answers = answers.len(), was_correct, "session learned");
        true
    }

    /// Pushes the wrongly guessed entity away from each answer and the actual
    /// entity toward it. Both must exist.
    pub fn adjust_weights_for_confusion(
        &mut self,
        guessed_id: &str,
        actual_id: &str,
        answers: &[(String, f64)],
    ) -> bool {
        if guessed_id == actual_id
            || !self.catalog.contains_entity(guessed_id)
            || !self.catalog.contains_entity(actual_id)
        {
            return false;
        }
        let config = self.config;

        if let Some(guessed) = self.catalog.entity_mut(guessed_id) {
            for (attribute, answer) in answers {
                let current = guessed.attribute_probability(attribute);
                let pushed = config.step(current, 1.0 - answer, config.learning_rate * 0.5);
                guessed.attributes.insert(attribute.clone(), pushed);
            }
            guessed.times_played += 1;
        }
        if let Some(actual) = self.catalog.entity_mut(actual_id) {
            for (attribute, answer) in answers {
                let current = actual.attribute_probability(attribute);
                let pulled = config.step(current, *answer, config.learning_rate);
                actual.attributes.insert(attribute.clone(), pulled);
            }
            actual.times_played += 1;
        }
        info!(guessed_id, actual_id, "confusion adjusted");
        true
    }

    /// Adds an entity described exactly by this session's answers, plus an
    /// optional freshly minted attribute.
    pub fn learn_new_entity(
        &mut self,
        name: &str,
        answers: &[(String, f64)],
        distinguisher: Option<Distinguisher<'_>>,
    ) -> Entity {
        let mut entity = Entity::new(self.catalog.generate_entity_id(name), name.trim());
        for (attribute, answer) in answers {
            entity.attributes.insert(attribute.clone(), *answer);
        }

        if let Some(Distinguisher { question, answer }) = distinguisher {
            let question = question.trim();
            if !question.is_empty() {
                let attribute_id = self.catalog.generate_attribute_id(question);
                self.catalog.add_attribute(
                    Attribute::new(attribute_id.clone(), question).with_category(LEARNED_CATEGORY),
                );
                let answer = if answer.is_finite() {
                    answer.clamp(0.0, 1.0)
                } else {
                    DEFAULT_ATTRIBUTE_PROBABILITY
                };
                entity.attributes.insert(attribute_id, answer);
            }
        }

        entity.times_played = 1;
        info!(
            entity_id = %entity.id,
            attributes = entity.attributes.len(),
            "new entity learned"
        );
        self.catalog.add_entity(entity.clone());
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::in_memory(
            vec![
                Entity::new("dog", "a dog")
                    .with_attribute("barks", 0.8)
                    .with_attribute("has_fur", 0.995),
                Entity::new("wolf", "a wolf").with_attribute("barks", 0.6),
            ],
            vec![
                Attribute::new("barks", "Does it bark?"),
                Attribute::new("has_fur", "Does it have fur?"),
            ],
        )
    }

    fn answers(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(a, v)| (a.to_string(), *v)).collect()
    }

    #[test]
    fn correct_session_moves_toward_answers_at_full_rate() {
        let mut kb = kb();
        let mut learner = WeightLearner::new(&mut kb, LearnerConfig::default());
        assert!(learner.update_from_session(
            "dog",
            &answers(&[("barks", 1.0), ("is_pet", 1.0), ("has_fur", 1.0)]),
            true
        ));

        let dog = kb.entity("dog").unwrap();
        assert!((dog.attribute_probability("barks") - 0.82).abs() < EPS);
        // Absent attributes start from 0.5.
        assert!((dog.attribute_probability("is_pet") - 0.55).abs() < EPS);
        // Clamped to max_weight.
        assert!((dog.attribute_probability("has_fur") - 0.99).abs() < EPS);
        assert_eq!(dog.times_played, 1);
        assert_eq!(dog.times_guessed_correctly, 1);
    }

    #[test]
    fn wrong_session_moves_at_half_rate() {
        let mut kb = kb();
        let mut learner = WeightLearner::new(&mut kb, LearnerConfig::default());
        learner.update_from_session("dog", &answers(&[("barks", 0.0)]), false);
        let dog = kb.entity("dog").unwrap();
        assert!((dog.attribute_probability("barks") - 0.76).abs() < EPS);
        assert_eq!(dog.times_played, 1);
        assert_eq!(dog.times_guessed_correctly, 0);
    }

    #[test]
    fn unknown_entity_is_ignored() {
        let mut kb = kb();
        let mut learner = WeightLearner::new(&mut kb, LearnerConfig::default());
        assert!(!learner.update_from_session("ghost", &answers(&[("barks", 1.0)]), true));
        assert!(!learner.adjust_weights_for_confusion("dog", "ghost", &[]));
        assert_eq!(kb.stats().total_games_played, 0);
    }

    #[test]
    fn confusion_separates_the_two_entities() {
        let mut kb = kb();
        let mut learner = WeightLearner::new(&mut kb, LearnerConfig::default());
        assert!(learner.adjust_weights_for_confusion("dog", "wolf", &answers(&[("barks", 0.0)])));

        let dog = kb.entity("dog").unwrap();
        let wolf = kb.entity("wolf").unwrap();
        // Guessed: toward 1 - 0.0 at half rate.
        assert!((dog.attribute_probability("barks") - 0.81).abs() < EPS);
        // Actual: toward 0.0 at full rate.
        assert!((wolf.attribute_probability("barks") - 0.54).abs() < EPS);
        assert_eq!(dog.times_played, 1);
        assert_eq!(wolf.times_played, 1);
        assert_eq!(dog.times_guessed_correctly, 0);
    }

    #[test]
    fn new_entity_uses_exactly_the_session_answers() {
        let mut kb = kb();
        let mut learner = WeightLearner::new(&mut kb, LearnerConfig::default());
        let session = answers(&[("barks", 0.0), ("has_fur", 1.0), ("is_pet", 0.5)]);
        let fox = learner.learn_new_entity("A Fox", &session, None);

        assert_eq!(fox.id, "fox");
        assert_eq!(fox.name, "A Fox");
        assert_eq!(fox.times_played, 1);
        assert_eq!(fox.attributes.len(), 3);
        for (attribute, value) in &session {
            assert_eq!(fox.attributes.get(attribute), Some(value));
        }
        assert_eq!(kb.entity("fox"), Some(&fox));
    }

    #[test]
    fn distinguishing_question_mints_a_learned_attribute() {
        let mut kb = kb();
        let mut learner = WeightLearner::new(&mut kb, LearnerConfig::default());
        let session = answers(&[("barks", 1.0)]);
        let entity = learner.learn_new_entity(
            "a dog",
            &session,
            Some(Distinguisher {
                question: "Does it howl at the moon?",
                answer: 1.0,
            }),
        );

        assert_eq!(entity.id, "dog_1");
        assert_eq!(entity.attributes.get("howl_at_moon"), Some(&1.0));
        let attribute = kb.attribute("howl_at_moon").unwrap();
        assert_eq!(attribute.category, LEARNED_CATEGORY);
        assert_eq!(attribute.question, "Does it howl at the moon?");
    }
}

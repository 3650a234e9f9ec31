//! Soft logical implications between attributes.
//!
//! A definitive answer to one attribute implies values for others
//! (`is_bird = yes` gives `has_feathers = 1.0`, `has_fur = 0.0`, ...). The
//! engine answers two questions: what a fresh answer implies (forward), and
//! whether an unasked attribute is already forced by what is known (reverse).
//! Implied values are never clamped or cross-checked; when several rules
//! determine the same attribute the first one in table order wins.

mod rules;

pub use rules::RuleTable;

use crate::model::Answer;
use std::collections::BTreeMap;
use tracing::debug;

/// Attribute id to answer value, direct or implied.
pub type KnownAnswers = BTreeMap<String, f64>;

/// Upper bound on reverse-propagation passes in
/// [`ImplicationEngine::get_all_determined_attributes`].
pub const DETERMINATION_PASS_LIMIT: usize = 10;
/// Upper bound on forward-propagation passes in [`ImplicationEngine::closure`].
pub const CLOSURE_PASS_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    attribute: String,
    answer: bool,
    implied: f64,
}

impl Condition {
    fn holds(&self, known: &KnownAnswers) -> bool {
        known
            .get(&self.attribute)
            .is_some_and(|value| Answer::classify(*value).definitive() == Some(self.answer))
    }
}

#[derive(Debug, Clone)]
pub struct ImplicationEngine {
    rules: RuleTable,
    implied_by: BTreeMap<String, Vec<Condition>>,
}

impl Default for ImplicationEngine {
    fn default() -> Self {
        Self::new(RuleTable::default_rules())
    }
}

impl ImplicationEngine {
    pub fn new(rules: RuleTable) -> Self {
        let mut implied_by: BTreeMap<String, Vec<Condition>> = BTreeMap::new();
        for (attribute, answer, implied) in rules.iter() {
            for (target, value) in implied {
                implied_by
                    .entry(target.clone())
                    .or_default()
                    .push(Condition {
                        attribute: attribute.to_string(),
                        answer,
                        implied: *value,
                    });
            }
        }
        Self { rules, implied_by }
    }

    /// Engine with no rules; nothing is ever implied.
    pub fn empty() -> Self {
        Self::new(RuleTable::new())
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Direct implications of answering `attribute` with `answer`.
    ///
    /// Maybe-range answers imply nothing.
    pub fn get_implications(&self, attribute: &str, answer: f64) -> &[(String, f64)] {
        match Answer::classify(answer).definitive() {
            Some(flag) => self.rules.get(attribute, flag),
            None => &[],
        }
    }

    /// Value forced on `attribute` by some known answer, if any.
    pub fn is_already_determined(&self, attribute: &str, known: &KnownAnswers) -> Option<f64> {
        self.implied_by
            .get(attribute)?
            .iter()
            .find(|condition| condition.holds(known))
            .map(|condition| condition.implied)
    }

    /// Every attribute not in `known` that the rules force, transitively.
    ///
    /// Each pass evaluates against the state at the start of the pass; passes
    /// stop at a fixed point or after [`DETERMINATION_PASS_LIMIT`].
    pub fn get_all_determined_attributes(&self, known: &KnownAnswers) -> KnownAnswers {
        let mut all_known = known.clone();
        let mut determined = KnownAnswers::new();

        for pass in 0..DETERMINATION_PASS_LIMIT {
            let fresh: Vec<(String, f64)> = self
                .implied_by
                .keys()
                .filter(|attribute| !all_known.contains_key(*attribute))
                .filter_map(|attribute| {
                    self.is_already_determined(attribute, &all_known)
                        .map(|value| (attribute.clone(), value))
                })
                .collect();

            if fresh.is_empty() {
                break;
            }
            debug!(pass, count = fresh.len(), "attributes determined");
            for (attribute, value) in fresh {
                all_known.insert(attribute.clone(), value);
                determined.insert(attribute, value);
            }
        }

        determined
    }

    /// Direct answers plus everything they imply, transitively.
    ///
    /// Direct answers are never overwritten, and the first implication to
    /// reach an attribute keeps it.
    pub fn closure<'a, I>(&self, answers: I) -> KnownAnswers
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut known = KnownAnswers::new();
        for (attribute, value) in answers {
            known.entry(attribute.to_string()).or_insert(value);
        }

        for _ in 0..CLOSURE_PASS_LIMIT {
            let mut changed = false;
            let snapshot: Vec<(String, f64)> = known
                .iter()
                .map(|(attribute, value)| (attribute.clone(), *value))
                .collect();
            for (attribute, value) in snapshot {
                for (implied, implied_value) in self.get_implications(&attribute, value) {
                    if !known.contains_key(implied) {
                        known.insert(implied.clone(), *implied_value);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(pairs: &[(&str, f64)]) -> KnownAnswers {
        pairs
            .iter()
            .map(|(attribute, value)| (attribute.to_string(), *value))
            .collect()
    }

    #[test]
    fn maybe_answers_imply_nothing() {
        let engine = ImplicationEngine::default();
        assert!(engine.get_implications("is_bird", 0.5).is_empty());
        assert!(engine.get_implications("is_bird", 0.7).is_empty());
        assert!(!engine.get_implications("is_bird", 0.71).is_empty());
        assert!(!engine.get_implications("is_animal", 0.1).is_empty());
    }

    #[test]
    fn unknown_attribute_is_never_determined() {
        let engine = ImplicationEngine::default();
        let known = known(&[("is_bird", 1.0)]);
        assert_eq!(engine.is_already_determined("glows_in_dark", &known), None);
        assert!(engine.get_implications("glows_in_dark", 1.0).is_empty());
    }

    #[test]
    fn bird_answer_forces_feathers_and_excludes_mammals_transitively() {
        let engine = ImplicationEngine::default();
        let determined = engine.get_all_determined_attributes(&known(&[("is_bird", 1.0)]));

        assert_eq!(determined.get("has_feathers"), Some(&1.0));
        assert_eq!(determined.get("has_fur"), Some(&0.0));
        assert_eq!(determined.get("is_mammal"), Some(&0.0));
        // Second hop: is_mammal = no rules out mammal families.
        assert_eq!(determined.get("is_cetacean"), Some(&0.0));
        // Inputs are not echoed back.
        assert!(!determined.contains_key("is_bird"));
    }

    #[test]
    fn determination_is_idempotent() {
        let engine = ImplicationEngine::default();
        let start = known(&[("is_animal", 1.0), ("is_feline", 1.0), ("is_pet", 0.0)]);
        let first = engine.get_all_determined_attributes(&start);
        let second = engine.get_all_determined_attributes(&start);
        assert_eq!(first, second);

        let mut saturated = start.clone();
        saturated.extend(first);
        let nothing_new = engine.get_all_determined_attributes(&saturated);
        assert!(nothing_new.is_empty());
    }

    #[test]
    fn reverse_lookup_respects_answer_polarity() {
        let engine = ImplicationEngine::new(
            RuleTable::new()
                .rule("is_animal", false, &[("is_pet", 0.0)])
                .rule("is_wild", true, &[("is_pet", 0.1)]),
        );
        assert_eq!(
            engine.is_already_determined("is_pet", &known(&[("is_animal", 1.0)])),
            None
        );
        assert_eq!(
            engine.is_already_determined("is_pet", &known(&[("is_animal", 0.0)])),
            Some(0.0)
        );
        assert_eq!(
            engine.is_already_determined("is_pet", &known(&[("is_animal", 0.5), ("is_wild", 0.9)])),
            Some(0.1)
        );
    }

    #[test]
    fn cyclic_rules_terminate() {
        let engine = ImplicationEngine::new(
            RuleTable::new()
                .rule("a", true, &[("b", 0.0)])
                .rule("b", false, &[("a", 0.0)]),
        );
        let closure = engine.closure([("a", 1.0)]);
        // Direct answer wins over the contradicting implication.
        assert_eq!(closure.get("a"), Some(&1.0));
        assert_eq!(closure.get("b"), Some(&0.0));

        let determined = engine.get_all_determined_attributes(&known(&[("a", 1.0)]));
        assert_eq!(determined, known(&[("b", 0.0)]));
    }

    #[test]
    fn long_chains_stop_at_the_pass_limit() {
        let mut table = RuleTable::new();
        let names: Vec<String> = (0..=DETERMINATION_PASS_LIMIT + 5)
            .map(|i| format!("link_{i:02}"))
            .collect();
        for pair in names.windows(2) {
            table.insert(&pair[0], true, &[(pair[1].as_str(), 1.0)]);
        }
        let engine = ImplicationEngine::new(table);
        let determined = engine.get_all_determined_attributes(&known(&[("link_00", 1.0)]));
        assert_eq!(determined.len(), DETERMINATION_PASS_LIMIT);

        let closure = engine.closure([("link_00", 1.0)]);
        assert_eq!(closure.len(), names.len());
    }

    #[test]
    fn closure_includes_direct_and_implied_answers() {
        let engine = ImplicationEngine::default();
        let closure = engine.closure([("is_canine", 1.0), ("is_wild", 0.5)]);
        assert_eq!(closure.get("is_canine"), Some(&1.0));
        assert_eq!(closure.get("is_mammal"), Some(&1.0));
        // is_mammal = yes rules out birds one hop later.
        assert_eq!(closure.get("is_bird"), Some(&0.0));
        assert_eq!(closure.get("is_wild"), Some(&0.5));
    }
}

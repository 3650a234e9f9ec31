//! Question selection and the stop rule.
//!
//! Questions are drawn tier by tier (see [`TierPlan`]): fixed-order tiers
//! return the first eligible question, info-gain tiers return the best one.
//! A question is eligible when it has not been asked, is not forced by known
//! answers, exists in the catalog, and is expected to gain at least
//! `min_info_gain` bits.

mod guess;
mod tiers;

pub use guess::{
    DOMINANCE_RATIO, ENTROPY_CUTOFF, GuessReason, guess_reason, progressive_bar, should_guess,
};
pub use tiers::{BRANCH_CONFIRM, BRANCH_REJECT, Branch, Tier, TierPlan};

use crate::belief::{BeliefState, BeliefTracker};
use crate::catalog::KnowledgeBase;
use crate::implication::{ImplicationEngine, KnownAnswers};
use std::collections::BTreeSet;
use tracing::debug;

/// Marginal `P(yes)` is clamped to this band before weighting the branches.
const ANSWER_PROBABILITY_CLAMP: (f64, f64) = (0.01, 0.99);

pub const DEFAULT_MIN_INFO_GAIN: f64 = 0.001;

/// A chosen question with the reason it won.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub attribute: String,
    pub tier: Tier,
    pub info_gain: f64,
}

pub struct QuestionSelector<'a> {
    catalog: &'a KnowledgeBase,
    tracker: BeliefTracker<'a>,
    implications: &'a ImplicationEngine,
    plan: &'a TierPlan,
    min_info_gain: f64,
}

impl<'a> QuestionSelector<'a> {
    pub fn new(
        catalog: &'a KnowledgeBase,
        tracker: BeliefTracker<'a>,
        implications: &'a ImplicationEngine,
        plan: &'a TierPlan,
        min_info_gain: f64,
    ) -> Self {
        Self {
            catalog,
            tracker,
            implications,
            plan,
            min_info_gain,
        }
    }

    /// Expected entropy reduction from asking `attribute`.
    ///
    /// Only the yes and no outcomes are weighed; maybe is not modelled.
    pub fn info_gain(&self, beliefs: &BeliefState, attribute: &str) -> f64 {
        self.info_gain_from(beliefs, beliefs.entropy(), attribute)
    }

    fn info_gain_from(&self, beliefs: &BeliefState, current: f64, attribute: &str) -> f64 {
        let (low, high) = ANSWER_PROBABILITY_CLAMP;
        let p_yes = self
            .tracker
            .answer_probability(beliefs, attribute)
            .clamp(low, high);
        let p_no = 1.0 - p_yes;
        let if_yes = self.tracker.simulate(beliefs, attribute, 1.0).entropy();
        let if_no = self.tracker.simulate(beliefs, attribute, 0.0).entropy();
        current - (p_yes * if_yes + p_no * if_no)
    }

    /// Not asked, not forced by `known`, and present in the catalog.
    pub fn is_candidate(
        &self,
        attribute: &str,
        asked: &BTreeSet<String>,
        known: &KnownAnswers,
    ) -> bool {
        !asked.contains(attribute)
            && !known.contains_key(attribute)
            && self
                .implications
                .is_already_determined(attribute, known)
                .is_none()
            && self.catalog.contains_attribute(attribute)
    }

    /// Best next question, or `None` when every tier is exhausted.
    pub fn select_best_question(
        &self,
        beliefs: &BeliefState,
        asked: &BTreeSet<String>,
        known: &KnownAnswers,
    ) -> Option<String> {
        self.select(beliefs, asked, known)
            .map(|selection| selection.attribute)
    }

    pub fn select(
        &self,
        beliefs: &BeliefState,
        asked: &BTreeSet<String>,
        known: &KnownAnswers,
    ) -> Option<Selection> {
        if beliefs.is_empty() {
            return None;
        }
        let current = beliefs.entropy();

        let branch = self.plan.active_branch(|root| {
            known
                .get(root)
                .copied()
                .unwrap_or_else(|| self.tracker.answer_probability(beliefs, root))
        });

        let open: Vec<&str> = self
            .catalog
            .attributes()
            .map(|attr| attr.id.as_str())
            .filter(|id| !self.plan.is_scheduled(id, branch))
            .collect();
        let tiers: [(Tier, Vec<&str>); 4] = [
            (Tier::Category, self.plan.category.iter().map(String::as_str).collect()),
            (
                Tier::Branch,
                branch
                    .map(|branch| branch.questions.iter().map(String::as_str).collect())
                    .unwrap_or_default(),
            ),
            (Tier::Family, self.plan.families.iter().map(String::as_str).collect()),
            (Tier::Open, open),
        ];

        for (tier, attributes) in tiers {
            let mut eligible = attributes
                .into_iter()
                .filter(|attribute| self.is_candidate(attribute, asked, known))
                .map(|attribute| (attribute, self.info_gain_from(beliefs, current, attribute)))
                .filter(|(_, gain)| *gain >= self.min_info_gain);

            let chosen = if tier.is_fixed_order() {
                eligible.next()
            } else {
                eligible.fold(None, |best: Option<(&str, f64)>, (attribute, gain)| match best {
                    Some((_, best_gain)) if best_gain >= gain => best,
                    _ => Some((attribute, gain)),
                })
            };

            if let Some((attribute, info_gain)) = chosen {
                debug!(attribute, ?tier, info_gain, "question selected");
                return Some(Selection {
                    attribute: attribute.to_string(),
                    tier,
                    info_gain,
                });
            }
        }

        debug!(asked = asked.len(), "no eligible question left");
        None
    }

    /// Every candidate question ranked by information gain, best first.
    pub fn top_questions(
        &self,
        beliefs: &BeliefState,
        asked: &BTreeSet<String>,
        known: &KnownAnswers,
        n: usize,
    ) -> Vec<(String, f64)> {
        let current = beliefs.entropy();
        let mut ranked: Vec<(String, f64)> = self
            .catalog
            .attributes()
            .filter(|attr| self.is_candidate(&attr.id, asked, known))
            .map(|attr| (attr.id.clone(), self.info_gain_from(beliefs, current, &attr.id)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

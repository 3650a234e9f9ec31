use serde::{Deserialize, Serialize};

/// Probability above which a top-level branch is taken as established.
pub const BRANCH_CONFIRM: f64 = 0.7;
/// Probability below which a top-level branch is taken as ruled out.
pub const BRANCH_REJECT: f64 = 0.3;

/// Priority bucket a question was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Fixed-order three-way split.
    Category,
    /// Fixed-order questions for the established branch.
    Branch,
    /// Family and subtype questions, ranked by information gain.
    Family,
    /// Everything else, ranked by information gain.
    Open,
}

impl Tier {
    pub const fn index(self) -> usize {
        match self {
            Tier::Category => 0,
            Tier::Branch => 1,
            Tier::Family => 2,
            Tier::Open => 3,
        }
    }

    pub const fn is_fixed_order(self) -> bool {
        matches!(self, Tier::Category | Tier::Branch)
    }
}

/// Broad questions asked once `root` is established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub root: String,
    pub questions: Vec<String>,
}

/// Ordering of questions from broad to specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPlan {
    pub category: Vec<String>,
    pub branches: Vec<Branch>,
    pub families: Vec<String>,
}

impl Default for TierPlan {
    fn default() -> Self {
        fn owned(ids: &[&str]) -> Vec<String> {
            ids.iter().map(|id| (*id).to_string()).collect()
        }

        Self {
            category: owned(&["is_animal", "is_vegetable", "is_mineral"]),
            branches: vec![
                Branch {
                    root: "is_animal".into(),
                    questions: owned(&[
                        "is_mammal",
                        "is_bird",
                        "is_fish",
                        "is_reptile",
                        "is_amphibian",
                        "is_insect",
                    ]),
                },
                Branch {
                    root: "is_vegetable".into(),
                    questions: owned(&[
                        "is_fruit",
                        "is_vegetable_food",
                        "is_tree",
                        "is_flower",
                        "is_fungus",
                    ]),
                },
                Branch {
                    root: "is_mineral".into(),
                    questions: owned(&[
                        "is_manmade",
                        "is_electronic",
                        "is_vehicle",
                        "is_furniture",
                        "is_clothing",
                        "is_tool",
                    ]),
                },
            ],
            families: owned(&[
                "is_primate",
                "is_rodent",
                "is_feline",
                "is_canine",
                "is_bovine",
                "is_equine",
                "is_cetacean",
                "is_marsupial",
                "is_domesticated",
                "is_pet",
                "is_farm_animal",
                "is_wild",
                "is_carnivore",
                "is_herbivore",
                "is_omnivore",
                "is_berry",
                "is_citrus",
                "is_metal",
                "is_plastic",
                "is_glass",
                "is_instrument",
                "is_appliance",
                "is_jewelry",
            ]),
        }
    }
}

impl TierPlan {
    /// Flat plan: every question is ranked by information gain.
    pub fn flat() -> Self {
        Self {
            category: Vec::new(),
            branches: Vec::new(),
            families: Vec::new(),
        }
    }

    /// The branch to follow given each root's probability of "yes".
    ///
    /// A branch is active when its root exceeds [`BRANCH_CONFIRM`] or every
    /// other root is below [`BRANCH_REJECT`]; among active branches the most
    /// probable wins, earliest first on ties.
    pub fn active_branch(&self, root_probability: impl Fn(&str) -> f64) -> Option<&Branch> {
        let probabilities: Vec<f64> = self
            .branches
            .iter()
            .map(|branch| root_probability(&branch.root))
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for (index, p) in probabilities.iter().copied().enumerate() {
            let others_rejected = probabilities
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .all(|(_, q)| *q < BRANCH_REJECT);
            let active = p > BRANCH_CONFIRM || others_rejected;
            if active && best.is_none_or(|(_, current)| p > current) {
                best = Some((index, p));
            }
        }
        best.map(|(index, _)| &self.branches[index])
    }

    /// True if `attribute` is scheduled in tiers 0-2 for `branch`.
    pub fn is_scheduled(&self, attribute: &str, branch: Option<&Branch>) -> bool {
        self.category.iter().any(|id| id == attribute)
            || self.families.iter().any(|id| id == attribute)
            || branch.is_some_and(|branch| branch.questions.iter().any(|id| id == attribute))
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `P(yes | entity)` assumed for attributes an entity does not mention.
pub const DEFAULT_ATTRIBUTE_PROBABILITY: f64 = 0.5;
/// Popularity rank assumed for entities without one.
pub const DEFAULT_POPULARITY_RANK: u32 = 500;

/// A candidate answer the game may guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    /// Attribute id to `P(yes | this entity)`.
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
    #[serde(default)]
    pub times_played: u32,
    #[serde(default)]
    pub times_guessed_correctly: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
            times_played: 0,
            times_guessed_correctly: 0,
            popularity_rank: None,
            category: None,
        }
    }

    pub fn with_attribute(mut self, attribute_id: impl Into<String>, p_yes: f64) -> Self {
        self.attributes.insert(attribute_id.into(), p_yes);
        self
    }

    pub fn with_popularity_rank(mut self, rank: u32) -> Self {
        self.popularity_rank = Some(rank);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// `P(yes | self)` for `attribute_id`, defaulting to maximal uncertainty.
    pub fn attribute_probability(&self, attribute_id: &str) -> f64 {
        self.attributes
            .get(attribute_id)
            .copied()
            .unwrap_or(DEFAULT_ATTRIBUTE_PROBABILITY)
    }

    pub fn popularity_rank(&self) -> u32 {
        self.popularity_rank.unwrap_or(DEFAULT_POPULARITY_RANK)
    }

    pub fn accuracy(&self) -> f64 {
        if self.times_played == 0 {
            0.0
        } else {
            f64::from(self.times_guessed_correctly) / f64::from(self.times_played)
        }
    }

    /// Coarse three-way bucket, preferring the explicit category label.
    pub fn branch(&self) -> &str {
        if let Some(category) = self.category.as_deref() {
            return category;
        }
        if self.attribute_probability_or_zero("is_animal") > 0.5 {
            "animal"
        } else if self.attribute_probability_or_zero("is_vegetable") > 0.5 {
            "plant"
        } else if self.attribute_probability_or_zero("is_mineral") > 0.5 {
            "object"
        } else {
            "unknown"
        }
    }

    fn attribute_probability_or_zero(&self, attribute_id: &str) -> f64 {
        self.attributes.get(attribute_id).copied().unwrap_or(0.0)
    }
}

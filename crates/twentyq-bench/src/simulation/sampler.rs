use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use twentyq_core::catalog::KnowledgeBase;

use crate::config::TargetSelection;

/// Picks the entity a simulated player has in mind.
pub(crate) struct TargetSampler {
    ids: Vec<String>,
    weights: Option<WeightedIndex<f64>>,
}

impl TargetSampler {
    pub(crate) fn new(
        catalog: &KnowledgeBase,
        selection: TargetSelection,
    ) -> Result<Self, rand::distributions::WeightedError> {
        let entities: Vec<_> = catalog.entities().collect();
        let ids = entities.iter().map(|entity| entity.id.clone()).collect();
        let weights = match selection {
            TargetSelection::Uniform => None,
            TargetSelection::Weighted => Some(WeightedIndex::new(
                entities
                    .iter()
                    .map(|entity| popularity_sampling_weight(entity.popularity_rank())),
            )?),
        };
        Ok(Self { ids, weights })
    }

    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        if self.ids.is_empty() {
            return None;
        }
        let index = match &self.weights {
            Some(weights) => weights.sample(rng),
            None => rng.gen_range(0..self.ids.len()),
        };
        self.ids.get(index).map(String::as_str)
    }
}

/// Popular entities come up more often, but the tail is never starved.
pub(crate) fn popularity_sampling_weight(rank: u32) -> f64 {
    1.0 / (f64::from(rank) + 1.0).sqrt()
}

use serde::Serialize;
use std::cmp::Ordering;

/// Normalized distribution over entity ids.
///
/// Entries keep the order they were created in, so ties always resolve to
/// the entity that appears first in the catalog. Updates produce a new
/// state; nothing here mutates a distribution in place except `normalize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BeliefState {
    entries: Vec<(String, f64)>,
}

impl BeliefState {
    pub fn uniform<I, S>(entity_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = entity_ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Self::default();
        }
        let p = 1.0 / ids.len() as f64;
        Self {
            entries: ids.into_iter().map(|id| (id, p)).collect(),
        }
    }

    /// Builds a state from unnormalized weights. Negative or non-finite
    /// weights count as zero.
    pub fn from_weights<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut state = Self {
            entries: weights
                .into_iter()
                .map(|(id, weight)| {
                    let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
                    (id.into(), weight)
                })
                .collect(),
        };
        state.normalize();
        state
    }

    /// Rescales to sum to one. A state with no mass left falls back to uniform.
    pub fn normalize(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let total: f64 = self.entries.iter().map(|(_, p)| *p).sum();
        if total > 0.0 && total.is_finite() {
            for (_, p) in &mut self.entries {
                *p /= total;
            }
        } else {
            let p = 1.0 / self.entries.len() as f64;
            for (_, value) in &mut self.entries {
                *value = p;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(id, p)| (id.as_str(), *p))
    }

    pub fn probability(&self, entity_id: &str) -> f64 {
        self.entries
            .iter()
            .find(|(id, _)| id == entity_id)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }

    /// Shannon entropy in bits.
    pub fn entropy(&self) -> f64 {
        self.entries
            .iter()
            .map(|(_, p)| *p)
            .filter(|p| *p > 0.0)
            .map(|p| -p * p.log2())
            .sum()
    }

    /// Entropy divided by its maximum `log2(n)`; zero for one or no entities.
    pub fn normalized_entropy(&self) -> f64 {
        if self.entries.len() <= 1 {
            return 0.0;
        }
        self.entropy() / (self.entries.len() as f64).log2()
    }

    /// Highest probability, or zero when empty.
    pub fn confidence(&self) -> f64 {
        self.top().map(|(_, p)| p).unwrap_or(0.0)
    }

    /// Most likely entity; the earliest entry wins ties.
    pub fn top(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (id, p) in self.iter() {
            if best.is_none_or(|(_, current)| p > current) {
                best = Some((id, p));
            }
        }
        best
    }

    /// The `k` most likely entities, descending, ties in entry order.
    pub fn top_k(&self, k: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(k);
        ranked
    }

    /// 1-based position of `entity_id` in the descending ranking.
    pub fn rank_of(&self, entity_id: &str) -> Option<usize> {
        let target = self.entries.iter().position(|(id, _)| id == entity_id)?;
        let p = self.entries[target].1;
        let ahead = self
            .entries
            .iter()
            .enumerate()
            .filter(|(index, (_, other))| *other > p || (*other == p && *index < target))
            .count();
        Some(ahead + 1)
    }
}

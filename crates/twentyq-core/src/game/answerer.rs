use super::Question;
use crate::implication::{ImplicationEngine, KnownAnswers};
use crate::model::{DEFAULT_ATTRIBUTE_PROBABILITY, Entity, MAYBE_VALUE};

/// Attribute probabilities at or above this are answered "yes".
pub const CONFIDENT_YES: f64 = 0.8;
/// Attribute probabilities at or below this are answered "no".
pub const CONFIDENT_NO: f64 = 0.2;

/// Supplies answers to the engine's questions: a person at a prompt, a
/// simulated player, or a scripted test double.
pub trait Answerer {
    /// Answer confidence in `[0, 1]`: 1.0 yes, 0.0 no, 0.5 maybe.
    fn answer(&mut self, question: &Question) -> f64;
}

impl<F> Answerer for F
where
    F: FnMut(&Question) -> f64,
{
    fn answer(&mut self, question: &Question) -> f64 {
        self(question)
    }
}

fn is_confident(p: f64) -> bool {
    p >= CONFIDENT_YES || p <= CONFIDENT_NO
}

fn quantize(p: f64) -> f64 {
    if p >= CONFIDENT_YES {
        1.0
    } else if p <= CONFIDENT_NO {
        0.0
    } else {
        MAYBE_VALUE
    }
}

/// Plays a known entity honestly.
///
/// The entity's own confident attributes answer directly. Attributes it
/// does not pin down fall back to whatever its confident attributes imply,
/// and anything still uncertain is answered "maybe".
#[derive(Debug, Clone)]
pub struct EntityAnswerer {
    entity: Entity,
    implied: KnownAnswers,
}

impl EntityAnswerer {
    pub fn new(entity: &Entity, implications: &ImplicationEngine) -> Self {
        let confident: KnownAnswers = entity
            .attributes
            .iter()
            .filter(|(_, p)| is_confident(**p))
            .map(|(attribute, p)| (attribute.clone(), *p))
            .collect();
        let implied = implications.get_all_determined_attributes(&confident);
        Self {
            entity: entity.clone(),
            implied,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn answer_for(&self, attribute: &str) -> f64 {
        let own = self.entity.attributes.get(attribute).copied();
        let p = match (own, self.implied.get(attribute).copied()) {
            (Some(p), _) if is_confident(p) => p,
            (_, Some(implied)) if is_confident(implied) => implied,
            (own, _) => own.unwrap_or(DEFAULT_ATTRIBUTE_PROBABILITY),
        };
        quantize(p)
    }
}

impl Answerer for EntityAnswerer {
    fn answer(&mut self, question: &Question) -> f64 {
        self.answer_for(&question.attribute)
    }
}

pub mod answer;
pub mod attribute;
pub mod entity;

pub use answer::{Answer, MAYBE_VALUE, NO_THRESHOLD, YES_THRESHOLD};
pub use attribute::Attribute;
pub use entity::{DEFAULT_ATTRIBUTE_PROBABILITY, DEFAULT_POPULARITY_RANK, Entity};

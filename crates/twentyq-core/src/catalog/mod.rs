//! Entity/attribute catalog.
//!
//! The catalog is split in two layers:
//! - an immutable base loaded from `entities.json` / `attributes.json`;
//! - a learned overlay holding every entity or attribute touched at runtime,
//!   persisted to `learned.json` by diffing against the base.

mod error;
mod files;
mod ids;
mod store;

pub use error::CatalogError;
pub use files::{
    ATTRIBUTES_FILE, AttributeDocument, ENTITIES_FILE, EntityDocument, LEARNED_FILE,
    LearnedDocument, write_atomic,
};
pub use ids::{normalize_name, slug_attribute_id, slug_entity_id};
pub use store::{CatalogStats, EntityLearningStats, KnowledgeBase};

use super::files::{
    ATTRIBUTES_FILE, AttributeDocument, ENTITIES_FILE, EntityDocument, LEARNED_FILE,
    LearnedDocument, read_document, write_atomic,
};
use super::ids::{normalize_name, slug_attribute_id, slug_entity_id};
use super::CatalogError;
use crate::model::{Attribute, Entity};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Insertion-ordered id map; iteration order is load order.
#[derive(Debug, Clone)]
struct Layer<T> {
    items: HashMap<String, T>,
    order: Vec<String>,
}

impl<T> Default for Layer<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T> Layer<T> {
    fn insert(&mut self, id: String, item: T) {
        if self.items.insert(id.clone(), item).is_none() {
            self.order.push(id);
        }
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.items.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.get_mut(id)
    }

    fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Two-layer entity/attribute store: immutable base plus learned overlay.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    base_entities: Layer<Entity>,
    base_attributes: Layer<Attribute>,
    learned_entities: Layer<Entity>,
    learned_attributes: Layer<Attribute>,
    data_dir: Option<PathBuf>,
}

impl KnowledgeBase {
    /// Catalog with no backing directory; `save` is a no-op.
    pub fn in_memory(entities: Vec<Entity>, attributes: Vec<Attribute>) -> Self {
        let mut kb = Self::default();
        for entity in entities {
            kb.base_entities.insert(entity.id.clone(), entity);
        }
        for attribute in attributes {
            kb.base_attributes.insert(attribute.id.clone(), attribute);
        }
        kb
    }

    /// Loads `data_dir`, degrading any unreadable file to empty.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        let entities: EntityDocument = load_or_default(&dir.join(ENTITIES_FILE));
        let attributes: AttributeDocument = load_or_default(&dir.join(ATTRIBUTES_FILE));
        let learned: LearnedDocument = load_or_default(&dir.join(LEARNED_FILE));
        Self::assemble(dir, entities, attributes, learned)
    }

    /// Like [`KnowledgeBase::open`] but surfaces read/parse failures.
    pub fn try_open(data_dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = data_dir.as_ref();
        let entities = read_document(&dir.join(ENTITIES_FILE))?.unwrap_or_default();
        let attributes = read_document(&dir.join(ATTRIBUTES_FILE))?.unwrap_or_default();
        let learned = read_document(&dir.join(LEARNED_FILE))?.unwrap_or_default();
        Ok(Self::assemble(dir, entities, attributes, learned))
    }

    fn assemble(
        dir: &Path,
        entities: EntityDocument,
        attributes: AttributeDocument,
        learned: LearnedDocument,
    ) -> Self {
        let mut kb = Self::in_memory(entities.entities, attributes.attributes);
        kb.data_dir = Some(dir.to_path_buf());

        for attribute in learned.attributes {
            if !kb.base_attributes.contains(&attribute.id) {
                kb.learned_attributes.insert(attribute.id.clone(), attribute);
            }
        }

        for delta in learned.entities {
            let merged = match kb.base_entities.get(&delta.id) {
                Some(base) => {
                    let mut merged = base.clone();
                    merged.attributes.extend(delta.attributes);
                    merged.times_played = delta.times_played;
                    merged.times_guessed_correctly = delta.times_guessed_correctly;
                    merged
                }
                None => delta,
            };
            kb.learned_entities.insert(merged.id.clone(), merged);
        }

        info!(
            entities = kb.entity_count(),
            attributes = kb.attribute_count(),
            learned = kb.learned_entities.len(),
            "catalog loaded"
        );
        kb
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.learned_entities
            .get(id)
            .or_else(|| self.base_entities.get(id))
    }

    /// Mutable access; copies a base entity into the overlay on first write.
    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        if !self.learned_entities.contains(id) {
            let base = self.base_entities.get(id)?.clone();
            self.learned_entities.insert(id.to_string(), base);
        }
        self.learned_entities.get_mut(id)
    }

    /// All entities: base order first, then runtime additions.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        let base = self
            .base_entities
            .order
            .iter()
            .filter_map(|id| self.entity(id));
        let added = self
            .learned_entities
            .iter()
            .filter(|entity| !self.base_entities.contains(&entity.id));
        base.chain(added)
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.entities().map(|entity| entity.id.clone()).collect()
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.learned_entities.contains(id) || self.base_entities.contains(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities().count()
    }

    pub fn attribute(&self, id: &str) -> Option<&Attribute> {
        self.base_attributes
            .get(id)
            .or_else(|| self.learned_attributes.get(id))
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.base_attributes
            .iter()
            .chain(self.learned_attributes.iter())
    }

    pub fn attribute_ids(&self) -> Vec<String> {
        self.attributes().map(|attr| attr.id.clone()).collect()
    }

    pub fn contains_attribute(&self, id: &str) -> bool {
        self.base_attributes.contains(id) || self.learned_attributes.contains(id)
    }

    pub fn attribute_count(&self) -> usize {
        self.base_attributes.len() + self.learned_attributes.len()
    }

    /// Adds or replaces an entity in the learned overlay.
    pub fn add_entity(&mut self, entity: Entity) {
        self.learned_entities.insert(entity.id.clone(), entity);
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        if self.base_attributes.contains(&attribute.id) {
            return;
        }
        self.learned_attributes
            .insert(attribute.id.clone(), attribute);
    }

    pub fn generate_entity_id(&self, name: &str) -> String {
        slug_entity_id(name, |id| self.contains_entity(id))
    }

    pub fn generate_attribute_id(&self, question: &str) -> String {
        slug_attribute_id(question, |id| self.contains_attribute(id))
    }

    /// Case- and article-insensitive lookup; falls back to whole-word matching.
    pub fn find_entity_by_name(&self, name: &str) -> Option<&Entity> {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return None;
        }
        if let Some(entity) = self
            .entities()
            .find(|entity| normalize_name(&entity.name) == wanted)
        {
            return Some(entity);
        }

        let wanted_words: Vec<&str> = wanted.split_whitespace().collect();
        self.entities().find(|entity| {
            let normalized = normalize_name(&entity.name);
            let words: Vec<&str> = normalized.split_whitespace().collect();
            wanted_words.iter().all(|word| words.contains(word))
        })
    }

    /// Entities that belong in `learned.json`.
    fn learned_deltas(&self) -> Vec<Entity> {
        self.learned_entities
            .iter()
            .filter(|entity| entity.times_played > 0 || self.diverges_from_base(entity))
            .cloned()
            .collect()
    }

    fn diverges_from_base(&self, entity: &Entity) -> bool {
        let Some(base) = self.base_entities.get(&entity.id) else {
            return true;
        };
        entity
            .attributes
            .iter()
            .any(|(attr, value)| base.attributes.get(attr) != Some(value))
    }

    pub fn learned_document(&self) -> LearnedDocument {
        LearnedDocument {
            entities: self.learned_deltas(),
            attributes: self.learned_attributes.iter().cloned().collect(),
        }
    }

    /// Persists the learned overlay atomically. In-memory state is never touched.
    pub fn save(&self) -> Result<(), CatalogError> {
        let Some(dir) = self.data_dir.as_ref() else {
            return Ok(());
        };
        let path = dir.join(LEARNED_FILE);
        let json = serde_json::to_string_pretty(&self.learned_document())?;
        std::fs::create_dir_all(dir).map_err(|source| CatalogError::Write {
            source,
            path: dir.clone(),
        })?;
        write_atomic(&path, json.as_bytes()).map_err(|source| CatalogError::Write {
            source,
            path: path.clone(),
        })?;
        info!(path = %path.display(), "learned state saved");
        Ok(())
    }

    pub fn learning_stats(&self, entity_id: &str) -> Option<EntityLearningStats> {
        let entity = self.entity(entity_id)?;
        Some(EntityLearningStats {
            entity_id: entity.id.clone(),
            name: entity.name.clone(),
            times_played: entity.times_played,
            times_guessed_correctly: entity.times_guessed_correctly,
            accuracy: entity.accuracy(),
            attribute_count: entity.attributes.len(),
        })
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            total_entities: 0,
            total_attributes: self.attribute_count(),
            entities_with_play_data: 0,
            total_games_played: 0,
            total_correct_guesses: 0,
            overall_accuracy: 0.0,
        };
        for entity in self.entities() {
            stats.total_entities += 1;
            if entity.times_played > 0 {
                stats.entities_with_play_data += 1;
                stats.total_games_played += u64::from(entity.times_played);
                stats.total_correct_guesses += u64::from(entity.times_guessed_correctly);
            }
        }
        if stats.total_games_played > 0 {
            stats.overall_accuracy =
                stats.total_correct_guesses as f64 / stats.total_games_played as f64;
        }
        stats
    }
}

fn load_or_default<T>(path: &Path) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match read_document(path) {
        Ok(Some(doc)) => doc,
        Ok(None) => T::default(),
        Err(err) => {
            warn!(error = %err, "catalog file unusable; continuing without it");
            T::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityLearningStats {
    pub entity_id: String,
    pub name: String,
    pub times_played: u32,
    pub times_guessed_correctly: u32,
    pub accuracy: f64,
    pub attribute_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub total_entities: usize,
    pub total_attributes: usize,
    pub entities_with_play_data: usize,
    pub total_games_played: u64,
    pub total_correct_guesses: u64,
    pub overall_accuracy: f64,
}

use super::CatalogError;
use crate::model::{Attribute, Entity};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

pub const ENTITIES_FILE: &str = "entities.json";
pub const ATTRIBUTES_FILE: &str = "attributes.json";
pub const LEARNED_FILE: &str = "learned.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntityDocument {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttributeDocument {
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Delta overlay written at commit points.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LearnedDocument {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

/// Reads a JSON document; a missing file is `Ok(None)`.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CatalogError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CatalogError::Read {
                source,
                path: path.to_path_buf(),
            });
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| CatalogError::Parse {
            source,
            path: path.to_path_buf(),
        })
}

/// Writes `contents` next to `path` and renames it into place.
///
/// On failure the temp file is removed and `path` keeps its previous contents.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp = path.with_extension("json.tmp");
    let result = write_then_rename(&temp, path, contents);
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn write_then_rename(temp: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = File::create(temp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp, path)
}

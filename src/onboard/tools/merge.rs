//! Ordered merge primitives shared by the exporters.
//!
//! Every merge keeps the left operand's key order and appends keys that only
//! the right operand has, in the right operand's order. Precedence on
//! colliding keys is stated per function.

use crate::onboard::tools::error::Result;
use crate::onboard::tools::model::{CONFIG_METADATA, Document, Entity, Operation, config_metadata};

/// Overlays `right` onto `left`; values from `right` win on colliding keys,
/// which keep the position they had in `left`.
pub fn overlay(left: &Entity, right: &Entity) -> Entity {
    let mut merged = left.clone();
    for (key, value) in right {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Appends keys of `right` that `left` does not already have; `left` wins on
/// every collision.
pub fn extend_missing(left: &Entity, right: &Entity) -> Entity {
    let mut merged = left.clone();
    for (key, value) in right {
        if !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Copy of `entity` without the named fields, other fields kept in order.
pub fn without_fields(entity: &Entity, names: &[&str]) -> Entity {
    entity
        .iter()
        .filter(|(key, _)| !key.as_str().is_some_and(|key| names.contains(&key)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Document-level [`overlay`]: entities of `right` replace same-id entities of
/// `left` in place, new ids are appended.
pub fn overlay_documents(left: &Document, right: &Document) -> Document {
    let mut merged = left.clone();
    for (id, entity) in right.iter() {
        merged.insert(id, entity.clone());
    }
    merged
}

/// Folds [`overlay_documents`] over `parts` from left to right.
pub fn concat_documents(parts: &[&Document]) -> Document {
    parts
        .iter()
        .fold(Document::new(), |merged, part| overlay_documents(&merged, part))
}

/// Header of every config bundle: `CONFIG_METADATA` followed by the building
/// root entity of `building`.
pub fn config_top(building: &Document, operation: Operation) -> Result<Document> {
    let (root_id, root) = building.building_root()?;
    let mut top = Document::new();
    top.insert(CONFIG_METADATA, config_metadata(operation));
    top.insert(root_id, root.clone());
    Ok(top)
}

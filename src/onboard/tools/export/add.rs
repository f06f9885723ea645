use std::path::Path;

use tracing::{debug, info, instrument};

use crate::onboard::tools::error::Result;
use crate::onboard::tools::io::yaml;
use crate::onboard::tools::merge::{concat_documents, config_top, without_fields};
use crate::onboard::tools::model::{
    Document, Entity, EntityId, Operation, code, entity_etag, field, has_field, links, operation,
    scalar_text, set_field,
};
use crate::onboard::tools::status::Status;

/// Virtual entities of a change document split by their operation, each
/// bundle preceded by the link targets it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfigs {
    /// Top, link targets of added entities, then the added entities.
    pub add: Document,
    /// Top, link targets of updated entities, then the updated entities.
    pub update: Document,
    /// Link targets of added entities found in either document.
    pub resolved_add_links: usize,
    /// Link targets of updated entities found in either document.
    pub resolved_update_links: usize,
    /// Change entries classified as adds, in document order.
    pub add_ids: Vec<EntityId>,
    /// Change entries classified as updates, in document order.
    pub update_ids: Vec<EntityId>,
}

/// Classifies linked change entries into adds and updates and resolves their
/// link targets against `changes` first, then `building`.
///
/// With `use_change_flags` unset every linked entry is treated as an add.
/// Entries whose operation is neither `ADD` nor `UPDATE` are skipped.
/// Unresolved targets are reported and kept as empty placeholders.
pub fn split_virtual_entities(
    building: &Document,
    changes: &Document,
    use_change_flags: bool,
) -> Result<(SplitConfigs, Status)> {
    let top = config_top(building, Operation::Update)?;
    let mut status = Status::new();

    let mut add_entities = Document::new();
    let mut update_entities = Document::new();
    let mut add_targets = Document::new();
    let mut update_targets = Document::new();
    let mut resolved_add_links = 0usize;
    let mut resolved_update_links = 0usize;
    let mut add_ids = Vec::new();
    let mut update_ids = Vec::new();

    for (id, entry) in changes.iter() {
        if !has_field(entry, field::LINKS) {
            continue;
        }
        let mut entry = entry.clone();
        if !use_change_flags {
            set_field(&mut entry, field::OPERATION, Operation::Add.as_str());
        }

        let (entities, targets, resolved, ids) = match operation(&entry) {
            Some(Operation::Add) => (
                &mut add_entities,
                &mut add_targets,
                &mut resolved_add_links,
                &mut add_ids,
            ),
            Some(Operation::Update) => (
                &mut update_entities,
                &mut update_targets,
                &mut resolved_update_links,
                &mut update_ids,
            ),
            None => {
                debug!(%id, "linked entry without a recognised operation skipped");
                continue;
            }
        };

        let target_ids: Vec<String> = links(&entry)
            .map(|links| links.iter().map(|(key, _)| scalar_text(key)).collect())
            .unwrap_or_default();
        for target in target_ids {
            if targets.contains(&target) {
                continue;
            }
            match resolve_link_target(&target, changes, building) {
                Some(data) => {
                    targets.insert(target, data);
                    *resolved += 1;
                }
                None => {
                    status.error(format!(
                        "Link {target} from {} (guid: {id}) not found in abel and building config.",
                        code(&entry).unwrap_or("None")
                    ));
                    targets.insert(target, Entity::new());
                }
            }
        }

        ids.push(id.to_string());
        entities.insert(id, entry);
    }

    let configs = SplitConfigs {
        add: concat_documents(&[&top, &add_targets, &add_entities]),
        update: concat_documents(&[&top, &update_targets, &update_entities]),
        resolved_add_links,
        resolved_update_links,
        add_ids,
        update_ids,
    };
    Ok((configs, status))
}

/// Link target data stripped of its change directives, with a stringified etag.
fn resolve_link_target(target: &str, changes: &Document, building: &Document) -> Option<Entity> {
    let source = changes.get(target).or_else(|| building.get(target))?;
    let mut data = without_fields(source, &[field::OPERATION, field::UPDATE_MASK]);
    if let Some(etag) = entity_etag(&data) {
        set_field(&mut data, field::ETAG, etag);
    }
    Some(data)
}

/// Writes `<output>_add_virtual.yaml` and `<output>_update_virtual.yaml` from
/// [`split_virtual_entities`], each only when its bundle resolved at least one
/// link target.
///
/// The update file is written from the add bundle; `SplitConfigs::update` is
/// not emitted. Only the add entries are therefore reported as added, and only
/// when a file was written.
#[instrument(level = "info", skip_all, fields(output = %output.display()))]
pub fn export_add_config(
    building: &Document,
    changes: &Document,
    use_change_flags: bool,
    output: &Path,
) -> Result<Status> {
    yaml::derive_output_path(output, "")?;
    let (configs, mut status) = split_virtual_entities(building, changes, use_change_flags)?;

    if configs.resolved_add_links > 0 {
        let path = yaml::derive_output_path(output, "_add_virtual")?;
        yaml::write_document(&path, &configs.add)?;
        status.saved(format!("Saved file: {}", path.display()));
    }
    if configs.resolved_update_links > 0 {
        let path = yaml::derive_output_path(output, "_update_virtual")?;
        yaml::write_document(&path, &configs.add)?;
        status.saved(format!("Saved file: {}", path.display()));
    }
    if !status.saved_files.is_empty() {
        for id in &configs.add_ids {
            status.added(id.as_str());
        }
    }

    info!(
        files = status.saved_files.len(),
        errors = status.errors.len(),
        "virtual entity configs exported"
    );
    Ok(status)
}

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::onboard::tools::error::Result;
use crate::onboard::tools::io::yaml;
use crate::onboard::tools::merge::{concat_documents, config_top, overlay};
use crate::onboard::tools::model::{
    Document, Entity, MISSING_ETAG, Operation, entity_etag, field, field_list, has_field,
    set_field,
};
use crate::onboard::tools::status::Status;

/// Largest number of entities written to one update bundle by default. Larger
/// requests run into the service's operation deadline.
pub const DEFAULT_MAX_ITEMS: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(value) => value,
    None => unreachable!(),
};

/// Knobs of [`export_update_config`].
#[derive(Debug, Clone)]
pub struct UpdateExportOptions {
    /// Keep the `operation`/`update_mask` carried by each change entry instead
    /// of forcing a translation update.
    pub use_change_flags: bool,
    /// Restrict the export to these identifiers. `None` or an empty set
    /// exports every change entry.
    pub subset: Option<BTreeSet<String>>,
    /// Maximum number of entities per written file.
    pub max_items: NonZeroUsize,
}

impl Default for UpdateExportOptions {
    fn default() -> Self {
        Self {
            use_change_flags: false,
            subset: None,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// One update bundle ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateChunk {
    /// `CONFIG_METADATA`, building root, then the chunk's entities.
    pub document: Document,
    /// Number of change entries in the chunk.
    pub entity_count: usize,
}

/// Splits the translated change entries into update bundles of at most
/// `options.max_items` entities each.
///
/// Entries missing from the building document are reported in the returned
/// status and skipped. Only a missing building root aborts.
pub fn plan_update_chunks(
    building: &Document,
    changes: &Document,
    options: &UpdateExportOptions,
) -> Result<(Vec<UpdateChunk>, Status)> {
    let top = config_top(building, Operation::Update)?;
    let subset = options.subset.as_ref().filter(|ids| !ids.is_empty());
    let entries: Vec<(&str, &Entity)> = changes
        .iter()
        .filter(|(id, _)| subset.is_none_or(|ids| ids.contains(*id)))
        .collect();

    let reporting = entries
        .iter()
        .filter(|(_, entry)| has_field(entry, field::TRANSLATION))
        .count();
    info!(reporting_entities = reporting, "reporting entities found");

    let max_items = options.max_items.get();
    let last = entries.len().saturating_sub(1);
    let mut status = Status::new();
    let mut chunks = Vec::new();
    let mut pending = Document::new();
    let mut count = 0usize;

    for (idx, (id, entry)) in entries.iter().enumerate() {
        if has_field(entry, field::TRANSLATION) {
            match building.get(id) {
                Some(current) => {
                    let etag = entity_etag(current).unwrap_or_else(|| MISSING_ETAG.to_string());
                    let mut entry = (*entry).clone();
                    if !options.use_change_flags {
                        set_field(&mut entry, field::OPERATION, Operation::Update.as_str());
                        set_field(
                            &mut entry,
                            field::UPDATE_MASK,
                            field_list(&[field::TYPE, field::TRANSLATION]),
                        );
                    }
                    let mut stamped = Entity::new();
                    set_field(&mut stamped, field::ETAG, etag);
                    pending.insert(*id, overlay(&stamped, &entry));
                    status.added(*id);
                    count += 1;
                }
                None => status.error(format!("Not in building config: {id}")),
            }
        }

        if count > 0 && (count % max_items == 0 || idx == last) {
            debug!(entities = count, chunk = chunks.len() + 1, "update chunk closed");
            chunks.push(UpdateChunk {
                document: concat_documents(&[&top, &pending]),
                entity_count: count,
            });
            pending = Document::new();
            count = 0;
        }
    }

    Ok((chunks, status))
}

/// Writes the update bundles planned by [`plan_update_chunks`] to
/// `<output>_pt<N>.yaml`, numbering chunks from one.
#[instrument(level = "info", skip_all, fields(output = %output.display()))]
pub fn export_update_config(
    building: &Document,
    changes: &Document,
    options: &UpdateExportOptions,
    output: &Path,
) -> Result<Status> {
    yaml::derive_output_path(output, "")?;
    let (chunks, mut status) = plan_update_chunks(building, changes, options)?;

    for (index, chunk) in chunks.iter().enumerate() {
        let path = yaml::derive_output_path(output, &format!("_pt{}", index + 1))?;
        yaml::write_document(&path, &chunk.document)?;
        status.saved(format!(
            "{} entities saved in {}.",
            chunk.entity_count,
            path.display()
        ));
    }

    info!(
        files = chunks.len(),
        entities = status.added_entities.len(),
        errors = status.errors.len(),
        "update config exported"
    );
    Ok(status)
}

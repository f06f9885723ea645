use std::path::Path;

use tracing::{info, instrument};

use crate::onboard::tools::error::Result;
use crate::onboard::tools::io::yaml;
use crate::onboard::tools::model::{
    CONFIG_METADATA, Document, Operation, code, entity_etag, field, has_field, operation,
    set_field,
};
use crate::onboard::tools::status::Status;

/// Replaces the etags of update and translation entries in `existing` with the
/// ones from a fresh `building` export.
///
/// Entries without a fresh etag are reported and left as they were; no entry
/// is ever dropped.
pub fn refresh_etags(building: &Document, existing: &Document) -> (Document, Status) {
    let mut refreshed = existing.clone();
    let mut status = Status::new();

    for (id, entry) in existing.iter() {
        if id == CONFIG_METADATA {
            continue;
        }
        let wants_etag =
            operation(entry) == Some(Operation::Update) || has_field(entry, field::TRANSLATION);
        if !wants_etag {
            continue;
        }

        match building.get(id).and_then(entity_etag) {
            Some(etag) => {
                if let Some(target) = refreshed.get_mut(id) {
                    set_field(target, field::ETAG, etag);
                }
                status.added(id);
            }
            None => status.error(format!("No etag for: {id}, {}", code(entry).unwrap_or(""))),
        }
    }

    (refreshed, status)
}

/// Writes the refreshed document to `<output>_upd.yaml`.
#[instrument(level = "info", skip_all, fields(output = %output.display()))]
pub fn update_etags(building: &Document, existing: &Document, output: &Path) -> Result<Status> {
    let path = yaml::derive_output_path(output, "_upd")?;
    let (refreshed, mut status) = refresh_etags(building, existing);

    yaml::write_document(&path, &refreshed)?;
    status.saved(format!("Saved file: {}", path.display()));

    info!(
        refreshed = status.added_entities.len(),
        errors = status.errors.len(),
        "etags refreshed"
    );
    Ok(status)
}

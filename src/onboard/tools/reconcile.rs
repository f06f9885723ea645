//! Reconciles a freshly generated config with one that is already onboarded.
//!
//! Field names that are already in use downstream must survive a regeneration:
//! reporting translations only gain genuinely new fields, and links of
//! existing virtual entities keep pointing at the reporting fields they used
//! before whenever the new field is the same source under another name.

use std::collections::HashSet;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, instrument};

use crate::onboard::tools::error::Result;
use crate::onboard::tools::extract::{self, TranslationRow, TranslationTable};
use crate::onboard::tools::io::{excel_write, yaml};
use crate::onboard::tools::merge::{concat_documents, config_top, extend_missing};
use crate::onboard::tools::model::{
    BUILDING_TYPE, CONFIG_METADATA, Document, Entity, EntityId, Operation, PASSTHROUGH_TYPE,
    RawValue, code, config_metadata, entity_etag, field, field_list, has_field, links,
    scalar_text, set_field, text_field, translation,
};
use crate::onboard::tools::status::Status;

/// Sheet name of the virtual update audit side-car.
pub const AUDIT_SHEET: &str = "Audit";

/// Update mask stamped on reconciled virtual entities. It is a single
/// element, not a `[type, links]` pair.
pub const VIRTUAL_UPDATE_MASK: &str = "type, links";

/// How the entities of the new document relate to the existing one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Translated in `new` and present in `existing`.
    pub reporting_to_merge: Vec<EntityId>,
    /// Linked in both documents.
    pub virtual_to_update: Vec<EntityId>,
    /// Linked in `new` only.
    pub virtual_to_add: Vec<EntityId>,
}

impl Partition {
    pub fn of(existing: &Document, new: &Document) -> Self {
        let mut partition = Self::default();
        for (id, entity) in new.iter() {
            let current = existing.get(id);
            if has_field(entity, field::TRANSLATION) && current.is_some() {
                partition.reporting_to_merge.push(id.to_string());
            }
            if has_field(entity, field::LINKS) {
                if current.is_some_and(|current| has_field(current, field::LINKS)) {
                    partition.virtual_to_update.push(id.to_string());
                } else {
                    partition.virtual_to_add.push(id.to_string());
                }
            }
        }
        partition
    }
}

/// Bundles produced by [`reconcile_documents`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Top followed by the reconciled reporting entities.
    pub reporting: Document,
    /// Reconciled reporting entities stamped for an update request.
    pub reporting_updates: Document,
    /// Reporting bundle re-announced as an add, plus the new virtual entities.
    pub virtual_add: Option<Document>,
    /// Top followed by the reconciled virtual entities.
    pub virtual_update: Option<Document>,
    pub status: Status,
}

/// Everything [`reconcile_existing`] wrote, for the caller to report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub plan: ReconcilePlan,
    /// Link rows re-read from the written virtual update file.
    pub audit: Vec<TranslationRow>,
}

/// Merges two translations. Entries of `existing` are kept as they are; from
/// `new` only fields bound to a present value `existing` does not use yet,
/// and sentinel fields whose name `existing` lacks, are appended.
pub fn merge_translation(existing: &Mapping, new: &Mapping) -> Mapping {
    let mut present = HashSet::new();
    let mut sentinel = 0usize;
    for (_, value) in existing {
        match RawValue::classify(value) {
            RawValue::Present(source) => {
                present.insert(source);
            }
            RawValue::Missing => sentinel += 1,
            RawValue::Unresolved => {}
        }
    }

    let mut new_fields = Mapping::new();
    let mut newly_missing = Mapping::new();
    for (name, value) in new {
        match RawValue::classify(value) {
            RawValue::Present(source) if !present.contains(&source) => {
                new_fields.insert(name.clone(), value.clone());
            }
            RawValue::Missing if !existing.contains_key(name) => {
                newly_missing.insert(name.clone(), value.clone());
            }
            _ => {}
        }
    }
    debug!(
        present = present.len(),
        sentinel,
        new_fields = new_fields.len(),
        newly_missing = newly_missing.len(),
        "translation merged"
    );

    extend_missing(&extend_missing(existing, &new_fields), &newly_missing)
}

/// Rewrites the links of a regenerated virtual entity so each standard field
/// keeps the reporting field name it had in `existing_links`, provided both
/// names are sentinel fields or both carry the same present value.
pub fn rewrite_links(
    existing_links: &Mapping,
    new_links: &Mapping,
    existing: &Document,
    new: &Document,
) -> Mapping {
    let mut rewritten = Mapping::new();
    for (reporting_key, new_fields) in new_links {
        let (Some(new_fields), Some(existing_fields)) = (
            new_fields.as_mapping(),
            existing_links.get(reporting_key).and_then(Value::as_mapping),
        ) else {
            rewritten.insert(reporting_key.clone(), new_fields.clone());
            continue;
        };

        let reporting_id = scalar_text(reporting_key);
        let new_reporting = new.get(&reporting_id).or_else(|| existing.get(&reporting_id));
        let existing_reporting = existing.get(&reporting_id);

        let mut fields = Mapping::new();
        for (standard, new_name) in new_fields {
            let new_name_text = scalar_text(new_name);
            let kept = existing_fields
                .get(standard)
                .map(scalar_text)
                .filter(|existing_name| *existing_name != new_name_text)
                .filter(|existing_name| {
                    same_source(
                        &RawValue::of_field(new_reporting, &new_name_text),
                        &RawValue::of_field(existing_reporting, existing_name),
                    )
                });
            let value = match kept {
                Some(existing_name) => {
                    debug!(
                        %reporting_id,
                        standard = %scalar_text(standard),
                        from = %new_name_text,
                        to = %existing_name,
                        "link rewritten to existing field"
                    );
                    Value::String(existing_name)
                }
                None => new_name.clone(),
            };
            fields.insert(standard.clone(), value);
        }
        rewritten.insert(reporting_key.clone(), Value::Mapping(fields));
    }
    rewritten
}

fn same_source(new: &RawValue, existing: &RawValue) -> bool {
    match (new, existing) {
        (RawValue::Missing, RawValue::Missing) => true,
        (RawValue::Present(new), RawValue::Present(existing)) => new == existing,
        _ => false,
    }
}

/// Builds every reconciled bundle without touching the file system.
pub fn reconcile_documents(existing: &Document, new: &Document) -> Result<ReconcilePlan> {
    let top = config_top(existing, Operation::Update)?;
    let partition = Partition::of(existing, new);
    info!(
        reporting = partition.reporting_to_merge.len(),
        virtual_update = partition.virtual_to_update.len(),
        virtual_add = partition.virtual_to_add.len(),
        "documents partitioned"
    );

    let mut status = Status::new();
    let mut merged = Document::new();
    let mut reporting_updates = Document::new();

    for id in &partition.reporting_to_merge {
        let (Some(current), Some(fresh)) = (existing.get(id), new.get(id)) else {
            continue;
        };
        let (merged_entity, mask) = match (translation(current), translation(fresh)) {
            (Some(current_translation), Some(fresh_translation)) => {
                let mut entity = current.clone();
                let translation = merge_translation(current_translation, fresh_translation);
                set_field(&mut entity, field::TRANSLATION, Value::Mapping(translation));
                (entity, field_list(&[field::TRANSLATION]))
            }
            _ => (
                fresh.clone(),
                field_list(&[field::TYPE, field::TRANSLATION]),
            ),
        };

        let mut stamped = merged_entity.clone();
        set_field(&mut stamped, field::OPERATION, "update");
        set_field(&mut stamped, field::UPDATE_MASK, mask);
        stamp_etag(&mut stamped, id, current, &mut status);

        merged.insert(id.as_str(), merged_entity);
        reporting_updates.insert(id.as_str(), stamped);
        status.added(id.as_str());
    }

    let reporting = concat_documents(&[&top, &merged]);

    let virtual_add = if partition.virtual_to_add.is_empty() {
        None
    } else {
        let mut bundle = reporting.clone();
        bundle.insert(CONFIG_METADATA, config_metadata(Operation::Add));
        for id in &partition.virtual_to_add {
            if let Some(fresh) = new.get(id) {
                let mut entity = fresh.clone();
                set_field(&mut entity, field::OPERATION, "add");
                bundle.insert(id.as_str(), entity);
                status.added(id.as_str());
            }
        }
        Some(force_passthrough(bundle))
    };

    let virtual_update = if partition.virtual_to_update.is_empty() {
        None
    } else {
        let mut updates = Document::new();
        for id in &partition.virtual_to_update {
            let (Some(current), Some(fresh)) = (existing.get(id), new.get(id)) else {
                continue;
            };
            let mut entity = fresh.clone();
            if let (Some(current_links), Some(fresh_links)) = (links(current), links(fresh)) {
                let rewritten = rewrite_links(current_links, fresh_links, existing, new);
                set_field(&mut entity, field::LINKS, Value::Mapping(rewritten));
            }
            set_field(&mut entity, field::OPERATION, "update");
            set_field(&mut entity, field::UPDATE_MASK, field_list(&[VIRTUAL_UPDATE_MASK]));
            stamp_etag(&mut entity, id, current, &mut status);
            updates.insert(id.as_str(), entity);
            status.added(id.as_str());
        }
        Some(concat_documents(&[&top, &updates]))
    };

    Ok(ReconcilePlan {
        reporting,
        reporting_updates,
        virtual_add,
        virtual_update,
        status,
    })
}

fn stamp_etag(entity: &mut Entity, id: &str, current: &Entity, status: &mut Status) {
    match entity_etag(current) {
        Some(etag) => set_field(entity, field::ETAG, etag),
        None => status.error(format!("No etag for: {id}, {}", code(current).unwrap_or(""))),
    }
}

/// Retypes every translated entity of an add bundle, leaving the metadata and
/// the building root alone.
fn force_passthrough(bundle: Document) -> Document {
    bundle
        .iter()
        .map(|(id, entity)| {
            let mut entity = entity.clone();
            let is_root = text_field(&entity, field::TYPE) == Some(BUILDING_TYPE);
            if id != CONFIG_METADATA && !is_root && has_field(&entity, field::TRANSLATION) {
                set_field(&mut entity, field::TYPE, PASSTHROUGH_TYPE);
            }
            (id.to_string(), entity)
        })
        .collect()
}

/// Reconciles `new_path` against `existing_path` and writes
/// `<output>_reporting.yaml`, `<output>_virtual_add.yaml` and
/// `<output>_virtual_update.yaml`, the last two only when they have content.
/// The virtual update file is re-read and its links written to
/// `<output>_virtual_update_audit.xlsx`.
#[instrument(
    level = "info",
    skip_all,
    fields(
        existing = %existing_path.display(),
        new = %new_path.display(),
        output = %output.display()
    )
)]
pub fn reconcile_existing(
    existing_path: &Path,
    new_path: &Path,
    output: &Path,
) -> Result<Reconciliation> {
    let reporting_path = yaml::derive_output_path(output, "_reporting")?;
    let existing = yaml::read_document(existing_path)?;
    let new = yaml::read_document(new_path)?;

    let mut plan = reconcile_documents(&existing, &new)?;

    yaml::write_document(&reporting_path, &plan.reporting)?;
    let saved = format!("Saved file: {}", reporting_path.display());
    plan.status.saved(saved);

    if let Some(bundle) = &plan.virtual_add {
        let path = yaml::derive_output_path(output, "_virtual_add")?;
        yaml::write_document(&path, bundle)?;
        plan.status.saved(format!("Saved file: {}", path.display()));
    }

    let mut audit = Vec::new();
    if let Some(bundle) = &plan.virtual_update {
        let path = yaml::derive_output_path(output, "_virtual_update")?;
        yaml::write_document(&path, bundle)?;
        plan.status.saved(format!("Saved file: {}", path.display()));

        let lookup = concat_documents(&[&existing, &new, &plan.reporting]);
        audit = audit_links(&path, &lookup)?;

        let audit_path = yaml::derive_sidecar_path(output, "_virtual_update_audit", ".xlsx")?;
        let table = TranslationTable::new().extended(audit.iter().cloned());
        excel_write::write_tables(&audit_path, &[table.to_sheet(AUDIT_SHEET)])?;
        let saved = format!("Saved file: {}", audit_path.display());
        plan.status.saved(saved);
    }

    info!(
        files = plan.status.saved_files.len(),
        errors = plan.status.errors.len(),
        audit_rows = audit.len(),
        "existing config reconciled"
    );
    Ok(Reconciliation { plan, audit })
}

/// Re-reads a written bundle and lists every link it carries, resolving
/// reporting fields against `lookup`.
fn audit_links(path: &Path, lookup: &Document) -> Result<Vec<TranslationRow>> {
    let written = yaml::read_document(path)?;
    let label = path.display().to_string();
    Ok(written
        .iter()
        .filter(|(_, entity)| has_field(entity, field::LINKS))
        .flat_map(|(id, entity)| extract::entity_rows(&label, id, entity, lookup))
        .collect())
}

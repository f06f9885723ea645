use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::onboard::tools::error::Result;
use crate::onboard::tools::export::{self, UpdateExportOptions};
use crate::onboard::tools::extract::{self, SourceDocument, TRANSLATIONS_SHEET, TranslationTable};
use crate::onboard::tools::io::{excel_write, yaml};
use crate::onboard::tools::reconcile::{self, Reconciliation};
use crate::onboard::tools::status::Status;

/// Loads both exports and writes chunked update bundles.
#[instrument(
    level = "info",
    skip_all,
    fields(building = %building.display(), changes = %changes.display())
)]
pub fn export_update(
    building: &Path,
    changes: &Path,
    options: &UpdateExportOptions,
    output: &Path,
) -> Result<Status> {
    let building = yaml::read_document(building)?;
    let changes = yaml::read_document(changes)?;
    info!(
        building_entities = building.len(),
        change_entities = changes.len(),
        "documents loaded"
    );
    export::export_update_config(&building, &changes, options, output)
}

/// Loads both exports and writes the virtual entity add/update bundles.
#[instrument(
    level = "info",
    skip_all,
    fields(building = %building.display(), changes = %changes.display())
)]
pub fn export_add(
    building: &Path,
    changes: &Path,
    use_change_flags: bool,
    output: &Path,
) -> Result<Status> {
    let building = yaml::read_document(building)?;
    let changes = yaml::read_document(changes)?;
    info!(
        building_entities = building.len(),
        change_entities = changes.len(),
        "documents loaded"
    );
    export::export_add_config(&building, &changes, use_change_flags, output)
}

/// Refreshes the etags of a previously exported bundle.
#[instrument(
    level = "info",
    skip_all,
    fields(building = %building.display(), existing = %existing.display())
)]
pub fn update_etags(building: &Path, existing: &Path, output: &Path) -> Result<Status> {
    let building = yaml::read_document(building)?;
    let existing = yaml::read_document(existing)?;
    export::update_etags(&building, &existing, output)
}

/// Reconciles a regenerated config with the onboarded one.
pub fn reconcile(existing: &Path, new: &Path, output: &Path) -> Result<Reconciliation> {
    reconcile::reconcile_existing(existing, new, output)
}

/// Extracts translation rows from several documents, writing them to an
/// Excel sheet when `output` is given.
#[instrument(level = "info", skip_all, fields(documents = inputs.len(), ids = ids.len()))]
pub fn extract(
    inputs: &[PathBuf],
    ids: &[String],
    output: Option<&Path>,
) -> Result<TranslationTable> {
    let sources = inputs
        .iter()
        .map(|path| SourceDocument::load(path))
        .collect::<Result<Vec<_>>>()?;
    let table = extract::extract_into(TranslationTable::new(), &sources, ids);
    info!(rows = table.len(), "translations extracted");

    if let Some(output) = output {
        excel_write::write_tables(output, &[table.to_sheet(TRANSLATIONS_SHEET)])?;
        info!(output = %output.display(), "translation table written");
    }
    Ok(table)
}

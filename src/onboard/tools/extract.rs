//! Flattens translations and links into rows for auditing.

use std::path::Path;

use serde::Serialize;

use crate::onboard::tools::error::Result;
use crate::onboard::tools::io::excel_write::SheetTable;
use crate::onboard::tools::io::yaml;
use crate::onboard::tools::model::{
    Document, Entity, RawValue, building_code, code, links, scalar_text, translation,
};

/// Sheet name used when exporting extracted translations.
pub const TRANSLATIONS_SHEET: &str = "Translations";

/// Column headers matching the fields of [`TranslationRow`].
pub const COLUMNS: [&str; 8] = [
    "source",
    "building_code",
    "entity_id",
    "entity_code",
    "reporting_entity_id",
    "standard_field",
    "reporting_field",
    "raw_value",
];

/// One standard field of one entity and the raw source behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationRow {
    /// Label of the document the row was read from.
    pub source: String,
    pub building_code: String,
    pub entity_id: String,
    pub entity_code: String,
    /// Reporting entity providing the field; the entity itself for direct
    /// translations.
    pub reporting_entity_id: String,
    pub standard_field: String,
    /// Field name inside the reporting entity's translation.
    pub reporting_field: String,
    pub raw_value: RawValue,
}

impl TranslationRow {
    fn cells(&self) -> Vec<String> {
        vec![
            self.source.clone(),
            self.building_code.clone(),
            self.entity_id.clone(),
            self.entity_code.clone(),
            self.reporting_entity_id.clone(),
            self.standard_field.clone(),
            self.reporting_field.clone(),
            self.raw_value.to_string(),
        ]
    }
}

/// A document together with the label its rows are reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub label: String,
    pub document: Document,
}

impl SourceDocument {
    pub fn new(label: impl Into<String>, document: Document) -> Self {
        Self {
            label: label.into(),
            document,
        }
    }

    /// Loads a YAML document labelled with its path.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(
            path.display().to_string(),
            yaml::read_document(path)?,
        ))
    }
}

/// Rows of the requested entities across all sources, sources first, then
/// identifiers in the order given. Identifiers missing from a source are
/// skipped for that source.
///
/// The iterator borrows its inputs and can be cloned to restart it.
pub fn extract_translations<'a>(
    sources: &'a [SourceDocument],
    ids: &'a [String],
) -> impl Iterator<Item = TranslationRow> + Clone + 'a {
    sources.iter().flat_map(move |source| {
        ids.iter()
            .filter_map(move |id| source.document.get(id).map(|entity| (id, entity)))
            .flat_map(move |(id, entity)| {
                entity_rows(&source.label, id, entity, &source.document)
            })
    })
}

/// Rows of a single entity. Link rows resolve reporting fields against
/// `lookup`; an entity with links is never reported through its translation.
pub fn entity_rows(label: &str, id: &str, entity: &Entity, lookup: &Document) -> Vec<TranslationRow> {
    let entity_code = code(entity).unwrap_or_default();
    let row = |reporting_entity_id: String,
               standard_field: String,
               reporting_field: String,
               raw_value: RawValue| TranslationRow {
        source: label.to_string(),
        building_code: building_code(entity_code).to_string(),
        entity_id: id.to_string(),
        entity_code: entity_code.to_string(),
        reporting_entity_id,
        standard_field,
        reporting_field,
        raw_value,
    };

    if let Some(links) = links(entity) {
        let mut rows = Vec::new();
        for (reporting_key, fields) in links {
            let reporting_id = scalar_text(reporting_key);
            let reporting = lookup.get(&reporting_id);
            let Some(fields) = fields.as_mapping() else {
                continue;
            };
            for (standard, reporting_field) in fields {
                let reporting_field = scalar_text(reporting_field);
                let raw = RawValue::of_field(reporting, &reporting_field);
                rows.push(row(
                    reporting_id.clone(),
                    scalar_text(standard),
                    reporting_field,
                    raw,
                ));
            }
        }
        rows
    } else if let Some(translation) = translation(entity) {
        translation
            .iter()
            .map(|(name, value)| {
                let name = scalar_text(name);
                row(id.to_string(), name.clone(), name, RawValue::classify(value))
            })
            .collect()
    } else {
        Vec::new()
    }
}

/// Accumulator for extracted rows. It is passed into and returned from each
/// extraction so no state outlives a call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TranslationTable {
    pub rows: Vec<TranslationRow>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `rows` and hands the table back.
    pub fn extended(mut self, rows: impl IntoIterator<Item = TranslationRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_sheet(&self, sheet_name: &str) -> SheetTable {
        SheetTable {
            sheet_name: sheet_name.to_string(),
            columns: COLUMNS.iter().map(|column| column.to_string()).collect(),
            rows: self.rows.iter().map(TranslationRow::cells).collect(),
        }
    }
}

/// Extracts the requested entities from `sources` into `table`.
pub fn extract_into(
    table: TranslationTable,
    sources: &[SourceDocument],
    ids: &[String],
) -> TranslationTable {
    table.extended(extract_translations(sources, ids))
}

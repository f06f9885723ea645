use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::onboard::tools::error::{Result, ToolError};
use crate::onboard::tools::model::Document;

const YAML_EXTENSION: &str = ".yaml";

/// Reads a YAML document from disk.
///
/// Key order survives a read/write cycle, but comments, anchors and the
/// original scalar quoting do not.
pub fn read_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let source = fs::read_to_string(path)?;
    let document = parse_document(&source)?;
    debug!(path = %path.display(), entities = document.len(), "document loaded");
    Ok(document)
}

/// Parses YAML text into a [`Document`].
pub fn parse_document(source: &str) -> Result<Document> {
    let value: Value = serde_yaml::from_str(source)?;
    Document::from_value(value)
}

/// Writes a document entity by entity: one single-key YAML mapping per
/// entity, each followed by a blank line, in document order.
pub fn write_document(path: &Path, document: &Document) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for (id, entity) in document.iter() {
        let mut single = Mapping::new();
        single.insert(Value::from(id), Value::Mapping(entity.clone()));
        writer.write_all(serde_yaml::to_string(&single)?.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    debug!(path = %path.display(), entities = document.len(), "document written");
    Ok(())
}

/// Derives an output path by inserting `suffix` before the trailing `.yaml`
/// (`out/site.yaml` + `_pt1` → `out/site_pt1.yaml`).
pub fn derive_output_path(path: &Path, suffix: &str) -> Result<PathBuf> {
    derive_sidecar_path(path, suffix, YAML_EXTENSION)
}

/// Like [`derive_output_path`] but replaces the extension as well
/// (`extension` includes the leading dot).
pub fn derive_sidecar_path(path: &Path, suffix: &str, extension: &str) -> Result<PathBuf> {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(YAML_EXTENSION))
        .ok_or_else(|| ToolError::InvalidOutputPath(path.to_path_buf()))?;
    Ok(path.with_file_name(format!("{stem}{suffix}{extension}")))
}

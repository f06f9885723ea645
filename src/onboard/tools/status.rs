use serde::Serialize;
use tracing::warn;

/// Outcome of an export as shown to the operator.
///
/// Fatal failures are returned as [`ToolError`](crate::ToolError); everything
/// the operator needs to reconcile by hand is collected here instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Non-fatal problems, in the order they were found.
    pub errors: Vec<String>,
    /// Identifiers included in a written bundle.
    pub added_entities: Vec<String>,
    /// One confirmation line per written file.
    pub saved_files: Vec<String>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a recoverable error and logs it.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "recoverable export error");
        self.errors.push(message);
    }

    pub fn added(&mut self, id: impl Into<String>) {
        self.added_entities.push(id.into());
    }

    pub fn saved(&mut self, message: impl Into<String>) {
        self.saved_files.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

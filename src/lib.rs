//! Core library for the onboard-tools command line application.
//!
//! The library exposes the document transforms that prepare building
//! onboarding configs as well as the file-level orchestration the CLI calls.
//! Document types live in [`onboard::tools::model`], ordered merge primitives
//! in [`onboard::tools::merge`], the exporters under
//! [`onboard::tools::export`], and YAML/Excel adapters under
//! [`onboard::tools::io`].

pub mod onboard;

pub use onboard::tools::{
    Result, Status, ToolError, commands, error, export, extract, io, merge, model, pipeline,
    reconcile, status,
};

pub mod commands;
pub mod error;
pub mod export;
pub mod extract;
pub mod io;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod status;

pub use error::{Result, ToolError};
pub use status::Status;

//! Exporters producing onboarding config bundles from a building document
//! and a change document.

pub mod add;
pub mod etags;
pub mod update;

pub use add::{SplitConfigs, export_add_config, split_virtual_entities};
pub use etags::{refresh_etags, update_etags};
pub use update::{UpdateExportOptions, export_update_config};

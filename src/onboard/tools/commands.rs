//! Command-line templates for the remote building configuration service.
//!
//! These are plain string renderings; nothing here talks to the service.

use std::fmt;
use std::path::Path;

use crate::onboard::tools::error::{Result, ToolError};

const SERVICE_TARGET: &str =
    "blade:google.cloud.digitalbuildings.v1alpha1.digitalbuildingsservice-prod";
const SERVICE: &str = "google.cloud.digitalbuildings.v1alpha1.DigitalBuildingsService";
const PROFILE: &str = "projects/digitalbuildings/profiles/MaintenanceOps";
const EXPORT_DEADLINE_MS: u32 = 60_000;

/// Building addressed as `COUNTRY-CITY-BUILDING`, stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingName {
    pub country: String,
    pub city: String,
    pub building: String,
}

impl BuildingName {
    /// Parses a code such as `US-MTV-1234`.
    pub fn parse(code: &str) -> Result<Self> {
        let lowered = code.trim().to_lowercase();
        let parts: Vec<&str> = lowered.split('-').collect();
        match parts.as_slice() {
            [country, city, building]
                if !country.is_empty() && !city.is_empty() && !building.is_empty() =>
            {
                Ok(Self {
                    country: country.to_string(),
                    city: city.to_string(),
                    building: building.to_string(),
                })
            }
            _ => Err(ToolError::InvalidBuildingCode(code.to_string())),
        }
    }
}

impl fmt::Display for BuildingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/digitalbuildings/countries/{}/cities/{}/buildings/{}",
            self.country, self.city, self.building
        )
    }
}

/// Splits free-form identifier input on runs of commas, spaces and newlines.
pub fn parse_id_list(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn quoted_ids(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("'{id}'"))
        .collect::<Vec<_>>()
        .join(",")
}

/// ExportBuildingConfig call, optionally restricted to `ids`.
pub fn export_building_config(building: &BuildingName, ids: &[String]) -> String {
    let mut request = format!("name: '{building}', profile:'{PROFILE}'");
    if !ids.is_empty() {
        request.push_str(&format!(",instance_guid:[{}]", quoted_ids(ids)));
    }
    format!(
        "stubby call {SERVICE_TARGET} {SERVICE}.ExportBuildingConfig --deadline={EXPORT_DEADLINE_MS} --print_status_extensions --proto2 \"{request}\""
    )
}

/// OnboardBuilding call reading the topology from `config`.
pub fn onboard_building(building: &BuildingName, config: &Path) -> String {
    format!(
        "stubby call {SERVICE_TARGET} {SERVICE}.OnboardBuilding --print_status_extensions --proto2 \"name: '{building}', profile:'{PROFILE}'\" --set_field \"topology_file=readfile({})\"",
        config.display()
    )
}

/// GetOperation call polling `operation`, optionally saving the binary
/// response to `outfile`.
pub fn get_operation(building: &BuildingName, operation: &str, outfile: Option<&Path>) -> String {
    let outfile = outfile
        .map(|path| format!(" --outfile={}", path.display()))
        .unwrap_or_default();
    format!(
        "stubby call {SERVICE_TARGET} {SERVICE}.GetOperation --print_status_extensions --proto2{outfile} --binary_output \"name: '{building}', profile:'{PROFILE}', operation_name: '{operation}'\""
    )
}

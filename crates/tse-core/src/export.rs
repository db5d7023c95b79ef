use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::discover::EntityRow;
use crate::error::SaveError;
use crate::field::norm_enum;
use crate::path::TreePath;

pub const EXPORT_VERSION: u32 = 5;
pub const EXPORT_MODE: &str = "match_by_name_smart";

/// One progress entry inside an exported row. `path_abs` is only valid
/// against the save it was exported from; later tiers cover drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub label: String,
    pub value: i64,
    #[serde(default)]
    pub path_abs: Option<TreePath>,
    #[serde(default)]
    pub sig: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRow {
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPayload {
    pub version: u32,
    pub mode: String,
    pub exported_at: String,
    pub rows: Vec<ExportRow>,
}

/// Snapshot discovered rows into the versioned export shape. States are
/// normalized to their canonical `E_*` form on the way out.
pub fn export_payload(rows: &[EntityRow]) -> ExportPayload {
    ExportPayload {
        version: EXPORT_VERSION,
        mode: EXPORT_MODE.to_string(),
        exported_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        rows: rows
            .iter()
            .map(|r| ExportRow {
                name: r.name.clone(),
                state: norm_enum(&r.state),
                progress: r
                    .progress_objects
                    .iter()
                    .map(|o| ProgressEntry {
                        label: o.label.clone(),
                        value: o.value,
                        path_abs: Some(o.path_abs.clone()),
                        sig: o.sig.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn write_export(path: &Path, payload: &ExportPayload) -> Result<(), SaveError> {
    let text = serde_json::to_string_pretty(payload)?;
    fs::write(path, text)?;
    Ok(())
}

pub fn read_export(path: &Path) -> Result<ExportPayload, SaveError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

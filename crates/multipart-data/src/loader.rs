//! Loading pipeline: finds data files, deserializes them, and resolves part
//! kinds into descriptors.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and the
//! deserialization helpers the pipeline is built from.

use crate::descriptor::DataPart;
use crate::schema::PartKindData;
use multipart_core::config::MultipartConfig;
use multipart_core::engine::MultipartEngine;
use multipart_core::id::PartKindId;
use multipart_core::occlusion::Aabb;
use multipart_core::registry::{PartRegistry, PartRegistryBuilder, RegistryError};
use multipart_core::slot::Slot;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Base name of the required part kind file.
pub const PARTS_FILE: &str = "parts";
/// Base name of the optional settings file.
pub const SETTINGS_FILE: &str = "settings";

/// Box corners must lie within the cell, in sixteenths.
const CELL_EXTENT: i32 = 16;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error("duplicate part kind {kind} in {file}")]
    DuplicateKind { file: PathBuf, kind: u16 },

    /// An occlusion box reaches outside the cell.
    #[error("occlusion box of '{name}' leaves the cell in {file}")]
    BoxOutOfCell { file: PathBuf, name: String },

    #[error(transparent)]
    Registry(RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml`, or `.json` in `dir`.
///
/// Returns `Ok(None)` if none exists and `Err(ConflictingFormats)` if more
/// than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so there the list is
/// read from the array at `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let content = std::fs::read_to_string(path)?;
    let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .get(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
        .clone();
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Resolution
// ===========================================================================

/// Turn one part kind entry into a descriptor.
pub fn build_descriptor(entry: &PartKindData, file: &Path) -> Result<DataPart, DataLoadError> {
    let mut boxes = Vec::with_capacity(entry.occlusion.len());
    for data in &entry.occlusion {
        let (from, to) = data.corners();
        let inside = from
            .iter()
            .chain(to.iter())
            .all(|c| (0..=CELL_EXTENT).contains(c));
        if !inside {
            return Err(DataLoadError::BoxOutOfCell {
                file: file.to_path_buf(),
                name: entry.name.clone(),
            });
        }
        boxes.push(Aabb::from_sixteenths(from, to));
    }

    let mut ghosts = BTreeSet::new();
    for name in &entry.ghost_slots {
        let slot: Slot = name.parse().map_err(|_| DataLoadError::UnresolvedRef {
            file: file.to_path_buf(),
            name: name.clone(),
            expected_kind: "slot",
        })?;
        ghosts.insert(slot);
    }

    Ok(DataPart::new(entry.name.clone(), boxes, ghosts, entry.tile))
}

/// Register every entry into `builder`. Returns how many were registered.
pub fn register_part_kinds(
    builder: &mut PartRegistryBuilder,
    entries: &[PartKindData],
    file: &Path,
) -> Result<usize, DataLoadError> {
    for entry in entries {
        let descriptor = build_descriptor(entry, file)?;
        builder
            .register(PartKindId(entry.kind), Arc::new(descriptor))
            .map_err(|e| match e {
                RegistryError::DuplicateKind(kind) => DataLoadError::DuplicateKind {
                    file: file.to_path_buf(),
                    kind: kind.0,
                },
                RegistryError::DuplicateName(name) => DataLoadError::DuplicateName {
                    file: file.to_path_buf(),
                    name,
                },
                other => DataLoadError::Registry(other),
            })?;
    }
    Ok(entries.len())
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Everything loaded from a content directory.
#[derive(Debug)]
pub struct PartData {
    pub registry: PartRegistry,
    pub config: MultipartConfig,
}

impl PartData {
    pub fn into_engine(self) -> MultipartEngine {
        MultipartEngine::new(self.registry).with_config(self.config)
    }
}

/// Load part kinds and settings from `dir`.
pub fn load_part_data(dir: &Path) -> Result<PartData, DataLoadError> {
    load_part_data_into(PartRegistryBuilder::new(), dir)
}

/// Like [`load_part_data`], but adds to kinds already registered in code.
pub fn load_part_data_into(
    mut builder: PartRegistryBuilder,
    dir: &Path,
) -> Result<PartData, DataLoadError> {
    let parts_path = require_data_file(dir, PARTS_FILE)?;
    let entries: Vec<PartKindData> = deserialize_list(&parts_path, "parts")?;
    let count = register_part_kinds(&mut builder, &entries, &parts_path)?;
    debug!(file = %parts_path.display(), count, "part kinds loaded");

    let config = match find_data_file(dir, SETTINGS_FILE)? {
        Some(path) => {
            let config: MultipartConfig = deserialize_file(&path)?;
            debug!(file = %path.display(), ?config, "settings loaded");
            config
        }
        None => MultipartConfig::default(),
    };

    Ok(PartData {
        registry: builder.build(),
        config,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

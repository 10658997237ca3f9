//! Per-bundle install metadata
//!
//! One JSON file per installed bundle, written atomically after a successful
//! install and read back on every update. It is the only durable record
//! linking an installed bundle back to its origin: a bundle with metadata
//! absent or an empty `source` cannot be updated automatically, only
//! reinstalled from scratch.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BunkerError, Result};
use crate::source::SourceKind;

use super::METADATA_FILE;

/// Durable origin record for an installed bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Raw source string as originally given
    pub source: String,

    /// Source kind the bundle was installed from
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Whether the bundle is a live git working copy
    pub tracked: bool,
}

impl Metadata {
    /// Read metadata from an installed bundle directory, if present.
    pub fn load(bundle_dir: &Path) -> Result<Option<Self>> {
        let path = bundle_dir.join(METADATA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| BunkerError::FileReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let metadata =
            serde_json::from_str(&content).map_err(|e| BunkerError::FileReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(metadata))
    }

    /// Write metadata atomically (temp file + rename) into a bundle directory.
    pub fn save(&self, bundle_dir: &Path) -> Result<()> {
        let path = bundle_dir.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(self)?;

        let tmp = bundle_dir.join(format!("{METADATA_FILE}.tmp"));
        fs::write(&tmp, &json).map_err(|e| BunkerError::FileWriteFailed {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp, &path).map_err(|e| BunkerError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Whether the recorded origin supports automatic update.
    pub fn update_eligible(&self) -> bool {
        !self.source.is_empty()
    }
}

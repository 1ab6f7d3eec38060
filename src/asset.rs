//! Serialized controller assets with a content digest.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AssetError;
use crate::graph::Controller;
use crate::logging;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerAsset {
    pub format_version: u32,
    pub sha256: String,
    pub states: usize,
    pub transitions: usize,
    pub controller: Controller,
}

/// Hex SHA-256 of the controller's compact JSON form.
pub fn controller_sha256(controller: &Controller) -> Result<String, AssetError> {
    let bytes = serde_json::to_vec(controller)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

impl ControllerAsset {
    pub fn from_controller(controller: Controller) -> Result<Self, AssetError> {
        let sha256 = controller_sha256(&controller)?;
        logging::log_asset_digest(
            &controller.name,
            &sha256,
            controller.state_count(),
            controller.transition_count(),
        );
        Ok(Self {
            format_version: FORMAT_VERSION,
            sha256,
            states: controller.state_count(),
            transitions: controller.transition_count(),
            controller,
        })
    }

    pub fn to_json(&self) -> Result<String, AssetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses an asset and checks its version and digest.
    pub fn from_json(raw: &str) -> Result<Self, AssetError> {
        let asset: ControllerAsset = serde_json::from_str(raw)?;
        if asset.format_version != FORMAT_VERSION {
            return Err(AssetError::UnsupportedVersion {
                found: asset.format_version,
                expected: FORMAT_VERSION,
            });
        }
        let computed = controller_sha256(&asset.controller)?;
        if computed != asset.sha256 {
            return Err(AssetError::DigestMismatch {
                recorded: asset.sha256,
                computed,
            });
        }
        Ok(asset)
    }

    /// Default file name inside an output directory.
    pub fn file_name(&self) -> String {
        format!("{}.controller.json", self.controller.name)
    }

    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, AssetError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self, AssetError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

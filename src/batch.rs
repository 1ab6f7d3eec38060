//! Protection controllers for many avatars in one pass.

use std::path::Path;

use crate::asset::ControllerAsset;
use crate::compile::assemble;
use crate::config::ProtectionConfig;
use crate::error::{AssetError, CompileError};
use crate::logging::{self, v_num, ProfileScope};

#[derive(Debug)]
pub enum BatchOutcome {
    Built(ControllerAsset),
    /// Empty password; nothing generated.
    Disabled { name: String },
    Failed { name: String, error: CompileError },
}

impl BatchOutcome {
    pub fn name(&self) -> &str {
        match self {
            BatchOutcome::Built(asset) => &asset.controller.name,
            BatchOutcome::Disabled { name } | BatchOutcome::Failed { name, .. } => name,
        }
    }

    pub fn asset(&self) -> Option<&ControllerAsset> {
        match self {
            BatchOutcome::Built(asset) => Some(asset),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub built: usize,
    pub disabled: usize,
    pub failed: usize,
}

pub fn summarize(outcomes: &[BatchOutcome]) -> BatchSummary {
    outcomes.iter().fold(BatchSummary::default(), |mut s, o| {
        match o {
            BatchOutcome::Built(_) => s.built += 1,
            BatchOutcome::Disabled { .. } => s.disabled += 1,
            BatchOutcome::Failed { .. } => s.failed += 1,
        }
        s
    })
}

fn build_one(cfg: &ProtectionConfig) -> Result<BatchOutcome, AssetError> {
    if cfg.is_disabled() {
        return Ok(BatchOutcome::Disabled { name: cfg.name.clone() });
    }
    match assemble(cfg) {
        Ok(controller) => Ok(BatchOutcome::Built(ControllerAsset::from_controller(controller)?)),
        Err(error) => Ok(BatchOutcome::Failed {
            name: cfg.name.clone(),
            error,
        }),
    }
}

/// Builds every avatar independently; one failure never stops the rest.
pub fn build_batch(configs: &[ProtectionConfig]) -> Result<Vec<BatchOutcome>, AssetError> {
    let _scope = ProfileScope::with_context("build_batch", &[("avatars", v_num(configs.len() as f64))]);
    let outcomes = configs.iter().map(build_one).collect::<Result<Vec<_>, _>>()?;
    let summary = summarize(&outcomes);
    logging::log_batch_summary(outcomes.len(), summary.built, summary.disabled, summary.failed);
    Ok(outcomes)
}

pub fn load_batch(path: &Path) -> Result<Vec<ProtectionConfig>, AssetError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

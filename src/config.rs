use serde::{Deserialize, Serialize};

use crate::compile::automaton::Password;
use crate::error::ConfigError;

pub const DEBOUNCE_RANGE: (f64, f64) = (0.01, 10.0);
pub const TOLERANCE_RANGE: (f64, f64) = (0.01, 60.0);
pub const COUNTDOWN_RANGE: (f64, f64) = (1.0, 3600.0);
pub const MAX_PADDING_STATES: usize = 4096;
pub const MAX_HOST_LAYERS: usize = 256;

/// Range check shared by every timing parameter.
pub fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value)
    } else {
        Err(ConfigError::TimingOutOfRange { field, value, min, max })
    }
}

/// Opaque effect clip placed inside the deterrent payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectConfig {
    pub name: String,
    pub clip: String,
    #[serde(default)]
    pub transforms: Vec<String>,
}

/// Everything needed to build one avatar's protection controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub name: String,
    /// Empty means the feature is disabled for this avatar.
    #[serde(default)]
    pub password: Vec<i64>,
    #[serde(default = "default_debounce")]
    pub debounce_secs: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: f64,
    #[serde(default = "default_countdown")]
    pub countdown_secs: f64,
    #[serde(default = "default_warning")]
    pub warning_secs: f64,
    #[serde(default)]
    pub padding_states: usize,
    #[serde(default)]
    pub padding_seed: u64,
    /// Number of pre-existing behavior layers the lock suppresses.
    #[serde(default)]
    pub host_layers: usize,
    /// Renderer paths the lock hides in addition to the body.
    #[serde(default)]
    pub hide_transforms: Vec<String>,
    #[serde(default)]
    pub effects: Vec<EffectConfig>,
}

fn default_debounce() -> f64 {
    0.15
}

fn default_tolerance() -> f64 {
    0.3
}

fn default_countdown() -> f64 {
    120.0
}

fn default_warning() -> f64 {
    30.0
}

impl ProtectionConfig {
    pub fn new(name: &str, password: &[i64]) -> Self {
        Self {
            name: name.to_string(),
            password: password.to_vec(),
            debounce_secs: default_debounce(),
            tolerance_secs: default_tolerance(),
            countdown_secs: default_countdown(),
            warning_secs: default_warning(),
            padding_states: 0,
            padding_seed: 0,
            host_layers: 0,
            hide_transforms: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.password.is_empty()
    }

    /// Validates everything except the password, which the automaton
    /// compiler owns.
    pub fn validate_timing(&self) -> Result<(), ConfigError> {
        check_range("debounce_secs", self.debounce_secs, DEBOUNCE_RANGE)?;
        check_range("tolerance_secs", self.tolerance_secs, TOLERANCE_RANGE)?;
        check_range("countdown_secs", self.countdown_secs, COUNTDOWN_RANGE)?;
        check_range("warning_secs", self.warning_secs, (0.0, COUNTDOWN_RANGE.1))?;
        if self.warning_secs > self.countdown_secs {
            return Err(ConfigError::WarningExceedsDuration {
                warning: self.warning_secs,
                duration: self.countdown_secs,
            });
        }
        if self.padding_states > MAX_PADDING_STATES {
            return Err(ConfigError::PaddingTooLarge {
                count: self.padding_states,
                limit: MAX_PADDING_STATES,
            });
        }
        if self.host_layers > MAX_HOST_LAYERS {
            return Err(ConfigError::HostLayersOutOfRange {
                count: self.host_layers,
                limit: MAX_HOST_LAYERS,
            });
        }
        Ok(())
    }
}

/// Process configuration read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub password: String,
    pub debounce_secs: f64,
    pub tolerance_secs: f64,
    pub countdown_secs: f64,
    pub warning_secs: f64,
    pub padding_states: usize,
    pub padding_seed: u64,
    pub host_layers: usize,
    /// JSON array of `ProtectionConfig`; overrides the single-avatar fields.
    pub batch_file: Option<String>,
    /// Output directory for assets; stdout when unset.
    pub out_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            name: std::env::var("AVATAR_NAME").unwrap_or_else(|_| "avatar".to_string()),
            password: std::env::var("PASSWORD").unwrap_or_default(),
            debounce_secs: std::env::var("DEBOUNCE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default_debounce()),
            tolerance_secs: std::env::var("TOLERANCE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default_tolerance()),
            countdown_secs: std::env::var("COUNTDOWN_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default_countdown()),
            warning_secs: std::env::var("WARNING_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default_warning()),
            padding_states: std::env::var("PADDING_STATES").ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            padding_seed: std::env::var("PADDING_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            host_layers: std::env::var("HOST_LAYERS").ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            batch_file: std::env::var("BATCH_FILE").ok(),
            out_path: std::env::var("OUT_PATH").ok(),
        }
    }

    pub fn protection(&self) -> Result<ProtectionConfig, ConfigError> {
        // Empty disables protection rather than failing.
        let password = if self.password.trim().is_empty() {
            Vec::new()
        } else {
            self.password.parse::<Password>()?.to_raw()
        };
        let mut cfg = ProtectionConfig::new(&self.name, &password);
        cfg.debounce_secs = self.debounce_secs;
        cfg.tolerance_secs = self.tolerance_secs;
        cfg.countdown_secs = self.countdown_secs;
        cfg.warning_secs = self.warning_secs;
        cfg.padding_states = self.padding_states;
        cfg.padding_seed = self.padding_seed;
        cfg.host_layers = self.host_layers;
        Ok(cfg)
    }
}

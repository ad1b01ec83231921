use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Stable identifier for one pluggable validation feature. The set is
/// closed; settings refer to validators by these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidatorTag {
    #[serde(rename = "threading")]
    Threading,
    #[serde(rename = "parameter-validation")]
    ParameterValidation,
    #[serde(rename = "object-tracking")]
    ObjectTracking,
    #[serde(rename = "core-validation")]
    CoreValidation,
    #[serde(rename = "best-practices")]
    BestPractices,
    #[serde(rename = "gpu-assisted")]
    GpuAssisted,
    #[serde(rename = "sync-validation")]
    SyncValidation,
}

impl ValidatorTag {
    /// Every known tag, in default registration order.
    pub const ALL: [ValidatorTag; 7] = [
        ValidatorTag::Threading,
        ValidatorTag::ParameterValidation,
        ValidatorTag::ObjectTracking,
        ValidatorTag::CoreValidation,
        ValidatorTag::BestPractices,
        ValidatorTag::GpuAssisted,
        ValidatorTag::SyncValidation,
    ];
}

/// Layer configuration, loaded from vkveil.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSettings {
    /// Substitute layer-issued opaque identifiers for the driver's
    /// non-dispatchable handles. Disabling this turns every wrap/unwrap
    /// into an identity operation; auxiliary bookkeeping still runs.
    #[serde(default = "default_true")]
    pub wrap_handles: bool,
    /// Abort an intercepted call on the first validator failure. When
    /// false, every validator reports and the call is still forwarded.
    #[serde(default = "default_true")]
    pub stop_on_first_error: bool,
    /// Validators attached to each new instance/device context, in
    /// registration order.
    #[serde(default = "all_validators")]
    pub validators: Vec<ValidatorTag>,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            wrap_handles: true,
            stop_on_first_error: true,
            validators: all_validators(),
        }
    }
}

impl LayerSettings {
    /// Load settings from a TOML file.
    pub fn load(path: &str) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load settings from the default path if present, otherwise return
    /// defaults. The path can be overridden with VKVEIL_CONFIG.
    pub fn load_or_default() -> Self {
        let path =
            std::env::var("VKVEIL_CONFIG").unwrap_or_else(|_| "vkveil.toml".to_string());
        match Self::load(&path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!(%path, %err, "settings not loaded, using defaults");
                Self::default()
            }
        }
    }
}

fn default_true() -> bool {
    true
}

fn all_validators() -> Vec<ValidatorTag> {
    ValidatorTag::ALL.to_vec()
}

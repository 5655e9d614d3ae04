use serde::{Deserialize, Serialize};

use crate::validate::CountPolicy;

pub const DEFAULT_SERVICE_NAME: &str = "Register animals for vet visits";
pub const DEFAULT_REFERENCE_PREFIX: &str = "VV";

/// Behaviour switches for the wizard controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    pub service_name: String,
    /// Zero counts are accepted unless this is set.
    pub reject_zero_counts: bool,
    pub max_count: Option<u64>,
    pub reference_prefix: String,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.into(),
            reject_zero_counts: false,
            max_count: None,
            reference_prefix: DEFAULT_REFERENCE_PREFIX.into(),
        }
    }
}

impl WizardConfig {
    pub fn count_policy(&self) -> CountPolicy {
        CountPolicy {
            reject_zero: self.reject_zero_counts,
            max_count: self.max_count,
        }
    }
}

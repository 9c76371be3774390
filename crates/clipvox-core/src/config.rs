use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BASE_RESOLUTION, MIN_COMPACTION_RESOLUTION};
use crate::error::ConfigError;
use crate::types::UpdatePolicy;

/// Tunables of the clipmap storage engine, loaded from RON.
///
/// ```text
/// (
///     base_resolution: 128,
///     update_policy: SingleCascade,
///     min_compaction_resolution: 32,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Side length of the finest cascade. Must be a power of two.
    #[serde(default = "default_base_resolution")]
    pub base_resolution: u32,
    #[serde(default)]
    pub update_policy: UpdatePolicy,
    /// Compaction is skipped while the finest cascade is smaller than this.
    #[serde(default = "default_min_compaction_resolution")]
    pub min_compaction_resolution: u32,
}

fn default_base_resolution() -> u32 {
    DEFAULT_BASE_RESOLUTION
}

fn default_min_compaction_resolution() -> u32 {
    MIN_COMPACTION_RESOLUTION
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_resolution: DEFAULT_BASE_RESOLUTION,
            update_policy: UpdatePolicy::default(),
            min_compaction_resolution: MIN_COMPACTION_RESOLUTION,
        }
    }
}

impl StorageConfig {
    /// Check the config for values the planner cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_resolution.is_power_of_two() {
            return Err(ConfigError::BaseResolutionNotPowerOfTwo(
                self.base_resolution,
            ));
        }
        if self.min_compaction_resolution == 0 {
            return Err(ConfigError::ZeroCompactionResolution);
        }
        if self.min_compaction_resolution > self.base_resolution {
            log::warn!(
                "min_compaction_resolution {} exceeds base_resolution {}; compaction will never run",
                self.min_compaction_resolution,
                self.base_resolution
            );
        }
        Ok(())
    }
}

/// Parse and validate a storage config from a RON string.
pub fn load_config_from_str(ron_str: &str) -> Result<StorageConfig, ConfigError> {
    let options = ron::Options::default();
    let config: StorageConfig = options
        .from_str(ron_str)
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StorageConfig::default();
        assert_eq!(config.base_resolution, 128);
        assert_eq!(config.min_compaction_resolution, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_full_config() {
        let ron = r#"(
            base_resolution: 64,
            update_policy: AllCascadesMultiplePasses,
            min_compaction_resolution: 16,
        )"#;
        let config = load_config_from_str(ron).expect("should parse");
        assert_eq!(config.base_resolution, 64);
        assert_eq!(config.update_policy, UpdatePolicy::AllCascadesMultiplePasses);
        assert_eq!(config.min_compaction_resolution, 16);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = load_config_from_str("(update_policy: AllCascadesWideDispatch)")
            .expect("should parse");
        assert_eq!(config.base_resolution, 128);
        assert_eq!(config.update_policy, UpdatePolicy::AllCascadesWideDispatch);
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let result = load_config_from_str("(base_resolution: 100)");
        assert!(matches!(
            result,
            Err(ConfigError::BaseResolutionNotPowerOfTwo(100))
        ));
    }

    #[test]
    fn test_zero_compaction_resolution_rejected() {
        let result = load_config_from_str("(min_compaction_resolution: 0)");
        assert!(matches!(result, Err(ConfigError::ZeroCompactionResolution)));
    }

    #[test]
    fn test_malformed_ron_rejected() {
        let result = load_config_from_str("(base_resolution: {");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}

// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Processor configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_SIZE_LIMIT_BYTES;
use crate::error::ProcessorResult;

/// Processor-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Byte budget of each memo (one per cache type)
    pub cache_size_limit_bytes: usize,

    /// Serve logits from probits (and vice versa) instead of caching both
    pub enable_score_type_conversion: bool,

    /// Ask job runners to write results through the data service
    pub use_data_service_write: bool,

    /// Records covered by `get_infs` when the caller gives no count
    pub default_num_influences: usize,

    /// Sweep points per feature in partial dependence jobs
    pub pdp_num_xs: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            cache_size_limit_bytes: DEFAULT_CACHE_SIZE_LIMIT_BYTES,
            enable_score_type_conversion: false,
            use_data_service_write: false,
            default_num_influences: 1000,
            pdp_num_xs: 1000,
        }
    }
}

impl ProcessorConfig {
    /// Create configuration for memory-constrained environments
    pub fn memory_constrained() -> Self {
        Self {
            cache_size_limit_bytes: 1024 * 1024 * 32, // 32MB
            default_num_influences: 100,
            ..Self::default()
        }
    }

    pub fn with_score_type_conversion(mut self, enabled: bool) -> Self {
        self.enable_score_type_conversion = enabled;
        self
    }

    pub fn with_cache_size_limit(mut self, bytes: usize) -> Self {
        self.cache_size_limit_bytes = bytes;
        self
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> ProcessorResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_size_limit_bytes == 0 {
            return Err("cache_size_limit_bytes must be > 0".to_string());
        }
        if self.default_num_influences == 0 {
            return Err("default_num_influences must be > 0".to_string());
        }
        if self.pdp_num_xs < 2 {
            return Err(format!(
                "pdp_num_xs must be at least 2 to describe a curve, got {}",
                self.pdp_num_xs
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.cache_size_limit_bytes, 500_000_000);
        assert!(!config.enable_score_type_conversion);
        assert_eq!(config.default_num_influences, 1000);
        assert_eq!(config.pdp_num_xs, 1000);
        assert!(config.validate().is_ok());
        assert!(ProcessorConfig::memory_constrained().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = ProcessorConfig::default().with_cache_size_limit(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"enable_score_type_conversion": true}}"#).unwrap();

        let config = ProcessorConfig::from_json_file(file.path()).unwrap();
        assert!(config.enable_score_type_conversion);
        assert_eq!(config.pdp_num_xs, 1000);
    }
}

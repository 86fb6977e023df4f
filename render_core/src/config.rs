//! Renderer configuration

use crate::render::camera_output::SortLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Errors loading or validating a `RendererConfig`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables of the frame pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Milliseconds per frame for material uploads; `None` is unbounded
    pub material_upload_budget_ms: Option<f64>,
    /// Milliseconds per frame for mesh uploads; `None` is unbounded
    pub mesh_upload_budget_ms: Option<f64>,
    /// Nearest transparent mesh batches sorted back-to-front per material
    pub max_sorted_batches: usize,
    /// Nearest instances sorted back-to-front inside each sorted batch
    pub max_sorted_instances: usize,
    /// Frames kept for rolling frame statistics
    pub stats_history_len: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            material_upload_budget_ms: Some(2.0),
            mesh_upload_budget_ms: Some(4.0),
            max_sorted_batches: 10,
            max_sorted_instances: 10,
            stats_history_len: 120,
        }
    }
}

impl RendererConfig {
    /// Configuration without any upload limit
    pub fn unbounded() -> Self {
        Self {
            material_upload_budget_ms: None,
            mesh_upload_budget_ms: None,
            ..Default::default()
        }
    }

    /// Load and validate a JSON config; missing fields take their defaults
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!(path = ?path, config = ?config, "Loaded renderer config");
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, budget) in [
            ("material_upload_budget_ms", self.material_upload_budget_ms),
            ("mesh_upload_budget_ms", self.mesh_upload_budget_ms),
        ] {
            if let Some(ms) = budget {
                if !ms.is_finite() || ms < 0.0 {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: format!("expected a finite, non-negative number, got {ms}"),
                    });
                }
            }
        }
        if self.stats_history_len == 0 {
            return Err(ConfigError::Invalid {
                field: "stats_history_len",
                reason: "must keep at least one frame".to_string(),
            });
        }
        Ok(())
    }

    pub fn sort_limits(&self) -> SortLimits {
        SortLimits {
            max_batches: self.max_sorted_batches,
            max_instances: self.max_sorted_instances,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sort_limits(), SortLimits::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RendererConfig =
            serde_json::from_str(r#"{ "mesh_upload_budget_ms": null, "max_sorted_batches": 4 }"#)
                .unwrap();
        assert_eq!(config.mesh_upload_budget_ms, None);
        assert_eq!(config.material_upload_budget_ms, Some(2.0));
        assert_eq!(config.max_sorted_batches, 4);
    }

    #[test]
    fn test_rejects_negative_budget() {
        let config = RendererConfig {
            material_upload_budget_ms: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "material_upload_budget_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_empty_history() {
        let config = RendererConfig {
            stats_history_len: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

use crate::error::{LabelError, Result};
use crate::labels::LabelScheme;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest accepted patch-grid tile edge.
pub const MAX_TILE_SIZE: usize = 4096;

/// Settings for a labeling session. Every field may be omitted in the TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerConfig {
    /// Substring identifying ground-truth files.
    pub gt_marker: String,
    /// Replacement for the first `gt_marker` occurrence to find the prediction.
    pub pred_marker: String,
    /// File extension of the numeric arrays, without the dot.
    pub extension: String,
    /// Name of the label log inside the browsed folder.
    pub log_file_name: String,
    pub scheme: LabelScheme,
    /// Write the whole-image SSIM as a third CSV column.
    pub record_score: bool,
    /// Skip files that already have a row in the label log.
    pub skip_labeled: bool,
    /// Edge length of the patch-wise score tiles. `None` or 0 disables the grid.
    pub tile_size: Option<usize>,
    pub feature_similarity: bool,
    /// Side of the highlighted square drawn at the image center.
    pub highlight_size: usize,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            gt_marker: "gt".to_string(),
            pred_marker: "pred".to_string(),
            extension: "npy".to_string(),
            log_file_name: "labels.csv".to_string(),
            scheme: LabelScheme::default(),
            record_score: true,
            skip_labeled: true,
            tile_size: Some(16),
            feature_similarity: true,
            highlight_size: 16,
        }
    }
}

impl LabelerConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| LabelError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            LabelError::Config { reason, .. } => LabelError::Config {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw).map_err(|e| LabelError::Config {
            path: Default::default(),
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist the config as TOML, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let to_err = |reason: String| LabelError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let raw = toml::to_string_pretty(self).map_err(|e| to_err(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| to_err(e.to_string()))?;
        }
        fs::write(path, raw).map_err(|e| to_err(e.to_string()))
    }

    /// Tile edge length when the patch-wise grid is enabled.
    pub fn effective_tile_size(&self) -> Option<usize> {
        self.tile_size.filter(|&t| t > 0)
    }

    /// Reject settings that would make pair discovery or logging ambiguous.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(LabelError::Config {
                path: Default::default(),
                reason: reason.to_string(),
            })
        };
        if self.gt_marker.is_empty() {
            return invalid("gt_marker must not be empty");
        }
        if self.gt_marker == self.pred_marker {
            return invalid("gt_marker and pred_marker must differ");
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return invalid("extension must be non-empty and given without a leading dot");
        }
        if self.log_file_name.is_empty() {
            return invalid("log_file_name must not be empty");
        }
        if self.tile_size.is_some_and(|t| t > MAX_TILE_SIZE) {
            return invalid("tile_size must be at most 4096 (0 disables the grid)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let cfg = LabelerConfig::load(dir.path().join("labeler.toml"))?;
        assert_eq!(cfg, LabelerConfig::default());
        assert_eq!(cfg.effective_tile_size(), Some(16));
        Ok(())
    }

    #[test]
    fn partial_file_overrides_only_given_fields() -> Result<()> {
        let cfg = LabelerConfig::from_toml_str(
            r#"
            scheme = "binary"
            record_score = false
            tile_size = 0
            "#,
        )?;
        assert_eq!(cfg.scheme, LabelScheme::Binary);
        assert!(!cfg.record_score);
        assert_eq!(cfg.effective_tile_size(), None);
        assert_eq!(cfg.gt_marker, "gt");
        assert_eq!(cfg.log_file_name, "labels.csv");
        Ok(())
    }

    #[test]
    fn rejects_identical_markers() {
        let err = LabelerConfig::from_toml_str(r#"pred_marker = "gt""#).unwrap_err();
        assert!(matches!(err, LabelError::Config { .. }));
    }

    #[test]
    fn rejects_oversized_tiles() {
        let err = LabelerConfig::from_toml_str("tile_size = 5000000000").unwrap_err();
        assert!(matches!(err, LabelError::Config { .. }));
        assert!(LabelerConfig::from_toml_str("tile_size = 4096").is_ok());
    }

    #[test]
    fn save_then_load_preserves_settings() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("labeler.toml");
        let cfg = LabelerConfig {
            scheme: LabelScheme::Detailed,
            skip_labeled: false,
            ..LabelerConfig::default()
        };
        cfg.save(&path)?;
        assert_eq!(LabelerConfig::load(&path)?, cfg);
        Ok(())
    }
}

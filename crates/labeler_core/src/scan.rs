use crate::config::LabelerConfig;
use crate::error::{LabelError, Result};
use std::path::Path;
use walkdir::WalkDir;

/// Naming rules that tie a ground-truth file to its prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairNaming {
    pub gt_marker: String,
    pub pred_marker: String,
    pub extension: String,
}

impl Default for PairNaming {
    fn default() -> Self {
        Self::from_config(&LabelerConfig::default())
    }
}

impl PairNaming {
    pub fn from_config(cfg: &LabelerConfig) -> Self {
        Self {
            gt_marker: cfg.gt_marker.clone(),
            pred_marker: cfg.pred_marker.clone(),
            extension: cfg.extension.clone(),
        }
    }

    /// True when `name` contains the ground-truth marker and ends in the array extension.
    pub fn is_ground_truth(&self, name: &str) -> bool {
        name.contains(&self.gt_marker)
            && name
                .strip_suffix(&self.extension)
                .is_some_and(|stem| stem.ends_with('.'))
    }

    /// Replace the first marker occurrence, e.g. `sample01_gt.npy` -> `sample01_pred.npy`.
    pub fn predicted_name(&self, gt_name: &str) -> String {
        gt_name.replacen(&self.gt_marker, &self.pred_marker, 1)
    }
}

/// List ground-truth file names in `dir` (non-recursive), sorted ascending.
pub fn scan_ground_truth(dir: impl AsRef<Path>, naming: &PairNaming) -> Result<Vec<String>> {
    let root = dir.as_ref();
    let unreadable = |source: std::io::Error| LabelError::DirectoryUnreadable {
        path: root.to_path_buf(),
        source,
    };
    if !root.is_dir() {
        let source = if root.exists() {
            std::io::Error::other("not a directory")
        } else {
            std::io::Error::new(std::io::ErrorKind::NotFound, "path does not exist")
        };
        return Err(unreadable(source));
    }

    let mut names: Vec<String> = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                return Err(unreadable(source));
            }
            Err(e) => {
                tracing::warn!("walkdir error: {}", e);
                continue;
            }
        };
        // Follows symlinks, so linked datasets are listed like plain files.
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            tracing::warn!("skipping non-UTF-8 file name {:?}", entry.file_name());
            continue;
        };
        if naming.is_ground_truth(name) {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

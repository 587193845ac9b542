use std::path::PathBuf;

/// Errors surfaced at the labeling session boundary.
///
/// Every variant is recoverable: the host UI reports it and keeps the session
/// in a usable state.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    /// The chosen folder could not be listed.
    #[error("cannot read directory {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The predicted file derived from a ground-truth name does not exist.
    #[error("predicted file missing for {gt}: expected {expected}")]
    PredictedFileMissing { gt: String, expected: PathBuf },
    /// A file exists but could not be parsed as a 2-D numeric array.
    #[error("cannot load array from {path}: {reason}")]
    ArrayLoadError { path: PathBuf, reason: String },
    /// Min-max normalization would divide by zero.
    #[error("array {name} has no dynamic range (min == max)")]
    DegenerateRange { name: String },
    /// Ground truth and prediction differ in shape.
    #[error("shape mismatch: ground truth {gt:?} vs predicted {pred:?}")]
    ShapeMismatch { gt: Vec<usize>, pred: Vec<usize> },
    /// A label was requested while no sample is displayed.
    #[error("no sample is currently displayed")]
    NoCurrentSample,
    /// The label is not part of the active scheme.
    #[error("label {label:?} is not part of the {scheme} scheme")]
    UnknownLabel { label: String, scheme: &'static str },
    /// Reading or appending the label log failed.
    #[error("label log {path}: {source}")]
    LabelLog { path: PathBuf, source: csv::Error },
    /// The configuration file is unreadable or malformed.
    #[error("config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

pub type Result<T, E = LabelError> = std::result::Result<T, E>;

//! Core of the hallucination labeler: pair discovery, similarity metrics,
//! the append-only label log and the session controller.

pub mod array;
pub mod config;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod render;
pub mod scan;
pub mod session;

pub use config::LabelerConfig;
pub use error::{LabelError, Result};
pub use labels::{LabelLog, LabelRecord, LabelScheme};
pub use metrics::{
    CompareOptions, Comparison, FeatureSimilarity, Scores, SimilarityScorer, Ssim, compare_pair,
};
pub use scan::{PairNaming, scan_ground_truth};
pub use session::{
    DisplayOutcome, NullPresenter, Presenter, SampleView, Session, SessionController, SessionState,
};

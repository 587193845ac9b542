//! Labeling session: browse ground-truth/prediction pairs and record labels.

use crate::array::{load_array, normalize};
use crate::config::LabelerConfig;
use crate::error::{LabelError, Result};
use crate::labels::{LabelLog, LabelRecord, LabelScheme};
use crate::metrics::{CompareOptions, Scores, compare_pair};
use crate::scan::{PairNaming, scan_ground_truth};
use ndarray::Array2;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Where the controller is in its browse cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoDirectoryLoaded,
    Browsing,
    SessionComplete,
}

/// What a display attempt produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayOutcome {
    /// A sample was handed to the presenter.
    Shown { index: usize, scores: Scores },
    /// Every file has been shown or skipped.
    Complete,
}

/// Data handed to a [`Presenter`] for one sample.
#[derive(Debug)]
pub struct SampleView<'a> {
    pub filename: &'a str,
    pub predicted_filename: &'a str,
    /// Zero-based position in the sorted file list.
    pub index: usize,
    pub total: usize,
    pub ground_truth: &'a Array2<f64>,
    pub predicted: &'a Array2<f64>,
    pub difference: &'a Array2<f64>,
    pub scores: Scores,
    pub tile_grid: Option<&'a Array2<f64>>,
    pub tile_size: Option<usize>,
}

/// Renders samples. The controller never reads anything back.
pub trait Presenter {
    fn present(&mut self, view: &SampleView<'_>);

    fn session_complete(&mut self, _total: usize) {}
}

/// A presenter that shows nothing.
#[derive(Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn present(&mut self, _view: &SampleView<'_>) {}
}

#[derive(Debug, Clone, PartialEq)]
struct CurrentSample {
    index: usize,
    scores: Scores,
}

/// State of one opened folder.
#[derive(Debug)]
pub struct Session {
    dir: PathBuf,
    files: Vec<String>,
    cursor: usize,
    labeled: HashSet<String>,
    current: Option<CurrentSample>,
    log: LabelLog,
}

impl Session {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ground-truth file names, sorted ascending.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Index of the next file to display.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn log(&self) -> &LabelLog {
        &self.log
    }

    pub fn is_labeled(&self, name: &str) -> bool {
        self.labeled.contains(name)
    }

    /// File name of the sample currently on screen.
    pub fn current_filename(&self) -> Option<&str> {
        self.current
            .as_ref()
            .map(|c| self.files[c.index].as_str())
    }
}

/// Drives the browse/label cycle for one folder at a time.
#[derive(Debug)]
pub struct SessionController {
    config: LabelerConfig,
    naming: PairNaming,
    session: Option<Session>,
}

impl SessionController {
    pub fn new(config: LabelerConfig) -> Self {
        let naming = PairNaming::from_config(&config);
        Self {
            config,
            naming,
            session: None,
        }
    }

    pub fn config(&self) -> &LabelerConfig {
        &self.config
    }

    pub fn scheme(&self) -> LabelScheme {
        self.config.scheme
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> SessionState {
        match &self.session {
            None => SessionState::NoDirectoryLoaded,
            Some(s) if s.files.is_empty() => SessionState::NoDirectoryLoaded,
            Some(s) if s.current.is_none() && s.cursor >= s.files.len() => {
                SessionState::SessionComplete
            }
            Some(_) => SessionState::Browsing,
        }
    }

    /// `(files with a log entry, total files)` for the open folder.
    pub fn progress(&self) -> (usize, usize) {
        match &self.session {
            Some(s) => {
                let done = s.files.iter().filter(|f| s.labeled.contains(*f)).count();
                (done, s.files.len())
            }
            None => (0, 0),
        }
    }

    /// Open a folder, reset the cursor and display its first unlabeled sample.
    ///
    /// A folder that cannot be listed leaves the previous session in place.
    pub fn open_directory(
        &mut self,
        dir: impl AsRef<Path>,
        presenter: &mut dyn Presenter,
    ) -> Result<DisplayOutcome> {
        let dir = dir.as_ref();
        let files = scan_ground_truth(dir, &self.naming)?;
        let log = LabelLog::new(dir, &self.config.log_file_name, self.config.record_score);
        let labeled = log.labeled_filenames()?;
        tracing::info!(
            "opened {}: {} ground-truth files, {} already labeled",
            dir.display(),
            files.len(),
            labeled.len()
        );
        self.session = Some(Session {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
            labeled,
            current: None,
            log,
        });
        self.display_current(presenter)
    }

    /// Show the sample at the cursor, skipping already-labeled files when
    /// enabled. On failure the cursor stays on the failed sample.
    pub fn display_current(&mut self, presenter: &mut dyn Presenter) -> Result<DisplayOutcome> {
        let skip_labeled = self.config.skip_labeled;
        let opts = CompareOptions {
            tile_size: self.config.effective_tile_size(),
            feature_similarity: self.config.feature_similarity,
        };
        let Some(session) = self.session.as_mut() else {
            return Err(LabelError::NoCurrentSample);
        };
        session.current = None;

        if skip_labeled {
            while session.cursor < session.files.len()
                && session.labeled.contains(&session.files[session.cursor])
            {
                tracing::debug!("skipping labeled {}", session.files[session.cursor]);
                session.cursor += 1;
            }
        }
        if session.cursor >= session.files.len() {
            tracing::info!("session complete in {}", session.dir.display());
            presenter.session_complete(session.files.len());
            return Ok(DisplayOutcome::Complete);
        }

        let index = session.cursor;
        let gt_name = &session.files[index];
        let pred_name = self.naming.predicted_name(gt_name);
        let pred_path = session.dir.join(&pred_name);
        if !pred_path.is_file() {
            return Err(LabelError::PredictedFileMissing {
                gt: gt_name.clone(),
                expected: pred_path,
            });
        }

        let gt = normalize(&load_array(session.dir.join(gt_name))?, gt_name)?;
        let pred = normalize(&load_array(&pred_path)?, &pred_name)?;
        if gt.dim() != pred.dim() {
            return Err(LabelError::ShapeMismatch {
                gt: gt.shape().to_vec(),
                pred: pred.shape().to_vec(),
            });
        }
        let comparison = compare_pair(&gt, &pred, opts)?;

        presenter.present(&SampleView {
            filename: gt_name,
            predicted_filename: &pred_name,
            index,
            total: session.files.len(),
            ground_truth: &gt,
            predicted: &pred,
            difference: &comparison.difference,
            scores: comparison.scores,
            tile_grid: comparison.tile_grid.as_ref(),
            tile_size: opts.tile_size,
        });

        session.current = Some(CurrentSample {
            index,
            scores: comparison.scores,
        });
        session.cursor = index + 1;
        Ok(DisplayOutcome::Shown {
            index,
            scores: comparison.scores,
        })
    }

    /// Record `label` for the sample on screen and move to the next one.
    pub fn save_label(
        &mut self,
        label: &str,
        presenter: &mut dyn Presenter,
    ) -> Result<DisplayOutcome> {
        let scheme = self.config.scheme;
        let session = self.session.as_mut().ok_or(LabelError::NoCurrentSample)?;
        let current = session.current.clone().ok_or(LabelError::NoCurrentSample)?;
        let label = scheme.validate(label)?;
        let filename = session.files[current.index].clone();

        session.log.append(&LabelRecord {
            filename: filename.clone(),
            label: label.to_string(),
            score: Some(current.scores.ssim),
        })?;
        session.labeled.insert(filename);
        session.current = None;
        self.display_current(presenter)
    }

    /// Move past the sample on screen, or past one that failed to display,
    /// without writing a label.
    pub fn skip_current(&mut self, presenter: &mut dyn Presenter) -> Result<DisplayOutcome> {
        let session = self.session.as_mut().ok_or(LabelError::NoCurrentSample)?;
        match session.current.take() {
            Some(current) => tracing::info!("skipped {}", session.files[current.index]),
            None if session.cursor < session.files.len() => {
                tracing::info!("skipped {}", session.files[session.cursor]);
                session.cursor += 1;
            }
            None => return Err(LabelError::NoCurrentSample),
        }
        self.display_current(presenter)
    }
}

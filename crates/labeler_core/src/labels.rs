use crate::error::{LabelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Closed set of categories a labeler can choose from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelScheme {
    /// `hallucination` / `normal`.
    Binary,
    /// Mild and severe hallucinations plus `normal`.
    #[default]
    Severity,
    /// Edge, contrast, texture and artifact hallucinations plus `normal`.
    Detailed,
}

impl LabelScheme {
    pub const ALL: [LabelScheme; 3] = [Self::Binary, Self::Severity, Self::Detailed];

    pub fn name(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Severity => "severity",
            Self::Detailed => "detailed",
        }
    }

    /// Category strings as written to the log.
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            Self::Binary => &["hallucination", "normal"],
            Self::Severity => &["mild_hallucination", "severe_hallucination", "normal"],
            Self::Detailed => &[
                "edge_hallucination",
                "contrast_hallucination",
                "texture_hallucination",
                "artifact_hallucination",
                "normal",
            ],
        }
    }

    /// Button caption for a category, e.g. `edge_hallucination` -> `Edge Hallucination`.
    pub fn caption(category: &str) -> String {
        category
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Resolve `label` to the scheme's canonical category.
    pub fn validate(self, label: &str) -> Result<&'static str> {
        self.categories()
            .iter()
            .copied()
            .find(|c| *c == label)
            .ok_or_else(|| LabelError::UnknownLabel {
                label: label.to_string(),
                scheme: self.name(),
            })
    }
}

/// One row of the label log.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    /// Ground-truth file name as scanned, extension included.
    pub filename: String,
    pub label: String,
    /// Whole-image SSIM at the time of labeling.
    pub score: Option<f64>,
}

/// Append-only CSV log of label decisions for one folder.
#[derive(Debug, Clone)]
pub struct LabelLog {
    path: PathBuf,
    with_score: bool,
}

impl LabelLog {
    pub fn new(dir: impl AsRef<Path>, file_name: &str, with_score: bool) -> Self {
        Self {
            path: dir.as_ref().join(file_name),
            with_score,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first when the file is new.
    ///
    /// An existing log keeps its own column set: rows are written with or
    /// without the score to match its header.
    pub fn append(&self, record: &LabelRecord) -> Result<()> {
        let existing_width = self.existing_width()?;
        let with_score = existing_width.map_or(self.with_score, |width| {
            let existing = width >= 3;
            if existing != self.with_score {
                tracing::warn!(
                    "{} has {width} columns; writing rows in its layout",
                    self.path.display()
                );
            }
            existing
        });
        let write = || -> std::result::Result<(), csv::Error> {
            // A missing or empty log gets a header.
            let is_new = existing_width.is_none();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
            if is_new {
                wtr.write_record(header_for(with_score))?;
            }
            if with_score {
                let score = record.score.map(|s| format!("{s:.3}")).unwrap_or_default();
                wtr.write_record([
                    record.filename.as_str(),
                    record.label.as_str(),
                    score.as_str(),
                ])?;
            } else {
                wtr.write_record([record.filename.as_str(), record.label.as_str()])?;
            }
            wtr.flush()?;
            Ok(())
        };
        write().map_err(|source| self.log_error(source))?;
        tracing::info!("labeled {} as {}", record.filename, record.label);
        Ok(())
    }

    /// File names already present in the log. Only the first field of each
    /// row is read; a missing log yields an empty set.
    pub fn labeled_filenames(&self) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        for row in self.raw_rows()? {
            if let Some(name) = row.first() {
                names.insert(name.clone());
            }
        }
        Ok(names)
    }

    /// Parsed rows in append order. Rows without a label column are skipped.
    pub fn records(&self) -> Result<Vec<LabelRecord>> {
        Ok(self
            .raw_rows()?
            .into_iter()
            .filter(|row| row.len() >= 2)
            .map(|row| LabelRecord {
                score: row.get(2).and_then(|s| s.trim().parse().ok()),
                label: row[1].clone(),
                filename: row[0].clone(),
            })
            .collect())
    }

    /// Number of rows per label.
    pub fn category_counts(&self) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for record in self.records()? {
            *counts.entry(record.label).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Header width of an existing, non-empty log.
    fn existing_width(&self) -> Result<Option<usize>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|source| self.log_error(source))?;
        let headers = rdr.headers().map_err(|source| self.log_error(source))?;
        Ok((!headers.is_empty()).then_some(headers.len()))
    }

    fn raw_rows(&self) -> Result<Vec<Vec<String>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|source| self.log_error(source))?;
        let mut rows = Vec::new();
        for result in rdr.records() {
            match result {
                Ok(rec) => rows.push(rec.iter().map(str::to_string).collect()),
                Err(e) => tracing::warn!("unreadable row in {}: {e}", self.path.display()),
            }
        }
        Ok(rows)
    }

    fn log_error(&self, source: csv::Error) -> LabelError {
        LabelError::LabelLog {
            path: self.path.clone(),
            source,
        }
    }
}

fn header_for(with_score: bool) -> &'static [&'static str] {
    if with_score {
        &["filename", "label", "ssim_score"]
    } else {
        &["filename", "label"]
    }
}

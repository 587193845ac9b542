use anyhow::Result;
use labeler_core::{
    DisplayOutcome, LabelError, LabelerConfig, LabelScheme, Presenter, SampleView,
    SessionController, SessionState,
};
use ndarray::Array2;
use ndarray_npy::write_npy;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[derive(Default)]
struct Recorder {
    shown: Vec<(String, f64, Option<(usize, usize)>)>,
    completed: usize,
}

impl Presenter for Recorder {
    fn present(&mut self, view: &SampleView<'_>) {
        assert_eq!(view.ground_truth.dim(), view.difference.dim());
        self.shown.push((
            view.filename.to_string(),
            view.scores.ssim,
            view.tile_grid.map(|g| g.dim()),
        ));
    }

    fn session_complete(&mut self, _total: usize) {
        self.completed += 1;
    }
}

fn pattern(offset: usize) -> Array2<f64> {
    Array2::from_shape_fn((48, 48), |(r, c)| ((r * 5 + c * 3 + offset) % 17) as f64 * 10.0)
}

fn write_pair(dir: &Path, stem: &str, offset: usize) -> Result<()> {
    write_npy(dir.join(format!("{stem}_gt.npy")), &pattern(0))?;
    write_npy(dir.join(format!("{stem}_pred.npy")), &pattern(offset))?;
    Ok(())
}

#[test]
fn label_two_samples_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    write_pair(dir.path(), "sample01", 1)?;
    write_pair(dir.path(), "sample02", 0)?;

    let mut ctl = SessionController::new(LabelerConfig::default());
    let mut rec = Recorder::default();

    let first = ctl.open_directory(dir.path(), &mut rec)?;
    assert_eq!(
        ctl.session().map(|s| s.files().to_vec()),
        Some(vec!["sample01_gt.npy".to_string(), "sample02_gt.npy".to_string()])
    );
    let DisplayOutcome::Shown { index: 0, scores } = first else {
        panic!("expected sample01 to be shown, got {first:?}");
    };
    assert_eq!(ctl.state(), SessionState::Browsing);
    assert_eq!(rec.shown[0].2, Some((3, 3)));

    let second = ctl.save_label("normal", &mut rec)?;
    assert!(matches!(second, DisplayOutcome::Shown { index: 1, .. }));
    let log = fs::read_to_string(dir.path().join("labels.csv"))?;
    assert_eq!(
        log,
        format!(
            "filename,label,ssim_score\nsample01_gt.npy,normal,{:.3}\n",
            scores.ssim
        )
    );
    // sample02 is an identical pair.
    assert!((rec.shown[1].1 - 1.0).abs() < 1e-9);

    let done = ctl.save_label("severe_hallucination", &mut rec)?;
    assert_eq!(done, DisplayOutcome::Complete);
    assert_eq!(ctl.state(), SessionState::SessionComplete);
    assert_eq!(rec.completed, 1);
    assert_eq!(ctl.progress(), (2, 2));

    let err = ctl.save_label("normal", &mut rec).unwrap_err();
    assert!(matches!(err, LabelError::NoCurrentSample));
    assert_eq!(fs::read_to_string(dir.path().join("labels.csv"))?.lines().count(), 3);
    Ok(())
}

#[test]
fn reopening_is_idempotent_and_resets_cursor() -> Result<()> {
    let dir = tempdir()?;
    for (i, stem) in ["c", "a", "b"].iter().enumerate() {
        write_pair(dir.path(), stem, i + 1)?;
    }
    let cfg = LabelerConfig {
        skip_labeled: false,
        ..LabelerConfig::default()
    };
    let mut ctl = SessionController::new(cfg);
    let mut rec = Recorder::default();

    ctl.open_directory(dir.path(), &mut rec)?;
    let first = ctl.session().map(|s| s.files().to_vec());
    ctl.save_label("normal", &mut rec)?;
    assert_eq!(ctl.session().map(|s| s.cursor()), Some(2));

    ctl.open_directory(dir.path(), &mut rec)?;
    assert_eq!(ctl.session().map(|s| s.files().to_vec()), first);
    // Cursor was reset to 0 and the first file displayed again.
    assert_eq!(ctl.session().map(|s| s.cursor()), Some(1));
    assert_eq!(rec.shown.last().map(|s| s.0.as_str()), Some("a_gt.npy"));
    Ok(())
}

#[test]
fn labeled_files_are_skipped_after_restart() -> Result<()> {
    let dir = tempdir()?;
    write_pair(dir.path(), "sample01", 1)?;
    write_pair(dir.path(), "sample02", 2)?;

    let mut ctl = SessionController::new(LabelerConfig::default());
    ctl.open_directory(dir.path(), &mut Recorder::default())?;
    ctl.save_label("mild_hallucination", &mut Recorder::default())?;

    let mut restarted = SessionController::new(LabelerConfig::default());
    let mut rec = Recorder::default();
    restarted.open_directory(dir.path(), &mut rec)?;
    let names: Vec<&str> = rec.shown.iter().map(|s| s.0.as_str()).collect();
    assert_eq!(names, vec!["sample02_gt.npy"]);
    Ok(())
}

#[test]
fn missing_prediction_does_not_silently_advance() -> Result<()> {
    let dir = tempdir()?;
    write_npy(dir.path().join("only_gt.npy"), &pattern(0))?;

    let mut ctl = SessionController::new(LabelerConfig::default());
    let mut rec = Recorder::default();
    let err = ctl.open_directory(dir.path(), &mut rec).unwrap_err();
    match err {
        LabelError::PredictedFileMissing { gt, expected } => {
            assert_eq!(gt, "only_gt.npy");
            assert_eq!(expected.file_name().and_then(|n| n.to_str()), Some("only_pred.npy"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ctl.session().map(|s| s.cursor()), Some(0));
    assert_eq!(ctl.state(), SessionState::Browsing);
    assert!(rec.shown.is_empty());

    assert_eq!(ctl.skip_current(&mut rec)?, DisplayOutcome::Complete);
    assert_eq!(ctl.state(), SessionState::SessionComplete);
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlinked_pairs_are_browsed() -> Result<()> {
    use std::os::unix::fs::symlink;

    let store = tempdir()?;
    write_pair(store.path(), "s", 1)?;
    let dir = tempdir()?;
    for name in ["s_gt.npy", "s_pred.npy"] {
        symlink(store.path().join(name), dir.path().join(name))?;
    }

    let mut ctl = SessionController::new(LabelerConfig::default());
    let mut rec = Recorder::default();
    let outcome = ctl.open_directory(dir.path(), &mut rec)?;
    assert!(matches!(outcome, DisplayOutcome::Shown { index: 0, .. }));
    assert_eq!(ctl.state(), SessionState::Browsing);
    assert_eq!(rec.shown[0].0, "s_gt.npy");
    Ok(())
}

#[test]
fn binary_scheme_without_score_or_tiles() -> Result<()> {
    let dir = tempdir()?;
    write_pair(dir.path(), "x", 3)?;
    let cfg = LabelerConfig {
        scheme: LabelScheme::Binary,
        record_score: false,
        tile_size: None,
        feature_similarity: false,
        ..LabelerConfig::default()
    };
    let mut ctl = SessionController::new(cfg);
    let mut rec = Recorder::default();
    ctl.open_directory(dir.path(), &mut rec)?;
    assert_eq!(rec.shown[0].2, None);

    assert!(matches!(
        ctl.save_label("mild_hallucination", &mut rec).unwrap_err(),
        LabelError::UnknownLabel { .. }
    ));
    ctl.save_label("hallucination", &mut rec)?;
    assert_eq!(
        fs::read_to_string(dir.path().join("labels.csv"))?,
        "filename,label\nx_gt.npy,hallucination\n"
    );
    Ok(())
}

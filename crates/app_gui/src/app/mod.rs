mod presenter;
mod settings;

use anyhow::Context as _;
use directories_next::ProjectDirs;
use eframe::{App, Frame, egui};
use labeler_core::render::center_box;
use labeler_core::{DisplayOutcome, LabelScheme, LabelerConfig, SessionController, SessionState};
use presenter::{GuiPresenter, ShownSample};
use rfd::FileDialog;
use std::collections::BTreeMap;
use std::path::PathBuf;

const IMAGE_BOX: f32 = 360.0;

/// Location of `labeler.toml` in the platform config directory.
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("uk.ac.ucl", "IQT", "HallucinationLabeler")
        .map(|dirs| dirs.config_dir().join("labeler.toml"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Label,
    Settings,
}

enum Action {
    OpenFolder(PathBuf),
    Label(&'static str),
    Skip,
    Retry,
}

pub struct UiApp {
    controller: SessionController,
    view: GuiPresenter,
    panel: Panel,
    status: String,
    counts: BTreeMap<String, usize>,
    pending_config: LabelerConfig,
    config_path: Option<PathBuf>,
}

impl UiApp {
    pub fn new(ctx: egui::Context, config: LabelerConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            controller: SessionController::new(config.clone()),
            view: GuiPresenter::new(ctx),
            panel: Panel::Label,
            status: String::new(),
            counts: BTreeMap::new(),
            pending_config: config,
            config_path,
        }
    }

    fn run(&mut self, action: Action) {
        let result = match action {
            Action::OpenFolder(dir) => {
                self.view.clear();
                self.controller.open_directory(&dir, &mut self.view)
            }
            Action::Label(label) => self.controller.save_label(label, &mut self.view),
            Action::Skip => self.controller.skip_current(&mut self.view),
            Action::Retry => self.controller.display_current(&mut self.view),
        };
        self.status = match result {
            Ok(DisplayOutcome::Shown { .. }) => String::new(),
            Ok(DisplayOutcome::Complete)
                if self.controller.state() == SessionState::NoDirectoryLoaded =>
            {
                "No ground-truth .npy files found".to_string()
            }
            Ok(DisplayOutcome::Complete) => "All samples labeled".to_string(),
            Err(e) => {
                tracing::warn!("{e}");
                format!("Error: {e}")
            }
        };
        // A failed display leaves nothing current; drop the previous sample's textures.
        if !self.has_current_sample() {
            self.view.shown = None;
        }
        self.refresh_counts();
    }

    /// True while the controller holds a displayed sample that can be labeled.
    fn has_current_sample(&self) -> bool {
        self.controller
            .session()
            .and_then(|s| s.current_filename())
            .is_some()
    }

    fn refresh_counts(&mut self) {
        let Some(session) = self.controller.session() else {
            self.counts.clear();
            return;
        };
        match session.log().category_counts() {
            Ok(counts) => self.counts = counts,
            Err(e) => tracing::warn!("Cannot read label log: {e}"),
        }
    }

    /// Persist the edited settings and restart the open folder with them.
    fn apply_settings(&mut self) -> anyhow::Result<()> {
        self.pending_config.validate().context("invalid settings")?;
        if let Some(path) = &self.config_path {
            self.pending_config
                .save(path)
                .with_context(|| format!("saving settings to {}", path.display()))?;
        }
        let reopen = self.controller.session().map(|s| s.dir().to_path_buf());
        self.controller = SessionController::new(self.pending_config.clone());
        self.view.clear();
        self.counts.clear();
        if let Some(dir) = reopen {
            self.run(Action::OpenFolder(dir));
        }
        Ok(())
    }

    fn render_top_bar(&mut self, ui: &mut egui::Ui, action: &mut Option<Action>) {
        ui.horizontal(|ui| {
            if ui.button("Load Folder...").clicked()
                && let Some(dir) = FileDialog::new().set_directory(".").pick_folder()
            {
                *action = Some(Action::OpenFolder(dir));
            }
            let settings_label = match self.panel {
                Panel::Label => "Settings",
                Panel::Settings => "Back",
            };
            if ui.button(settings_label).clicked() {
                self.panel = match self.panel {
                    Panel::Label => Panel::Settings,
                    Panel::Settings => Panel::Label,
                };
            }
            if let Some(session) = self.controller.session() {
                let (done, total) = self.controller.progress();
                ui.label(format!("{}: {done}/{total} labeled", session.dir().display()));
            }
            if !self.status.is_empty() {
                ui.label(&self.status);
            }
        });
    }

    fn render_label_buttons(&self, ui: &mut egui::Ui, action: &mut Option<Action>) {
        let state = self.controller.state();
        let has_sample = self.has_current_sample();
        ui.horizontal(|ui| {
            for &category in self.controller.scheme().categories() {
                let caption = LabelScheme::caption(category);
                if ui
                    .add_enabled(has_sample, egui::Button::new(caption))
                    .clicked()
                {
                    *action = Some(Action::Label(category));
                }
            }
            ui.separator();
            if ui
                .add_enabled(state == SessionState::Browsing, egui::Button::new("Skip"))
                .clicked()
            {
                *action = Some(Action::Skip);
            }
            if ui
                .add_enabled(
                    state == SessionState::Browsing && !has_sample,
                    egui::Button::new("Retry"),
                )
                .clicked()
            {
                *action = Some(Action::Retry);
            }
        });
    }

    fn render_sample(&self, ui: &mut egui::Ui, shown: &ShownSample) {
        let (h, w) = shown.dims;
        let highlight = center_box(h, w, self.controller.config().highlight_size);
        ui.label(format!(
            "{} / {}: {} vs {}",
            shown.index + 1,
            shown.total,
            shown.filename,
            shown.predicted_filename
        ));
        ui.horizontal(|ui| {
            image_panel(ui, &shown.ground_truth, "Ground Truth", shown.dims, Some(highlight));
            image_panel(
                ui,
                &shown.predicted,
                &predicted_title(shown),
                shown.dims,
                Some(highlight),
            );
        });
        ui.horizontal(|ui| {
            image_panel(ui, &shown.difference, "Difference |gt - pred|", shown.dims, None);
            if let Some(grid) = &shown.tile_grid {
                let title = match shown.worst_tile {
                    Some(worst) => format!("Patch-wise SSIM (min {worst:.3})"),
                    None => "Patch-wise SSIM".to_string(),
                };
                image_panel(ui, grid, &title, shown.dims, None);
            }
        });
    }
}

fn predicted_title(shown: &ShownSample) -> String {
    match shown.scores.fsim {
        Some(fsim) => format!(
            "Predicted -> SSIM: {:.3}  FSIM: {:.3}",
            shown.scores.ssim, fsim
        ),
        None => format!("Predicted -> SSIM: {:.3}", shown.scores.ssim),
    }
}

/// Largest size with the image's aspect ratio that fits in `max` × `max`.
fn fit_size(dims: (usize, usize), max: f32) -> egui::Vec2 {
    let (h, w) = (dims.0.max(1) as f32, dims.1.max(1) as f32);
    let scale = max / h.max(w);
    egui::Vec2::new(w * scale, h * scale)
}

fn image_panel(
    ui: &mut egui::Ui,
    tex: &egui::TextureHandle,
    title: &str,
    dims: (usize, usize),
    highlight: Option<(usize, usize, usize)>,
) {
    ui.vertical(|ui| {
        ui.label(title);
        let desired = fit_size(dims, IMAGE_BOX);
        let (resp, painter) = ui.allocate_painter(desired, egui::Sense::hover());
        let r = resp.rect;
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        painter.image(tex.id(), r, uv, egui::Color32::WHITE);
        if let Some((x, y, side)) = highlight {
            let scale = r.width() / dims.1.max(1) as f32;
            let min = r.min + egui::vec2(x as f32 * scale, y as f32 * scale);
            let rect = egui::Rect::from_min_size(min, egui::Vec2::splat(side as f32 * scale));
            painter.rect_stroke(
                rect,
                0.0,
                egui::Stroke::new(2.0, egui::Color32::RED),
                egui::StrokeKind::Inside,
            );
        }
    });
}

impl App for UiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        let mut action: Option<Action> = None;

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.heading("IQT Image Labeler");
            self.render_top_bar(ui, &mut action);
        });

        if self.panel == Panel::Label {
            egui::TopBottomPanel::bottom("labels").show(ctx, |ui| {
                self.render_label_buttons(ui, &mut action);
                if !self.counts.is_empty() {
                    let summary: Vec<String> =
                        self.counts.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    ui.label(summary.join("  "));
                }
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.panel {
            Panel::Settings => {
                if self.render_settings_panel(ui) {
                    match self.apply_settings() {
                        Ok(()) => {
                            if self.status.is_empty() {
                                self.status = "Settings applied".to_string();
                            }
                            self.panel = Panel::Label;
                        }
                        Err(e) => self.status = format!("Error: {e:#}"),
                    }
                }
            }
            Panel::Label => {
                egui::ScrollArea::both()
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        if let Some(shown) = &self.view.shown {
                            self.render_sample(ui, shown);
                        } else if let Some(total) = self.view.completed {
                            if total == 0 {
                                ui.heading("No image pairs found");
                            } else {
                                ui.heading(format!("Session complete: {total} files"));
                            }
                        } else if self.controller.session().is_none() {
                            ui.heading("Load a folder with *gt*.npy / *pred*.npy pairs");
                            ui.label("Only .npy files are supported.");
                        }
                    });
            }
        });

        if let Some(action) = action {
            self.run(action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use ndarray_npy::write_npy;
    use rstest::rstest;
    use tempfile::tempdir;

    fn image(seed: usize) -> Array2<f64> {
        Array2::from_shape_fn((16, 16), |(r, c)| ((r * 3 + c + seed) % 7) as f64)
    }

    #[test]
    fn failed_display_after_save_clears_sample() -> anyhow::Result<()> {
        let dir = tempdir()?;
        write_npy(dir.path().join("a_gt.npy"), &image(0))?;
        write_npy(dir.path().join("a_pred.npy"), &image(1))?;
        write_npy(dir.path().join("b_gt.npy"), &image(2))?;

        let mut app = UiApp::new(egui::Context::default(), LabelerConfig::default(), None);
        app.run(Action::OpenFolder(dir.path().to_path_buf()));
        assert!(app.has_current_sample());
        assert!(app.view.shown.is_some());

        app.run(Action::Label("normal"));
        assert!(app.status.starts_with("Error:"), "status was {:?}", app.status);
        assert!(!app.has_current_sample());
        assert!(app.view.shown.is_none());
        assert_eq!(app.controller.state(), SessionState::Browsing);

        // Retry hits the same missing prediction instead of skipping it.
        app.run(Action::Retry);
        assert!(app.view.shown.is_none());
        assert_eq!(app.controller.session().map(|s| s.cursor()), Some(1));
        Ok(())
    }

    #[rstest]
    #[case((64, 64), (360.0, 360.0))]
    #[case((32, 64), (360.0, 180.0))]
    #[case((100, 50), (180.0, 360.0))]
    fn fit_size_keeps_aspect(#[case] dims: (usize, usize), #[case] expected: (f32, f32)) {
        let size = fit_size(dims, IMAGE_BOX);
        assert!((size.x - expected.0).abs() < 1e-3, "width {}", size.x);
        assert!((size.y - expected.1).abs() < 1e-3, "height {}", size.y);
    }
}

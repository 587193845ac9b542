//! Settings panel for the label scheme, metrics and log options.

use super::UiApp;
use eframe::egui;
use labeler_core::LabelScheme;

impl UiApp {
    /// Renders the settings screen. Returns true when the user hits "Apply".
    pub(super) fn render_settings_panel(&mut self, ui: &mut egui::Ui) -> bool {
        let cfg = &mut self.pending_config;
        ui.heading("Settings");
        ui.add_space(8.0);

        ui.horizontal(|ui| {
            ui.label("Label set");
            egui::ComboBox::from_id_salt("scheme-select")
                .selected_text(cfg.scheme.name())
                .show_ui(ui, |ui| {
                    for scheme in LabelScheme::ALL {
                        ui.selectable_value(&mut cfg.scheme, scheme, scheme.name());
                    }
                });
        });
        let captions: Vec<String> = cfg
            .scheme
            .categories()
            .iter()
            .map(|c| LabelScheme::caption(c))
            .collect();
        ui.label(captions.join(", "));

        ui.add_space(12.0);
        let mut grid_enabled = cfg.effective_tile_size().is_some();
        ui.horizontal(|ui| {
            ui.checkbox(&mut grid_enabled, "Patch-wise SSIM grid");
            let mut tile = cfg.effective_tile_size().unwrap_or(16);
            ui.add_enabled(
                grid_enabled,
                egui::DragValue::new(&mut tile).range(4..=256).speed(1).suffix(" px"),
            );
            cfg.tile_size = grid_enabled.then_some(tile);
        });
        ui.checkbox(&mut cfg.feature_similarity, "Feature similarity (FSIM)");
        ui.horizontal(|ui| {
            ui.label("Center highlight");
            ui.add(
                egui::DragValue::new(&mut cfg.highlight_size)
                    .range(0..=256)
                    .speed(1)
                    .suffix(" px"),
            );
        });

        ui.add_space(12.0);
        ui.separator();
        ui.add_space(6.0);
        ui.checkbox(&mut cfg.skip_labeled, "Skip files already in the label log");
        ui.checkbox(&mut cfg.record_score, "Write SSIM score column");
        ui.horizontal(|ui| {
            ui.label("Label log file");
            ui.text_edit_singleline(&mut cfg.log_file_name);
        });
        ui.horizontal(|ui| {
            ui.label("Ground-truth marker");
            ui.add(egui::TextEdit::singleline(&mut cfg.gt_marker).desired_width(60.0));
            ui.label("Prediction marker");
            ui.add(egui::TextEdit::singleline(&mut cfg.pred_marker).desired_width(60.0));
        });

        ui.add_space(16.0);
        if let Some(path) = &self.config_path {
            ui.label(format!("Saved to {}", path.display()));
        }
        ui.label(format!("Version {}", env!("LABELER_VERSION")));
        ui.button("Apply").clicked()
    }
}

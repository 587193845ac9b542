mod app;

use app::UiApp;
use eframe::NativeOptions;
use labeler_core::LabelerConfig;

fn main() {
    tracing_subscriber::fmt::init();

    let config_path = app::config_path();
    let config = match config_path.as_deref().map(|p| LabelerConfig::load(p)) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            tracing::warn!("Config ignored: {e}");
            LabelerConfig::default()
        }
        None => LabelerConfig::default(),
    };

    let options = NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([900.0, 760.0]),
        ..Default::default()
    };
    if let Err(e) = eframe::run_native(
        "Hallucination Labeler",
        options,
        Box::new(move |cc| {
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(Box::new(UiApp::new(
                cc.egui_ctx.clone(),
                config,
                config_path,
            )))
        }),
    ) {
        eprintln!("Application stopped with error: {e}");
    }
}

//! Turns controller output into egui textures.

use eframe::egui;
use labeler_core::render::{grid_heatmap, to_gray, to_heatmap};
use labeler_core::{Presenter, SampleView, Scores};

/// Textures and scores for the sample on screen.
pub(super) struct ShownSample {
    pub filename: String,
    pub predicted_filename: String,
    pub index: usize,
    pub total: usize,
    /// `(height, width)` of the source arrays.
    pub dims: (usize, usize),
    pub scores: Scores,
    pub ground_truth: egui::TextureHandle,
    pub predicted: egui::TextureHandle,
    pub difference: egui::TextureHandle,
    pub tile_grid: Option<egui::TextureHandle>,
    pub worst_tile: Option<f64>,
}

pub(super) struct GuiPresenter {
    ctx: egui::Context,
    pub shown: Option<ShownSample>,
    pub completed: Option<usize>,
}

impl GuiPresenter {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            shown: None,
            completed: None,
        }
    }

    pub fn clear(&mut self) {
        self.shown = None;
        self.completed = None;
    }

    fn load(&self, name: &str, image: egui::ColorImage) -> egui::TextureHandle {
        self.ctx
            .load_texture(name, image, egui::TextureOptions::NEAREST)
    }
}

impl Presenter for GuiPresenter {
    fn present(&mut self, view: &SampleView<'_>) {
        let dims = view.ground_truth.dim();
        let (h, w) = dims;
        let ground_truth = self.load("gt", gray_image(&to_gray(view.ground_truth)));
        let predicted = self.load("pred", gray_image(&to_gray(view.predicted)));
        let difference = self.load("diff", rgb_image(&to_heatmap(view.difference, 0.0, 1.0)));
        let tile_grid = match (view.tile_grid, view.tile_size) {
            (Some(grid), Some(tile)) => {
                Some(self.load("grid", rgb_image(&grid_heatmap(grid, tile, w, h))))
            }
            _ => None,
        };
        let worst_tile = view
            .tile_grid
            .and_then(|g| g.iter().copied().reduce(f64::min));

        self.completed = None;
        self.shown = Some(ShownSample {
            filename: view.filename.to_string(),
            predicted_filename: view.predicted_filename.to_string(),
            index: view.index,
            total: view.total,
            dims,
            scores: view.scores,
            ground_truth,
            predicted,
            difference,
            tile_grid,
            worst_tile,
        });
    }

    fn session_complete(&mut self, total: usize) {
        self.shown = None;
        self.completed = Some(total);
    }
}

fn gray_image(img: &image::GrayImage) -> egui::ColorImage {
    let (w, h) = img.dimensions();
    egui::ColorImage::from_gray([w as usize, h as usize], img.as_raw())
}

fn rgb_image(img: &image::RgbImage) -> egui::ColorImage {
    let (w, h) = img.dimensions();
    egui::ColorImage::from_rgb([w as usize, h as usize], img.as_raw())
}

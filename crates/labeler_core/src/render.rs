//! Turn normalized arrays and score grids into displayable image buffers.

use image::{GrayImage, Luma, Rgb, RgbImage, imageops};
use ndarray::Array2;

/// Grayscale rendering of an array with values in `[0, 1]`.
pub fn to_gray(array: &Array2<f64>) -> GrayImage {
    let (h, w) = array.dim();
    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let v = array[[y as usize, x as usize]];
        Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

/// Heatmap rendering: `lo` maps to blue, `hi` to red, through white.
pub fn to_heatmap(array: &Array2<f64>, lo: f64, hi: f64) -> RgbImage {
    let (h, w) = array.dim();
    let span = if hi > lo { hi - lo } else { 1.0 };
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let v = array[[y as usize, x as usize]];
        let t = if v.is_finite() {
            ((v - lo) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        heat(t)
    })
}

fn heat(t: f64) -> Rgb<u8> {
    let to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    if t < 0.5 {
        let k = t * 2.0;
        Rgb([to_u8(k), to_u8(k), 255])
    } else {
        let k = (1.0 - t) * 2.0;
        Rgb([255, to_u8(k), to_u8(k)])
    }
}

/// Render a tile score grid at the resolution of the source image.
///
/// SSIM lives in `[-1, 1]`; low scores come out blue, high scores red.
pub fn grid_heatmap(grid: &Array2<f64>, tile: usize, width: usize, height: usize) -> RgbImage {
    let small = to_heatmap(grid, -1.0, 1.0);
    let (gw, gh) = small.dimensions();
    let full = imageops::resize(
        &small,
        gw * tile as u32,
        gh * tile as u32,
        imageops::FilterType::Nearest,
    );
    let w = (width as u32).min(full.width());
    let h = (height as u32).min(full.height());
    imageops::crop_imm(&full, 0, 0, w, h).to_image()
}

/// Pixel rectangle `(x, y, side)` of the square highlighted at the image center,
/// shrunk to fit small images.
pub fn center_box(height: usize, width: usize, size: usize) -> (usize, usize, usize) {
    let side = size.min(height).min(width);
    ((width - side) / 2, (height - side) / 2, side)
}

//! Similarity scores, difference images and patch-wise score grids.

use crate::error::{LabelError, Result};
use ndarray::{Array2, ArrayView2, Zip, s};
use rayon::prelude::*;

const SSIM_WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
/// FSIM gradient constant, defined on a 0..255 intensity scale.
const GRADIENT_T: f64 = 160.0;

/// A similarity metric over two equal-shaped images with values in `[0, 1]`.
pub trait SimilarityScorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<f64>;
}

/// Mean structural similarity with a uniform window and sample covariance.
///
/// Only windows that fit entirely inside the image contribute to the mean.
/// Inputs smaller than the window use the largest odd window that fits.
#[derive(Debug, Clone, Copy)]
pub struct Ssim {
    pub window: usize,
    pub data_range: f64,
}

impl Default for Ssim {
    fn default() -> Self {
        Self {
            window: SSIM_WINDOW,
            data_range: 1.0,
        }
    }
}

impl SimilarityScorer for Ssim {
    fn name(&self) -> &'static str {
        "SSIM"
    }

    fn score(&self, a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<f64> {
        ensure_same_shape(a, b)?;
        let (h, w) = a.dim();
        let mut win = self.window.min(h).min(w).max(1);
        if win % 2 == 0 {
            win -= 1;
        }

        let sa = SummedArea::new(a, b, |x, _| x);
        let sb = SummedArea::new(a, b, |_, y| y);
        let saa = SummedArea::new(a, b, |x, _| x * x);
        let sbb = SummedArea::new(a, b, |_, y| y * y);
        let sab = SummedArea::new(a, b, |x, y| x * y);

        let np = (win * win) as f64;
        let cov_norm = if win > 1 { np / (np - 1.0) } else { 1.0 };
        let c1 = (K1 * self.data_range).powi(2);
        let c2 = (K2 * self.data_range).powi(2);

        let mut total = 0.0;
        let mut count = 0usize;
        for r in 0..=(h - win) {
            for c in 0..=(w - win) {
                let ux = sa.window_sum(r, c, win) / np;
                let uy = sb.window_sum(r, c, win) / np;
                let uxx = saa.window_sum(r, c, win) / np;
                let uyy = sbb.window_sum(r, c, win) / np;
                let uxy = sab.window_sum(r, c, win) / np;
                let vx = cov_norm * (uxx - ux * ux);
                let vy = cov_norm * (uyy - uy * uy);
                let vxy = cov_norm * (uxy - ux * uy);
                let num = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
                let den = (ux * ux + uy * uy + c1) * (vx + vy + c2);
                total += num / den;
                count += 1;
            }
        }
        Ok(total / count as f64)
    }
}

/// Feature similarity driven by gradient magnitude.
///
/// Per-pixel similarity follows FSIM's gradient term; pooling weights each
/// pixel by the larger of the two gradient magnitudes. Two flat images score 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureSimilarity;

impl SimilarityScorer for FeatureSimilarity {
    fn name(&self) -> &'static str {
        "FSIM"
    }

    fn score(&self, a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<f64> {
        ensure_same_shape(a, b)?;
        let ga = gradient_magnitude(a);
        let gb = gradient_magnitude(b);

        let mut weighted = 0.0;
        let mut weights = 0.0;
        Zip::from(&ga).and(&gb).for_each(|&g1, &g2| {
            let sim = (2.0 * g1 * g2 + GRADIENT_T) / (g1 * g1 + g2 * g2 + GRADIENT_T);
            let w = g1.max(g2);
            weighted += sim * w;
            weights += w;
        });
        if weights <= f64::EPSILON {
            return Ok(1.0);
        }
        Ok((weighted / weights).clamp(0.0, 1.0))
    }
}

/// Scharr gradient magnitude on a 0..255 scale with replicated borders.
fn gradient_magnitude(img: ArrayView2<'_, f64>) -> Array2<f64> {
    let (h, w) = img.dim();
    let at = |r: isize, c: isize| {
        let r = r.clamp(0, h as isize - 1) as usize;
        let c = c.clamp(0, w as isize - 1) as usize;
        img[[r, c]] * 255.0
    };
    Array2::from_shape_fn((h, w), |(r, c)| {
        let (r, c) = (r as isize, c as isize);
        let gx = (3.0 * (at(r - 1, c - 1) - at(r - 1, c + 1))
            + 10.0 * (at(r, c - 1) - at(r, c + 1))
            + 3.0 * (at(r + 1, c - 1) - at(r + 1, c + 1)))
            / 16.0;
        let gy = (3.0 * (at(r - 1, c - 1) - at(r + 1, c - 1))
            + 10.0 * (at(r - 1, c) - at(r + 1, c))
            + 3.0 * (at(r - 1, c + 1) - at(r + 1, c + 1)))
            / 16.0;
        (gx * gx + gy * gy).sqrt()
    })
}

/// Summed-area table for O(1) window sums.
struct SummedArea {
    table: Array2<f64>,
}

impl SummedArea {
    /// Table of `f(a, b)` evaluated per pixel.
    fn new(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>, f: impl Fn(f64, f64) -> f64) -> Self {
        let (h, w) = a.dim();
        let mut table = Array2::<f64>::zeros((h + 1, w + 1));
        for r in 0..h {
            let mut row_sum = 0.0;
            for c in 0..w {
                row_sum += f(a[[r, c]], b[[r, c]]);
                table[[r + 1, c + 1]] = table[[r, c + 1]] + row_sum;
            }
        }
        Self { table }
    }

    fn window_sum(&self, r: usize, c: usize, win: usize) -> f64 {
        let t = &self.table;
        t[[r + win, c + win]] - t[[r, c + win]] - t[[r + win, c]] + t[[r, c]]
    }
}

fn ensure_same_shape(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<()> {
    // Empty inputs have no window to score.
    if a.dim() != b.dim() || a.is_empty() {
        return Err(LabelError::ShapeMismatch {
            gt: a.shape().to_vec(),
            pred: b.shape().to_vec(),
        });
    }
    Ok(())
}

/// Element-wise absolute difference.
pub fn difference(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    ensure_same_shape(a.view(), b.view())?;
    Ok(Zip::from(a).and(b).map_collect(|&x, &y| (x - y).abs()))
}

/// Score non-overlapping `tile`×`tile` patches. Trailing tiles are truncated
/// to whatever remains, so the grid is `ceil(h/tile)` × `ceil(w/tile)`.
pub fn tile_grid(
    a: &Array2<f64>,
    b: &Array2<f64>,
    tile: usize,
    scorer: &dyn SimilarityScorer,
) -> Result<Array2<f64>> {
    ensure_same_shape(a.view(), b.view())?;
    let tile = tile.max(1);
    let (h, w) = a.dim();
    let rows = h.div_ceil(tile);
    let cols = w.div_ceil(tile);

    let scores = (0..rows * cols)
        .into_par_iter()
        .map(|idx| {
            let (r0, c0) = ((idx / cols) * tile, (idx % cols) * tile);
            let (r1, c1) = ((r0 + tile).min(h), (c0 + tile).min(w));
            scorer.score(a.slice(s![r0..r1, c0..c1]), b.slice(s![r0..r1, c0..c1]))
        })
        .collect::<Result<Vec<f64>>>()?;

    let mut grid = Array2::zeros((rows, cols));
    for (slot, score) in grid.iter_mut().zip(scores) {
        *slot = score;
    }
    Ok(grid)
}

/// Which optional metrics `compare_pair` computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompareOptions {
    pub tile_size: Option<usize>,
    pub feature_similarity: bool,
}

/// Whole-image scores for one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub ssim: f64,
    pub fsim: Option<f64>,
}

/// Everything computed for a normalized pair, ready for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub difference: Array2<f64>,
    pub scores: Scores,
    pub tile_grid: Option<Array2<f64>>,
}

/// Compute scores, difference image and optional tile grid for a normalized pair.
pub fn compare_pair(
    gt: &Array2<f64>,
    pred: &Array2<f64>,
    opts: CompareOptions,
) -> Result<Comparison> {
    let ssim = Ssim::default();
    let difference = difference(gt, pred)?;
    let whole = ssim.score(gt.view(), pred.view())?;
    let fsim = if opts.feature_similarity {
        Some(FeatureSimilarity.score(gt.view(), pred.view())?)
    } else {
        None
    };
    let grid = match opts.tile_size.filter(|&t| t > 0) {
        Some(tile) => Some(tile_grid(gt, pred, tile, &ssim)?),
        None => None,
    };
    tracing::debug!(ssim = whole, fsim = ?fsim, "pair scored");
    Ok(Comparison {
        difference,
        scores: Scores { ssim: whole, fsim },
        tile_grid: grid,
    })
}

//! Correlation-coefficient template matching.
//!
//! Scores are the mean-removed normalized cross-correlation of the template
//! against every placement inside the image, in `[-1, 1]`. Removing the mean
//! makes flat windows score zero instead of near one, which is what lets the
//! fixed thresholds separate a match from background.
//!
//! The raw cross term comes from `imageproc` (parallel over rows); window
//! means and energies come from its integral images, so each placement costs
//! O(1) extra.
//!
//! Full-resolution frames make the exhaustive search too slow for large
//! templates, so those go coarse to fine: image and template are box-averaged
//! by a factor `k`, the coarse search runs once per sampling phase (every
//! full-resolution placement lands on exactly one phase's grid), and the best
//! coarse placements are rescored exactly at full resolution. Total work
//! drops by about `k²`.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::definitions::Image;
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{match_template_parallel, MatchTemplateMethod};
use tapjump_core::Position;

/// Coarse templates keep at least this many pixels on their short side.
const MIN_COARSE_SIDE: u32 = 6;
const MAX_COARSE_FACTOR: u32 = 16;
/// Placements per sampling phase rescored at full resolution.
const CANDIDATES_PER_PHASE: usize = 2;

/// Best placement of a template.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateMatch {
    /// Top-left corner of the template in image coordinates.
    pub position: Position,
    pub score: f32,
}

/// Integral images of intensity and squared intensity.
struct WindowSums {
    sum: Image<Luma<u64>>,
    sq: Image<Luma<u64>>,
}

impl WindowSums {
    fn new(image: &GrayImage) -> Self {
        Self {
            sum: integral_image::<_, u64>(image),
            sq: integral_squared_image::<_, u64>(image),
        }
    }

    /// Sum and squared sum of the `w x h` window at `(x, y)`.
    #[inline]
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        (
            rect_sum(&self.sum, x, y, w, h) as f64,
            rect_sum(&self.sq, x, y, w, h) as f64,
        )
    }

    /// Box-average `k x k` blocks starting at `(x0, y0)` into a `w x h` image.
    fn downsample(&self, x0: u32, y0: u32, k: u32, w: u32, h: u32) -> GrayImage {
        let area = u64::from(k * k);
        GrayImage::from_fn(w, h, |x, y| {
            let total = rect_sum(&self.sum, x0 + x * k, y0 + y * k, k, k);
            Luma([((total + area / 2) / area) as u8])
        })
    }
}

#[inline]
fn rect_sum(integral: &Image<Luma<u64>>, x: u32, y: u32, w: u32, h: u32) -> u64 {
    let at = |x: u32, y: u32| integral.get_pixel(x, y).0[0];
    at(x + w, y + h) + at(x, y) - at(x + w, y) - at(x, y + h)
}

/// Pixel count, sum and mean-removed energy of a template.
struct TemplateStats {
    n: f64,
    sum: f64,
    energy: f64,
}

impl TemplateStats {
    /// `None` for templates without contrast.
    fn new(template: &GrayImage) -> Option<Self> {
        let n = f64::from(template.width() * template.height());
        let (sum, sq) = template.as_raw().iter().fold((0.0f64, 0.0f64), |(s, q), &v| {
            let v = f64::from(v);
            (s + v, q + v * v)
        });
        let energy = sq - sum * sum / n;
        (energy > f64::EPSILON).then_some(Self { n, sum, energy })
    }

    #[inline]
    fn score(&self, cross: f64, w_sum: f64, w_sq: f64) -> f32 {
        let w_energy = w_sq - w_sum * w_sum / self.n;
        if w_energy <= f64::EPSILON {
            return 0.0;
        }
        let numer = cross - w_sum * self.sum / self.n;
        (numer / (w_energy * self.energy).sqrt()).clamp(-1.0, 1.0) as f32
    }
}

/// `true` when the template can be placed at least once inside the image.
pub fn fits(image: &GrayImage, template: &GrayImage) -> bool {
    template.width() > 0
        && template.height() > 0
        && template.width() <= image.width()
        && template.height() <= image.height()
}

/// Downsampling factor used for a template; `1` means exhaustive search.
pub fn coarse_factor(template: &GrayImage) -> u32 {
    let ratio = template.width().min(template.height()) / MIN_COARSE_SIDE;
    if ratio < 2 {
        1
    } else {
        (1u32 << ratio.ilog2()).min(MAX_COARSE_FACTOR)
    }
}

/// Highest-scoring placement of `template` in `image`.
///
/// Small templates are searched exhaustively and ties resolve to the first
/// placement in row-major order. Large templates go coarse to fine; the
/// winner is the best rescored candidate, again first in row-major order on
/// ties. Returns `None` when the template does not fit or has no contrast.
pub fn best_match(image: &GrayImage, template: &GrayImage) -> Option<TemplateMatch> {
    if !fits(image, template) {
        return None;
    }
    let stats = TemplateStats::new(template)?;
    let k = coarse_factor(template);
    if k > 1 {
        if let Some(found) = coarse_to_fine(image, template, &stats, k) {
            return Some(found);
        }
    }
    exhaustive(image, template, &stats)
}

/// Exhaustive search over every placement, regardless of template size.
pub fn exhaustive_match(image: &GrayImage, template: &GrayImage) -> Option<TemplateMatch> {
    if !fits(image, template) {
        return None;
    }
    let stats = TemplateStats::new(template)?;
    exhaustive(image, template, &stats)
}

/// Best placement, kept only if it reaches `threshold`.
pub fn match_above(image: &GrayImage, template: &GrayImage, threshold: f32) -> Option<TemplateMatch> {
    let found = best_match(image, template);
    log::trace!(
        "template {}x{}: best {:?} (threshold {threshold})",
        template.width(),
        template.height(),
        found
    );
    found.filter(|m| m.score >= threshold)
}

fn exhaustive(image: &GrayImage, template: &GrayImage, stats: &TemplateStats) -> Option<TemplateMatch> {
    let scores = score_map(image, template, stats);
    let mut best: Option<TemplateMatch> = None;
    for (x, y, p) in scores.enumerate_pixels() {
        let score = p.0[0];
        if best.is_none_or(|b| score > b.score) {
            best = Some(TemplateMatch {
                position: Position::new(x as i32, y as i32),
                score,
            });
        }
    }
    best
}

/// Score of every placement, indexed by top-left corner.
fn score_map(image: &GrayImage, template: &GrayImage, stats: &TemplateStats) -> Image<Luma<f32>> {
    let cross = match_template_parallel(image, template, MatchTemplateMethod::CrossCorrelation);
    let windows = WindowSums::new(image);
    let (tw, th) = template.dimensions();
    ImageBuffer::from_fn(cross.width(), cross.height(), |x, y| {
        let (w_sum, w_sq) = windows.window(x, y, tw, th);
        Luma([stats.score(f64::from(cross.get_pixel(x, y).0[0]), w_sum, w_sq)])
    })
}

fn coarse_to_fine(
    image: &GrayImage,
    template: &GrayImage,
    stats: &TemplateStats,
    k: u32,
) -> Option<TemplateMatch> {
    let (tw, th) = template.dimensions();
    let coarse_template = WindowSums::new(template).downsample(0, 0, k, tw / k, th / k);
    let coarse_stats = TemplateStats::new(&coarse_template)?;
    let windows = WindowSums::new(image);
    let (last_x, last_y) = (image.width() - tw, image.height() - th);

    let mut candidates = Vec::with_capacity((k * k) as usize * CANDIDATES_PER_PHASE);
    for py in 0..k {
        for px in 0..k {
            let cw = (image.width() - px) / k;
            let ch = (image.height() - py) / k;
            if cw < coarse_template.width() || ch < coarse_template.height() {
                continue;
            }
            let coarse = windows.downsample(px, py, k, cw, ch);
            let scores = score_map(&coarse, &coarse_template, &coarse_stats);
            candidates.extend(
                top_placements(&scores, CANDIDATES_PER_PHASE)
                    .into_iter()
                    .map(|(cx, cy)| (px + cx * k, py + cy * k))
                    .filter(|&(x, y)| x <= last_x && y <= last_y),
            );
        }
    }
    candidates.sort_unstable_by_key(|&(x, y)| (y, x));
    candidates.dedup();

    let mut best: Option<TemplateMatch> = None;
    for (x, y) in candidates {
        let (w_sum, w_sq) = windows.window(x, y, tw, th);
        let score = stats.score(cross_at(image, template, x, y), w_sum, w_sq);
        if best.is_none_or(|b| score > b.score) {
            best = Some(TemplateMatch {
                position: Position::new(x as i32, y as i32),
                score,
            });
        }
    }
    log::trace!("coarse factor {k}: best {best:?}");
    best
}

/// Highest `count` placements of a score map, best first.
fn top_placements(scores: &Image<Luma<f32>>, count: usize) -> Vec<(u32, u32)> {
    let mut top: Vec<(f32, u32, u32)> = Vec::with_capacity(count + 1);
    for (x, y, p) in scores.enumerate_pixels() {
        let score = p.0[0];
        if top.len() < count || top.last().is_some_and(|&(worst, _, _)| score > worst) {
            let at = top.partition_point(|&(s, _, _)| s >= score);
            top.insert(at, (score, x, y));
            top.truncate(count);
        }
    }
    top.into_iter().map(|(_, x, y)| (x, y)).collect()
}

/// Raw cross-correlation of the template placed at `(x, y)`.
fn cross_at(image: &GrayImage, template: &GrayImage, x: u32, y: u32) -> f64 {
    let (iw, tw) = (image.width() as usize, template.width() as usize);
    let (x, y) = (x as usize, y as usize);
    let raw = image.as_raw();
    let total: u64 = template
        .as_raw()
        .chunks_exact(tw)
        .enumerate()
        .map(|(ty, trow)| {
            let start = (y + ty) * iw + x;
            raw[start..start + tw]
                .iter()
                .zip(trow)
                .map(|(&a, &b)| u64::from(a) * u64::from(b))
                .sum::<u64>()
        })
        .sum();
    total as f64
}


#[cfg(test)]
mod tests {
    use super::testutil::{noise, paste};
    use super::*;
    use image::Luma;

    #[test]
    fn finds_embedded_patch_exactly() {
        let img = noise(80, 60, 1, 0, 255);
        let tpl = image::imageops::crop_imm(&img, 31, 17, 12, 9).to_image();
        let m = best_match(&img, &tpl).expect("match");
        assert_eq!(m.position, Position::new(31, 17));
        assert!(m.score > 0.999, "score {}", m.score);
    }

    #[test]
    fn score_is_invariant_to_brightness_and_contrast() {
        let tpl = noise(10, 10, 7, 20, 120);
        let brighter = GrayImage::from_fn(10, 10, |x, y| {
            Luma([tpl.get_pixel(x, y).0[0] * 2 + 10])
        });
        let mut img = GrayImage::from_pixel(50, 40, Luma([90]));
        paste(&mut img, &brighter, 22, 13);
        let m = best_match(&img, &tpl).expect("match");
        assert_eq!(m.position, Position::new(22, 13));
        assert!(m.score > 0.999);
    }

    #[test]
    fn flat_windows_score_zero() {
        let img = GrayImage::from_pixel(30, 30, Luma([128]));
        let tpl = noise(8, 8, 3, 0, 255);
        let m = best_match(&img, &tpl).expect("placement exists");
        assert_eq!(m.score, 0.0);
        assert!(match_above(&img, &tpl, 0.7).is_none());
    }

    #[test]
    fn rejects_flat_and_oversized_templates() {
        let img = noise(20, 20, 5, 0, 255);
        let flat = GrayImage::from_pixel(4, 4, Luma([9]));
        assert!(best_match(&img, &flat).is_none());
        let big = noise(21, 5, 5, 0, 255);
        assert!(!fits(&img, &big));
        assert!(best_match(&img, &big).is_none());
    }

    #[test]
    fn coarse_factor_grows_with_template() {
        assert_eq!(coarse_factor(&GrayImage::new(10, 20)), 1);
        assert_eq!(coarse_factor(&GrayImage::new(11, 200)), 1);
        assert_eq!(coarse_factor(&GrayImage::new(76, 190)), 8);
        assert_eq!(coarse_factor(&GrayImage::new(200, 160)), 16);
        assert_eq!(coarse_factor(&GrayImage::new(40, 30)), 4);
    }

    #[test]
    fn coarse_search_finds_copy_at_any_phase() {
        // White noise decorrelates under a one-pixel shift, so only the
        // matching sampling phase can find these.
        let img = noise(240, 200, 17, 0, 255);
        for (x, y) in [(37, 51), (96, 64), (131, 9), (5, 142)] {
            let tpl = image::imageops::crop_imm(&img, x, y, 48, 40).to_image();
            assert!(coarse_factor(&tpl) > 1);
            let m = best_match(&img, &tpl).expect("match");
            assert_eq!(m.position, Position::new(x as i32, y as i32));
            assert!(m.score > 0.999, "score {}", m.score);
        }
    }

    #[test]
    fn coarse_search_agrees_with_exhaustive_on_smooth_scene() {
        let mut img = GrayImage::from_fn(160, 120, |x, y| Luma([((x * 3 + y * 2) % 200) as u8]));
        let blob = noise(30, 24, 4, 60, 190);
        paste(&mut img, &blob, 71, 45);
        let tpl = GrayImage::from_fn(30, 24, |x, y| {
            Luma([blob.get_pixel(x, y).0[0] / 2 + 40])
        });

        let coarse = best_match(&img, &tpl).expect("coarse");
        let full = exhaustive_match(&img, &tpl).expect("exhaustive");
        assert_eq!(coarse.position, full.position);
        assert_eq!(coarse.position, Position::new(71, 45));
        assert!((coarse.score - full.score).abs() < 1e-4);
    }

    #[test]
    fn unrelated_texture_stays_below_threshold() {
        let img = noise(64, 64, 11, 0, 255);
        let tpl = noise(16, 16, 12, 0, 255);
        assert!(match_above(&img, &tpl, 0.7).is_none());
    }
}

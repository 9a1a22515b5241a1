use std::path::Path;

use image::imageops::FilterType;
use image::GrayImage;

use crate::config::ScaleRange;
use crate::error::{Error, Result};
use crate::types::Rect;

/// Reference pattern as loaded from disk, kept at native scale.
#[derive(Debug, Clone)]
pub struct Template {
    image: GrayImage,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| {
            Error::Resource(format!("template not found: {}: {}", path.display(), e))
        })?;
        Ok(Template { image: img.to_luma8() })
    }

    pub fn from_gray(image: GrayImage) -> Self {
        Template { image }
    }

    /// Precompute the search variants: the native template plus, when a
    /// scale range is given, evenly spaced resized copies.
    pub fn variants(&self, scales: Option<ScaleRange>) -> Vec<ScaledTemplate> {
        match scales {
            None => vec![ScaledTemplate::new(&self.image, 1.0)],
            Some(range) => {
                let steps = range.steps.max(1);
                (0..steps)
                    .map(|i| {
                        let t = if steps == 1 {
                            0.0
                        } else {
                            i as f32 / (steps - 1) as f32
                        };
                        let scale = range.min + t * (range.max - range.min);
                        let w = ((self.image.width() as f32 * scale).round() as u32).max(1);
                        let h = ((self.image.height() as f32 * scale).round() as u32).max(1);
                        let resized =
                            image::imageops::resize(&self.image, w, h, FilterType::Triangle);
                        ScaledTemplate::new(&resized, scale)
                    })
                    .collect()
            }
        }
    }
}

/// One search variant with its zero-mean statistics precomputed.
#[derive(Debug, Clone)]
pub struct ScaledTemplate {
    gray: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    mean: f32,
    norm: f32,
}

impl ScaledTemplate {
    fn new(img: &GrayImage, scale: f32) -> Self {
        let gray: Vec<f32> = img.pixels().map(|p| p.0[0] as f32).collect();
        let n = gray.len() as f32;
        let mean = gray.iter().sum::<f32>() / n;
        let norm = gray.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>().sqrt();
        ScaledTemplate { gray, width: img.width(), height: img.height(), scale, mean, norm }
    }
}

/// Best normalized cross-correlation of `tmpl` over a grayscale frame.
/// Scores are in [-1, 1], 1.0 for an exact match. Returns `None` when the
/// template does not fit inside the frame.
pub fn best_match(frame: &[f32], fw: u32, fh: u32, tmpl: &ScaledTemplate) -> Option<(f32, Rect)> {
    let (tw, th) = (tmpl.width as usize, tmpl.height as usize);
    let (fw, fh) = (fw as usize, fh as usize);
    if tw > fw || th > fh || tw == 0 || th == 0 {
        return None;
    }

    // Integral images for patch sums and sums of squares, so per-position
    // means come out in O(1).
    let (sum, sq) = integrals(frame, fw, fh);
    let n = (tw * th) as f64;

    let mut best_score = f32::MIN;
    let mut best = (0usize, 0usize);

    for y in 0..=(fh - th) {
        for x in 0..=(fw - tw) {
            let psum = rect_sum(&sum, fw, x, y, tw, th);
            let psq = rect_sum(&sq, fw, x, y, tw, th);
            let pmean = psum / n;

            let mut cross = 0.0f64;
            for ty in 0..th {
                let frow = (y + ty) * fw + x;
                let trow = ty * tw;
                for tx in 0..tw {
                    cross += frame[frow + tx] as f64 * tmpl.gray[trow + tx] as f64;
                }
            }

            let num = cross - n * pmean * tmpl.mean as f64;
            let pvar = (psq - n * pmean * pmean).max(0.0);
            let den = pvar.sqrt() * tmpl.norm as f64;
            let score = if den > f64::EPSILON { (num / den) as f32 } else { 0.0 };

            if score > best_score {
                best_score = score;
                best = (x, y);
            }
        }
    }

    Some((
        best_score.clamp(-1.0, 1.0),
        Rect {
            x: best.0 as i32,
            y: best.1 as i32,
            w: tmpl.width,
            h: tmpl.height,
        },
    ))
}

fn integrals(frame: &[f32], fw: usize, fh: usize) -> (Vec<f64>, Vec<f64>) {
    let stride = fw + 1;
    let mut sum = vec![0.0f64; stride * (fh + 1)];
    let mut sq = vec![0.0f64; stride * (fh + 1)];
    for y in 0..fh {
        let mut row_sum = 0.0f64;
        let mut row_sq = 0.0f64;
        for x in 0..fw {
            let v = frame[y * fw + x] as f64;
            row_sum += v;
            row_sq += v * v;
            sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
            sq[(y + 1) * stride + x + 1] = sq[y * stride + x + 1] + row_sq;
        }
    }
    (sum, sq)
}

fn rect_sum(table: &[f64], fw: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
    let stride = fw + 1;
    table[(y + h) * stride + x + w] + table[y * stride + x]
        - table[y * stride + x + w]
        - table[(y + h) * stride + x]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32, offset: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            image::Luma([if (x + y + offset) % 2 == 0 { 230 } else { 20 }])
        })
    }

    #[test]
    fn exact_match_scores_one_at_origin() {
        let img = checker(8, 8, 0);
        let tmpl = Template::from_gray(img.clone());
        let variant = &tmpl.variants(None)[0];
        let frame: Vec<f32> = img.pixels().map(|p| p.0[0] as f32).collect();
        let (score, rect) = best_match(&frame, 8, 8, variant).unwrap();
        assert!(score > 0.999, "score {}", score);
        assert_eq!((rect.x, rect.y), (0, 0));
    }

    #[test]
    fn finds_embedded_template() {
        // Template pasted into a flat frame at (5, 3).
        let tmpl_img = checker(4, 4, 1);
        let mut frame_img = GrayImage::from_pixel(16, 12, image::Luma([128]));
        image::imageops::overlay(&mut frame_img, &tmpl_img, 5, 3);
        let frame: Vec<f32> = frame_img.pixels().map(|p| p.0[0] as f32).collect();

        let tmpl = Template::from_gray(tmpl_img);
        let (score, rect) = best_match(&frame, 16, 12, &tmpl.variants(None)[0]).unwrap();
        assert!(score > 0.999, "score {}", score);
        assert_eq!((rect.x, rect.y, rect.w, rect.h), (5, 3, 4, 4));
    }

    #[test]
    fn flat_frame_scores_zero() {
        let tmpl = Template::from_gray(checker(4, 4, 0));
        let frame = vec![128.0f32; 16 * 16];
        let (score, _) = best_match(&frame, 16, 16, &tmpl.variants(None)[0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn oversized_template_is_none() {
        let tmpl = Template::from_gray(checker(10, 10, 0));
        let frame = vec![0.0f32; 4 * 4];
        assert!(best_match(&frame, 4, 4, &tmpl.variants(None)[0]).is_none());
    }

    #[test]
    fn multiscale_produces_requested_variants() {
        let tmpl = Template::from_gray(checker(10, 10, 0));
        let variants = tmpl.variants(Some(ScaleRange { min: 0.5, max: 1.5, steps: 3 }));
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].width, 5);
        assert_eq!(variants[1].width, 10);
        assert_eq!(variants[2].width, 15);
    }
}

use std::path::Path;

use chrono::Local;

use crate::config::{ConditionSpec, DiagnosticsSpec, SaveOn};
use crate::error::Result;
use crate::logger;
use crate::matcher::{best_match, ScaledTemplate, Template};
use crate::platform::Screen;
use crate::types::{MatchResult, Rect, Region};

/// A visual predicate over a screen region. Implementations must sample
/// fresh on every call; the scene is assumed to change between polls.
pub trait Condition {
    fn evaluate(&mut self) -> Result<MatchResult>;
}

/// Template matching against a live capture. The reference pattern (and
/// its scaled variants) is loaded once at construction; a missing pattern
/// is a fatal resource error, raised before the first poll.
pub struct TemplateOracle {
    screen: Box<dyn Screen>,
    variants: Vec<ScaledTemplate>,
    confidence: f32,
    region: Option<Region>,
    monitor: usize,
}

impl TemplateOracle {
    pub fn new(
        screen: Box<dyn Screen>,
        template: &Template,
        spec: &ConditionSpec,
        region: Option<Region>,
        monitor: usize,
    ) -> Self {
        TemplateOracle {
            screen,
            variants: template.variants(spec.multiscale),
            confidence: spec.confidence,
            region,
            monitor,
        }
    }
}

impl Condition for TemplateOracle {
    fn evaluate(&mut self) -> Result<MatchResult> {
        let frame = self.screen.capture(self.monitor, self.region)?;
        let gray = frame.to_gray();

        let mut score = f32::MIN;
        let mut rect = Rect { x: 0, y: 0, w: 0, h: 0 };
        for variant in &self.variants {
            if let Some((s, r)) = best_match(&gray, frame.width, frame.height, variant) {
                if s > score {
                    score = s;
                    rect = r;
                }
            }
        }
        if score == f32::MIN {
            score = 0.0;
        }

        // Report the rect in absolute screen coordinates so the dispatcher
        // can click its center without knowing the capture region.
        if let Some(region) = self.region {
            rect.x += region.left;
            rect.y += region.top;
        }

        Ok(MatchResult {
            met: score >= self.confidence,
            score,
            rect,
            frame,
            captured_region: self.region,
        })
    }
}

/// Persist a poll frame for offline inspection, when the step asked for it.
pub fn save_diagnostic(diag: &DiagnosticsSpec, kind: SaveOn, result: &MatchResult) {
    if !diag.save_on.contains(&kind) {
        return;
    }
    if let Err(e) = write_frame(&diag.out_dir, kind, result) {
        logger::warn(&format!("diagnostic save failed: {}", e));
    }
}

fn write_frame(dir: &Path, kind: SaveOn, result: &MatchResult) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let tag = match kind {
        SaveOn::Hit => "hit",
        SaveOn::Miss => "miss",
        SaveOn::Timeout => "timeout",
    };
    let name = format!(
        "{}_{}_s{:.2}.png",
        tag,
        Local::now().format("%Y%m%d-%H%M%S%.3f"),
        result.score
    );
    let path = dir.join(name);
    let frame = &result.frame;
    image::save_buffer(
        &path,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
    )
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    logger::info(&format!("saved {} frame: {}", tag, path.display()));
    Ok(())
}

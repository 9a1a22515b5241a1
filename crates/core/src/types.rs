use serde::Deserialize;

/// Rectangular screen region to capture, in absolute screen coordinates.
/// `None` in the places that take `Option<Region>` means the full display.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "RegionRepr")]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Accept both `{left, top, width, height}` and `[left, top, width, height]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegionRepr {
    Fields {
        left: i32,
        top: i32,
        width: u32,
        height: u32,
    },
    Tuple(i32, i32, u32, u32),
}

impl From<RegionRepr> for Region {
    fn from(r: RegionRepr) -> Self {
        match r {
            RegionRepr::Fields { left, top, width, height } => {
                Region { left, top, width, height }
            }
            RegionRepr::Tuple(left, top, width, height) => {
                Region { left, top, width, height }
            }
        }
    }
}

/// Axis-aligned match rectangle, in absolute screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.w as f64 / 2.0,
            self.y as f64 + self.h as f64 / 2.0,
        )
    }
}

/// Raw captured pixels, tightly packed RGBA8 rows.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        Frame { width, height, data }
    }

    /// Luma plane as f32, for correlation against grayscale templates.
    pub fn to_gray(&self) -> Vec<f32> {
        self.data
            .chunks_exact(4)
            .map(|px| 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
            .collect()
    }
}

/// One oracle evaluation. Produced fresh on every poll; the best candidate
/// rectangle and its score are always filled in, even when `met` is false.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub met: bool,
    pub score: f32,
    pub rect: Rect,
    pub frame: Frame,
    pub captured_region: Option<Region>,
}

/// Per-step pacing window in seconds, taken from the owning phase.
#[derive(Debug, Clone, Copy)]
pub struct PaceWindow {
    pub min_sec: f64,
    pub max_sec: f64,
}

use std::time::Duration;

use super::{Platform, Pointer, Screen};
use crate::error::Result;
use crate::logger;
use crate::types::{Frame, Region};

/// Backend that never touches the real display: captures come back as a
/// flat mid-gray frame (so no template ever matches) and pointer activity
/// is only logged.
pub struct StubPlatform;

impl Platform for StubPlatform {
    fn screen(&self) -> Box<dyn Screen> {
        Box::new(StubScreen)
    }

    fn pointer(&self) -> Box<dyn Pointer> {
        Box::new(StubPointer)
    }
}

struct StubScreen;

const STUB_WIDTH: u32 = 1920;
const STUB_HEIGHT: u32 = 1080;

impl Screen for StubScreen {
    fn capture(&mut self, monitor: usize, region: Option<Region>) -> Result<Frame> {
        let (w, h) = match region {
            Some(r) => (r.width.max(1), r.height.max(1)),
            None => (STUB_WIDTH, STUB_HEIGHT),
        };
        logger::info_p(
            "stub",
            &format!("capture(monitor={}, region={:?}) -> {}x{}", monitor, region, w, h),
        );
        Ok(Frame::from_rgba(w, h, vec![128; (w * h * 4) as usize]))
    }
}

struct StubPointer;

impl Pointer for StubPointer {
    fn move_to(&mut self, x: f64, y: f64, duration: Duration) {
        logger::info_p(
            "stub",
            &format!("move_to({:.1}, {:.1}) over {:?}", x, y, duration),
        );
    }

    fn click(&mut self) {
        logger::info_p("stub", "click()");
    }
}

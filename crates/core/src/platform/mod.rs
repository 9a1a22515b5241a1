pub mod hotkey;
pub mod stub;

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::logger;
use crate::types::{Frame, Region};

/// Source of still images of the display. Every call captures fresh.
pub trait Screen: Send {
    fn capture(&mut self, monitor: usize, region: Option<Region>) -> Result<Frame>;
}

/// Injected pointer. `move_to` is expected to take roughly `duration`
/// of wall-clock time so motion does not look machine-generated.
pub trait Pointer: Send {
    fn move_to(&mut self, x: f64, y: f64, duration: Duration);
    fn click(&mut self);
}

/// Factory for capture and input handles. One platform per process; each
/// run worker gets its own handles.
pub trait Platform: Send + Sync {
    fn screen(&self) -> Box<dyn Screen>;
    fn pointer(&self) -> Box<dyn Pointer>;
}

/// Create the platform for the current environment. OS capture/input
/// backends plug in behind `Screen`/`Pointer`; until one is wired up the
/// stub serves synthetic frames and logs pointer activity, which is enough
/// for dry runs and tests.
pub fn create_platform() -> Arc<dyn Platform> {
    logger::register_prefix("stub", logger::COLOR_GRAY);
    Arc::new(stub::StubPlatform)
}

use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::config::ActionSpec;
use crate::logger;
use crate::platform::Pointer;
use crate::sleep::sleep_range;
use crate::types::MatchResult;

// Motion envelopes: a plain click moves briskly, an approach click takes a
// longer and more variable path.
const CLICK_BASE_SEC: f64 = 0.28;
const CLICK_WIGGLE_SEC: f64 = 0.18;
const APPROACH_BASE_SEC: f64 = 0.35;
const APPROACH_WIGGLE_SEC: f64 = 0.25;
const MIN_MOVE_SEC: f64 = 0.05;

// Settle delay after any pointer action, applied even under dry_run, so
// consecutive actions never fire at machine speed.
const SETTLE_MIN_SEC: f64 = 0.08;
const SETTLE_MAX_SEC: f64 = 0.22;

/// Interprets one declarative action against a match result. Stateless:
/// never re-evaluates the condition, never retries.
pub struct Dispatcher {
    pointer: Box<dyn Pointer>,
}

impl Dispatcher {
    pub fn new(pointer: Box<dyn Pointer>) -> Self {
        Dispatcher { pointer }
    }

    pub fn perform(&mut self, action: &ActionSpec, hit: &MatchResult, dry_run: bool) {
        match action {
            ActionSpec::Click => self.pointed_click(hit, dry_run, CLICK_BASE_SEC, CLICK_WIGGLE_SEC),
            ActionSpec::ApproachClick => {
                self.pointed_click(hit, dry_run, APPROACH_BASE_SEC, APPROACH_WIGGLE_SEC)
            }
            ActionSpec::Sleep { seconds } => {
                thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
            }
            ActionSpec::NoOp => {}
        }
    }

    fn pointed_click(&mut self, hit: &MatchResult, dry_run: bool, base: f64, wiggle: f64) {
        let (cx, cy) = hit.rect.center();
        let mut rng = rand::thread_rng();
        // Small jitter so repeated clicks never land on the exact
        // same coordinates.
        let x = cx + rng.gen_range(-2.0..2.0);
        let y = cy + rng.gen_range(-2.0..2.0);
        let duration = (base + rng.gen_range(-wiggle..wiggle)).max(MIN_MOVE_SEC);

        if dry_run {
            logger::info(&format!("  dry-run: would click ({:.0}, {:.0})", x, y));
        } else {
            self.pointer.move_to(x, y, Duration::from_secs_f64(duration));
            self.pointer.click();
        }
        sleep_range(SETTLE_MIN_SEC, SETTLE_MAX_SEC);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Frame, Rect};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        moves: Arc<Mutex<Vec<(f64, f64)>>>,
        clicks: Arc<Mutex<u32>>,
    }

    impl Pointer for Recorder {
        fn move_to(&mut self, x: f64, y: f64, _duration: Duration) {
            self.moves.lock().unwrap().push((x, y));
        }
        fn click(&mut self) {
            *self.clicks.lock().unwrap() += 1;
        }
    }

    fn hit_at(x: i32, y: i32, w: u32, h: u32) -> MatchResult {
        MatchResult {
            met: true,
            score: 0.95,
            rect: Rect { x, y, w, h },
            frame: Frame::from_rgba(1, 1, vec![0; 4]),
            captured_region: None,
        }
    }

    #[test]
    fn click_lands_near_rect_center() {
        let rec = Recorder::default();
        let moves = rec.moves.clone();
        let clicks = rec.clicks.clone();
        let mut d = Dispatcher::new(Box::new(rec));
        d.perform(&ActionSpec::Click, &hit_at(100, 50, 20, 10), false);

        let m = moves.lock().unwrap();
        assert_eq!(m.len(), 1);
        let (x, y) = m[0];
        assert!((x - 110.0).abs() <= 2.0, "x={}", x);
        assert!((y - 55.0).abs() <= 2.0, "y={}", y);
        assert_eq!(*clicks.lock().unwrap(), 1);
    }

    #[test]
    fn dry_run_skips_injection_but_still_settles() {
        let rec = Recorder::default();
        let moves = rec.moves.clone();
        let clicks = rec.clicks.clone();
        let mut d = Dispatcher::new(Box::new(rec));
        let start = Instant::now();
        d.perform(&ActionSpec::ApproachClick, &hit_at(0, 0, 4, 4), true);

        assert!(moves.lock().unwrap().is_empty());
        assert_eq!(*clicks.lock().unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn sleep_blocks_for_requested_time() {
        let mut d = Dispatcher::new(Box::new(Recorder::default()));
        let start = Instant::now();
        d.perform(&ActionSpec::Sleep { seconds: 0.1 }, &hit_at(0, 0, 1, 1), false);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn noop_returns_immediately() {
        let mut d = Dispatcher::new(Box::new(Recorder::default()));
        let start = Instant::now();
        d.perform(&ActionSpec::NoOp, &hit_at(0, 0, 1, 1), false);
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::action::Dispatcher;
use crate::config::{SaveOn, StepBlock, StepConfig, StepOverlay};
use crate::error::Result;
use crate::logger;
use crate::matcher::Template;
use crate::oracle::{save_diagnostic, Condition, TemplateOracle};
use crate::platform::Platform;
use crate::sleep::{sleep_cancellable, CancelToken};
use crate::types::{MatchResult, PaceWindow};

/// Result of one step invocation. A step either fully matches and acts,
/// times out, or is cut short by a stop request; there is no partial
/// credit and no internal retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    TimedOut,
    Cancelled,
}

/// Seam between the scheduler and the step machinery, so phase logic can
/// be exercised without a display.
pub trait StepExec {
    fn run(&mut self, step: &StepBlock, defaults: &StepOverlay, pace: PaceWindow)
        -> Result<StepOutcome>;
}

enum Polled {
    Hit(MatchResult),
    TimedOut(MatchResult),
    Cancelled,
}

/// Poll `oracle` at `poll_interval` cadence until it reports a match, the
/// timeout elapses, or cancellation is requested. The timeout has no
/// partial credit: failure lands between `max_wait` and
/// `max_wait + poll_interval` after entry.
fn poll_condition(
    oracle: &mut dyn Condition,
    poll_interval: Duration,
    max_wait: Duration,
    cancel: &CancelToken,
    mut on_miss: impl FnMut(&MatchResult),
) -> Result<Polled> {
    let started = Instant::now();
    loop {
        let result = oracle.evaluate()?;
        if result.met {
            return Ok(Polled::Hit(result));
        }
        if started.elapsed() >= max_wait {
            return Ok(Polled::TimedOut(result));
        }
        on_miss(&result);
        if !sleep_cancellable(poll_interval, cancel) {
            return Ok(Polled::Cancelled);
        }
    }
}

/// Sleep out the difference between `elapsed` and a target drawn uniformly
/// from the pace window. Overshoot gets no padding and no correction.
fn pad_to_window(started: Instant, pace: PaceWindow, cancel: &CancelToken) -> bool {
    let elapsed = started.elapsed().as_secs_f64();
    let target = if pace.max_sec > pace.min_sec {
        rand::thread_rng().gen_range(pace.min_sec..pace.max_sec)
    } else {
        pace.min_sec
    };
    if target > elapsed {
        return sleep_cancellable(Duration::from_secs_f64(target - elapsed), cancel);
    }
    if elapsed > pace.max_sec {
        logger::info(&format!(
            "  step ran long: {:.2}s (window {:.2}-{:.2}s)",
            elapsed, pace.min_sec, pace.max_sec
        ));
    }
    true
}

/// Runs steps against the real oracle and dispatcher. Templates are cached
/// by path so each reference pattern is decoded once per run, not once per
/// cycle.
pub struct Executor {
    platform: Arc<dyn Platform>,
    dispatcher: Dispatcher,
    cancel: CancelToken,
    templates: HashMap<PathBuf, Template>,
}

impl Executor {
    pub fn new(platform: Arc<dyn Platform>, cancel: CancelToken) -> Self {
        let dispatcher = Dispatcher::new(platform.pointer());
        Executor {
            platform,
            dispatcher,
            cancel,
            templates: HashMap::new(),
        }
    }

    fn oracle_for(&mut self, cfg: &StepConfig) -> Result<TemplateOracle> {
        let path = &cfg.condition.template_path;
        if !self.templates.contains_key(path) {
            let template = Template::load(path)?;
            self.templates.insert(path.clone(), template);
        }
        let template = &self.templates[path];
        Ok(TemplateOracle::new(
            self.platform.screen(),
            template,
            &cfg.condition,
            cfg.region,
            cfg.monitor_index,
        ))
    }
}

impl StepExec for Executor {
    fn run(
        &mut self,
        step: &StepBlock,
        defaults: &StepOverlay,
        pace: PaceWindow,
    ) -> Result<StepOutcome> {
        let cfg = StepConfig::resolve(step, defaults)?;
        logger::info(&format!("step: {}", cfg.name));

        let mut oracle = self.oracle_for(&cfg)?;
        let started = Instant::now();

        let diagnostics = cfg.diagnostics.as_ref();
        let polled = poll_condition(
            &mut oracle,
            cfg.poll_interval,
            cfg.max_wait,
            &self.cancel,
            |miss| {
                if let Some(diag) = diagnostics {
                    save_diagnostic(diag, SaveOn::Miss, miss);
                }
            },
        )?;

        let hit = match polled {
            Polled::Hit(hit) => hit,
            Polled::TimedOut(last) => {
                logger::warn(&format!(
                    "  timeout after {:.0}s",
                    cfg.max_wait.as_secs_f64()
                ));
                if let Some(diag) = diagnostics {
                    save_diagnostic(diag, SaveOn::Timeout, &last);
                }
                return Ok(StepOutcome::TimedOut);
            }
            Polled::Cancelled => return Ok(StepOutcome::Cancelled),
        };

        logger::info(&format!("  matched (score={:.3})", hit.score));
        if let Some(diag) = diagnostics {
            save_diagnostic(diag, SaveOn::Hit, &hit);
        }

        self.dispatcher.perform(&cfg.action, &hit, cfg.dry_run);

        if !cfg.post_action_delay.is_zero()
            && !sleep_cancellable(cfg.post_action_delay, &self.cancel)
        {
            return Ok(StepOutcome::Cancelled);
        }

        if !pad_to_window(started, pace, &self.cancel) {
            return Ok(StepOutcome::Cancelled);
        }
        Ok(StepOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Frame, Rect};

    struct ScriptedOracle {
        results: Vec<bool>, // met per poll, repeating the last entry
        polls: usize,
    }

    impl ScriptedOracle {
        fn never() -> Self {
            ScriptedOracle { results: vec![false], polls: 0 }
        }

        fn after(misses: usize) -> Self {
            let mut results = vec![false; misses];
            results.push(true);
            ScriptedOracle { results, polls: 0 }
        }
    }

    impl Condition for ScriptedOracle {
        fn evaluate(&mut self) -> Result<MatchResult> {
            let met = *self
                .results
                .get(self.polls)
                .or(self.results.last())
                .unwrap();
            self.polls += 1;
            Ok(MatchResult {
                met,
                score: if met { 0.95 } else { 0.1 },
                rect: Rect { x: 0, y: 0, w: 2, h: 2 },
                frame: Frame::from_rgba(1, 1, vec![0; 4]),
                captured_region: None,
            })
        }
    }

    #[test]
    fn timeout_is_exact_within_one_poll() {
        let mut oracle = ScriptedOracle::never();
        let token = CancelToken::new();
        let poll = Duration::from_millis(50);
        let max_wait = Duration::from_millis(200);

        let started = Instant::now();
        let polled =
            poll_condition(&mut oracle, poll, max_wait, &token, |_| {}).unwrap();
        let elapsed = started.elapsed();

        // The timeout carries the last evaluation, for diagnostics.
        match polled {
            Polled::TimedOut(last) => assert!(!last.met),
            _ => panic!("expected timeout after {} polls", oracle.polls),
        }
        assert!(elapsed >= max_wait, "failed early: {:?}", elapsed);
        assert!(
            elapsed <= max_wait + poll + Duration::from_millis(40),
            "failed late: {:?}",
            elapsed
        );
    }

    #[test]
    fn match_breaks_polling_immediately() {
        let mut oracle = ScriptedOracle::after(2);
        let token = CancelToken::new();
        let polled = poll_condition(
            &mut oracle,
            Duration::from_millis(10),
            Duration::from_secs(5),
            &token,
            |_| {},
        )
        .unwrap();
        assert!(matches!(polled, Polled::Hit(_)));
        assert_eq!(oracle.polls, 3);
    }

    #[test]
    fn miss_callback_fires_per_failed_poll() {
        let mut oracle = ScriptedOracle::after(3);
        let token = CancelToken::new();
        let mut misses = 0;
        poll_condition(
            &mut oracle,
            Duration::from_millis(5),
            Duration::from_secs(5),
            &token,
            |_| misses += 1,
        )
        .unwrap();
        assert_eq!(misses, 3);
    }

    #[test]
    fn cancellation_stops_polling() {
        let mut oracle = ScriptedOracle::never();
        let token = CancelToken::new();
        let t2 = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            t2.cancel();
        });
        let started = Instant::now();
        let polled = poll_condition(
            &mut oracle,
            Duration::from_millis(200),
            Duration::from_secs(30),
            &token,
            |_| {},
        )
        .unwrap();
        assert!(matches!(polled, Polled::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn padding_fills_up_to_window() {
        let token = CancelToken::new();
        let pace = PaceWindow { min_sec: 0.2, max_sec: 0.25 };
        let started = Instant::now();
        assert!(pad_to_window(started, pace, &token));
        let total = started.elapsed().as_secs_f64();
        assert!(total >= 0.2, "padded to {:.3}s", total);
        assert!(total < 0.35, "padded to {:.3}s", total);
    }

    #[test]
    fn overshoot_gets_no_padding() {
        let token = CancelToken::new();
        let pace = PaceWindow { min_sec: 0.01, max_sec: 0.02 };
        let started = Instant::now() - Duration::from_millis(100);
        let before = Instant::now();
        assert!(pad_to_window(started, pace, &token));
        assert!(before.elapsed() < Duration::from_millis(20));
    }
}

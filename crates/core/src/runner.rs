use std::time::{Duration, Instant};

use crate::config::{PhaseBlock, StepOverlay};
use crate::error::{Error, Result};
use crate::logger;
use crate::sleep::{sleep_cancellable, CancelToken};
use crate::step::{StepExec, StepOutcome};
use crate::types::PaceWindow;

/// Result of a whole phase. `Failed` carries 1-based step and cycle
/// positions for the terminal "stopped at step X in cycle Y" report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    Failed { step: usize, cycle: u32 },
    Cancelled,
}

/// Run every step of `phase` in order, `repeats` times. The first step
/// failure aborts the phase immediately; later steps and cycles never run.
/// Cycles finishing under `cycle_min_sec` are padded to the floor; cycles
/// over `cycle_max_sec` are reported and left alone.
pub fn run_phase(
    label: &str,
    phase: &PhaseBlock,
    defaults: &StepOverlay,
    exec: &mut dyn StepExec,
    cancel: &CancelToken,
) -> Result<PhaseOutcome> {
    if phase.steps.is_empty() {
        return Err(Error::Config(format!("{}: no steps", label)));
    }

    let pace = PaceWindow {
        min_sec: phase.step_min_sec,
        max_sec: phase.step_max_sec,
    };
    logger::info(&format!(
        "{}: repeats={}, per_step={:.2}-{:.2}s, cycle_caps={:.2}-{:.2}s",
        label,
        phase.repeats,
        phase.step_min_sec,
        phase.step_max_sec,
        phase.cycle_min_sec,
        phase.cycle_max_sec
    ));

    for cycle in 1..=phase.repeats {
        logger::info(&format!("{}: cycle {}/{}", label, cycle, phase.repeats));
        let cycle_start = Instant::now();

        for (i, step) in phase.steps.iter().enumerate() {
            match exec.run(step, defaults, pace)? {
                StepOutcome::Done => {}
                StepOutcome::TimedOut => {
                    logger::error(&format!(
                        "{}: stopped at step {} in cycle {}",
                        label,
                        i + 1,
                        cycle
                    ));
                    return Ok(PhaseOutcome::Failed { step: i + 1, cycle });
                }
                StepOutcome::Cancelled => return Ok(PhaseOutcome::Cancelled),
            }
        }

        let elapsed = cycle_start.elapsed().as_secs_f64();
        if elapsed < phase.cycle_min_sec {
            let pad = phase.cycle_min_sec - elapsed;
            logger::info(&format!(
                "{}: cycle {} took {:.2}s, padding {:.2}s",
                label, cycle, elapsed, pad
            ));
            if !sleep_cancellable(Duration::from_secs_f64(pad), cancel) {
                return Ok(PhaseOutcome::Cancelled);
            }
        } else if elapsed > phase.cycle_max_sec {
            logger::warn(&format!(
                "{}: cycle {} took {:.2}s (> {:.2}s)",
                label, cycle, elapsed, phase.cycle_max_sec
            ));
        }
    }

    Ok(PhaseOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepBlock;

    /// Scripted step executor: pops the next outcome per invocation.
    struct ScriptedExec {
        script: Vec<StepOutcome>,
        calls: usize,
    }

    impl ScriptedExec {
        fn new(script: Vec<StepOutcome>) -> Self {
            ScriptedExec { script, calls: 0 }
        }
    }

    impl StepExec for ScriptedExec {
        fn run(
            &mut self,
            _step: &StepBlock,
            _defaults: &StepOverlay,
            _pace: PaceWindow,
        ) -> Result<StepOutcome> {
            let out = self.script[self.calls.min(self.script.len() - 1)];
            self.calls += 1;
            Ok(out)
        }
    }

    fn phase(steps: usize, yaml_rest: &str) -> PhaseBlock {
        let steps_yaml: Vec<String> = (0..steps)
            .map(|i| format!("{{ name: s{}, condition: {{ template_path: t.png }} }}", i))
            .collect();
        serde_yaml::from_str(&format!(
            "{{ steps: [{}], {} }}",
            steps_yaml.join(", "),
            yaml_rest
        ))
        .unwrap()
    }

    #[test]
    fn empty_phase_is_config_error() {
        let p: PhaseBlock = serde_yaml::from_str("{ steps: [] }").unwrap();
        let mut exec = ScriptedExec::new(vec![StepOutcome::Done]);
        let err = run_phase("empty", &p, &StepOverlay::default(), &mut exec, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(exec.calls, 0);
    }

    #[test]
    fn first_failure_aborts_phase() {
        // S1 succeeds, S2 fails, S3 must never run.
        let p = phase(3, "repeats: 4, cycle_min_sec: 0.0, cycle_max_sec: 60.0");
        let mut exec = ScriptedExec::new(vec![
            StepOutcome::Done,
            StepOutcome::TimedOut,
            StepOutcome::Done,
        ]);
        let out = run_phase("p", &p, &StepOverlay::default(), &mut exec, &CancelToken::new())
            .unwrap();
        assert_eq!(out, PhaseOutcome::Failed { step: 2, cycle: 1 });
        assert_eq!(exec.calls, 2);
    }

    #[test]
    fn failure_position_reports_cycle() {
        let p = phase(1, "repeats: 3, cycle_min_sec: 0.0, cycle_max_sec: 60.0");
        let mut exec = ScriptedExec::new(vec![
            StepOutcome::Done,
            StepOutcome::Done,
            StepOutcome::TimedOut,
        ]);
        let out = run_phase("p", &p, &StepOverlay::default(), &mut exec, &CancelToken::new())
            .unwrap();
        assert_eq!(out, PhaseOutcome::Failed { step: 1, cycle: 3 });
    }

    #[test]
    fn all_cycles_complete() {
        let p = phase(2, "repeats: 3, cycle_min_sec: 0.0, cycle_max_sec: 60.0");
        let mut exec = ScriptedExec::new(vec![StepOutcome::Done]);
        let out = run_phase("p", &p, &StepOverlay::default(), &mut exec, &CancelToken::new())
            .unwrap();
        assert_eq!(out, PhaseOutcome::Completed);
        assert_eq!(exec.calls, 6);
    }

    #[test]
    fn short_cycle_padded_to_floor() {
        let p = phase(1, "repeats: 1, cycle_min_sec: 0.25, cycle_max_sec: 60.0");
        let mut exec = ScriptedExec::new(vec![StepOutcome::Done]);
        let start = Instant::now();
        let out = run_phase("p", &p, &StepOverlay::default(), &mut exec, &CancelToken::new())
            .unwrap();
        assert_eq!(out, PhaseOutcome::Completed);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn long_cycle_not_shortened() {
        struct SlowExec;
        impl StepExec for SlowExec {
            fn run(
                &mut self,
                _s: &StepBlock,
                _d: &StepOverlay,
                _p: PaceWindow,
            ) -> Result<StepOutcome> {
                std::thread::sleep(Duration::from_millis(60));
                Ok(StepOutcome::Done)
            }
        }
        // cycle_max below actual duration: only reported, never compensated
        let p = phase(1, "repeats: 1, cycle_min_sec: 0.0, cycle_max_sec: 0.01");
        let start = Instant::now();
        let out = run_phase("p", &p, &StepOverlay::default(), &mut SlowExec, &CancelToken::new())
            .unwrap();
        assert_eq!(out, PhaseOutcome::Completed);
        let total = start.elapsed();
        assert!(total >= Duration::from_millis(60));
        assert!(total < Duration::from_millis(200));
    }

    #[test]
    fn cancelled_step_stops_phase() {
        let p = phase(2, "repeats: 2, cycle_min_sec: 0.0, cycle_max_sec: 60.0");
        let mut exec = ScriptedExec::new(vec![StepOutcome::Done, StepOutcome::Cancelled]);
        let out = run_phase("p", &p, &StepOverlay::default(), &mut exec, &CancelToken::new())
            .unwrap();
        assert_eq!(out, PhaseOutcome::Cancelled);
        assert_eq!(exec.calls, 2);
    }
}

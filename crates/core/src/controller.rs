use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::logger;
use crate::platform::Platform;
use crate::runner::{run_phase, PhaseOutcome};
use crate::sleep::CancelToken;
use crate::step::Executor;

/// Shared state of the active run: a liveness flag and the cooperative
/// cancellation token. The only mutable state crossing the foreground /
/// worker boundary besides the log channel.
#[derive(Debug, Default)]
pub struct RunHandle {
    running: AtomicBool,
    cancel: CancelToken,
}

impl RunHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Clears the running flag when the worker exits, whatever the exit path.
struct RunGuard(Arc<RunHandle>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

/// Terminal result of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed { phase: String, step: usize, cycle: u32 },
    Cancelled,
}

/// Owns the background worker for the active run. At most one run is
/// active at a time; starting while active is a reported no-op.
pub struct Controller {
    handle: Arc<RunHandle>,
    worker: Option<JoinHandle<Result<RunOutcome>>>,
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            handle: Arc::new(RunHandle::default()),
            worker: None,
        }
    }

    pub fn handle(&self) -> Arc<RunHandle> {
        Arc::clone(&self.handle)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Spawn a worker for `path`. Returns `false` (leaving the active run
    /// untouched) if a run is already in flight.
    pub fn start(&mut self, path: PathBuf, platform: Arc<dyn Platform>) -> bool {
        if self
            .handle
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            logger::warn("already running");
            return false;
        }

        // Reap the previous worker, if any; its guard has already cleared
        // the flag so this join is immediate.
        if let Some(prev) = self.worker.take() {
            prev.join().ok();
        }

        self.handle.cancel.reset();
        let handle = Arc::clone(&self.handle);
        logger::info(&format!("starting: {}", path.display()));

        self.worker = Some(thread::spawn(move || {
            let _guard = RunGuard(Arc::clone(&handle));
            let result = run_workflow(&path, platform, handle.cancel_token());
            match &result {
                Ok(RunOutcome::Completed) => logger::info("workflow completed"),
                Ok(RunOutcome::Failed { phase, step, cycle }) => logger::error(&format!(
                    "{}: stopped at step {} in cycle {}",
                    phase, step, cycle
                )),
                Ok(RunOutcome::Cancelled) => logger::info("run cancelled"),
                Err(e) => logger::error(&e.to_string()),
            }
            result
        }));
        true
    }

    /// Request cooperative cancellation. Never blocks; the worker notices
    /// at its next sleep or phase boundary.
    pub fn stop(&self) {
        if self.handle.is_running() {
            self.handle.cancel.cancel();
            logger::info("stop requested");
        } else {
            logger::info("nothing to stop");
        }
    }

    /// Wait for the active worker to finish and return its result.
    pub fn join(&mut self) -> Option<Result<RunOutcome>> {
        self.worker.take().map(|h| {
            h.join().unwrap_or_else(|_| {
                logger::error("run worker panicked");
                Err(Error::Resource("run worker panicked".into()))
            })
        })
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a workflow file and run its phases strictly in order, aborting on
/// the first failed phase. Cancellation is checked before each phase and
/// at every sleep inside the executor.
pub fn run_workflow(
    path: &Path,
    platform: Arc<dyn Platform>,
    cancel: CancelToken,
) -> Result<RunOutcome> {
    let workflow = WorkflowConfig::load(path)?;
    let mut exec = Executor::new(platform, cancel.clone());

    for (name, phase) in &workflow.phases {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        match run_phase(name, phase, &workflow.defaults, &mut exec, &cancel)? {
            PhaseOutcome::Completed => logger::info(&format!("{}: complete", name)),
            PhaseOutcome::Failed { step, cycle } => {
                return Ok(RunOutcome::Failed {
                    phase: name.clone(),
                    step,
                    cycle,
                })
            }
            PhaseOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
        }
    }
    Ok(RunOutcome::Completed)
}

/// Workflow files (`.yaml`/`.yml`) under `dir`, sorted by name.
pub fn find_workflows(dir: &Path) -> Vec<PathBuf> {
    let mut results = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return results,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str());
        if path.is_file() && matches!(ext, Some("yaml") | Some("yml")) {
            results.push(path);
        }
    }
    results.sort();
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::StubPlatform;

    #[test]
    fn missing_workflow_clears_running_flag() {
        let mut ctl = Controller::new();
        let started = ctl.start(
            PathBuf::from("/nonexistent/flow.yaml"),
            Arc::new(StubPlatform),
        );
        assert!(started);
        let result = ctl.join().expect("worker spawned");
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(!ctl.is_running());
    }

    #[test]
    fn stop_without_run_is_a_noop() {
        let ctl = Controller::new();
        ctl.stop();
        assert!(!ctl.is_running());
    }

    #[test]
    fn find_workflows_filters_and_sorts() {
        let dir = std::env::temp_dir().join(format!("peck-find-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.yaml"), "x").unwrap();
        std::fs::write(dir.join("a.yml"), "x").unwrap();
        std::fs::write(dir.join("notes.txt"), "x").unwrap();

        let found = find_workflows(&dir);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.yml", "b.yaml"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn join_without_worker_is_none() {
        let mut ctl = Controller::new();
        assert!(ctl.join().is_none());
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::Region;

// Canonical defaults. The legacy runners disagreed on these (200ms/25s vs
// 250ms/45s); one set is canonical and the rest is per-step configuration.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
pub const DEFAULT_MAX_WAIT_SECONDS: f64 = 30.0;
pub const DEFAULT_CONFIDENCE: f32 = 0.9;
pub const DEFAULT_STEP_MIN_SEC: f64 = 0.50;
pub const DEFAULT_STEP_MAX_SEC: f64 = 0.55;
pub const DEFAULT_CYCLE_MIN_SEC: f64 = 4.0;
pub const DEFAULT_CYCLE_MAX_SEC: f64 = 4.4;

/// Reference pattern plus the threshold that turns a score into a verdict.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionSpec {
    pub template_path: PathBuf,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub multiscale: Option<ScaleRange>,
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

/// Optional multi-scale search range for the template.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScaleRange {
    pub min: f32,
    pub max: f32,
    #[serde(default = "default_scale_steps")]
    pub steps: u32,
}

fn default_scale_steps() -> u32 {
    5
}

/// Closed set of post-match actions, decoded at load time. An unrecognized
/// `type` tag fails deserialization and surfaces as a `ConfigError` naming
/// the offending variant, before any step runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpec {
    Click,
    ApproachClick,
    Sleep { seconds: f64 },
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOn {
    Hit,
    Miss,
    Timeout,
}

/// Diagnostic frame dumps: which poll outcomes to save and where.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsSpec {
    #[serde(default)]
    pub save_on: Vec<SaveOn>,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("debug_dumps")
}

/// The step-level keys that participate in the defaults/step merge.
/// Every field is optional; absent keys fall through to the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepOverlay {
    pub condition: Option<ConditionSpec>,
    pub action: Option<ActionSpec>,
    pub region: Option<Region>,
    pub monitor_index: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub max_wait_seconds: Option<f64>,
    pub dry_run: Option<bool>,
    pub post_action_delay_ms: Option<u64>,
    pub diagnostics: Option<DiagnosticsSpec>,
}

/// One step as written in the workflow file. `name` lives outside the
/// overlay so it can never leak into the effective config.
#[derive(Debug, Clone, Deserialize)]
pub struct StepBlock {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub overlay: StepOverlay,
}

/// Ordered steps plus the phase's timing envelopes.
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseBlock {
    #[serde(default)]
    pub steps: Vec<StepBlock>,
    #[serde(default = "default_repeats")]
    pub repeats: u32,
    #[serde(default = "default_step_min")]
    pub step_min_sec: f64,
    #[serde(default = "default_step_max")]
    pub step_max_sec: f64,
    #[serde(default = "default_cycle_min")]
    pub cycle_min_sec: f64,
    #[serde(default = "default_cycle_max")]
    pub cycle_max_sec: f64,
}

impl PhaseBlock {
    /// Pacing windows must be well-formed before any cycle runs.
    fn validate(&self, label: &str) -> Result<()> {
        for (what, min, max) in [
            ("step window", self.step_min_sec, self.step_max_sec),
            ("cycle window", self.cycle_min_sec, self.cycle_max_sec),
        ] {
            if !min.is_finite() || !max.is_finite() || min < 0.0 || max < min {
                return Err(Error::Config(format!(
                    "{}: {} must satisfy 0 <= min <= max, got {}..{}",
                    label, what, min, max
                )));
            }
        }
        Ok(())
    }
}

fn default_repeats() -> u32 {
    1
}
fn default_step_min() -> f64 {
    DEFAULT_STEP_MIN_SEC
}
fn default_step_max() -> f64 {
    DEFAULT_STEP_MAX_SEC
}
fn default_cycle_min() -> f64 {
    DEFAULT_CYCLE_MIN_SEC
}
fn default_cycle_max() -> f64 {
    DEFAULT_CYCLE_MAX_SEC
}

/// Phase list entry for the `phases: [ {name, ...}, ... ]` shape.
#[derive(Debug, Deserialize)]
struct NamedPhase {
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    phase: PhaseBlock,
}

/// A parsed workflow: shared step defaults plus named phases in
/// declaration order.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub defaults: StepOverlay,
    pub phases: Vec<(String, PhaseBlock)>,
}

impl WorkflowConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Accepts three shapes, in priority order:
    ///   1. `phases:` mapping of name -> phase (declaration order kept)
    ///   2. `phases:` list of phases with optional `name` fields
    ///   3. legacy `phase1:` + `phase2:`
    pub fn parse(text: &str) -> Result<Self> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        if !doc.is_mapping() {
            return Err(Error::Config("workflow must be a mapping".into()));
        }

        let defaults = match doc.get("defaults") {
            Some(v) => from_value(v.clone(), "defaults")?,
            None => StepOverlay::default(),
        };

        let phases = if let Some(phases) = doc.get("phases") {
            match phases {
                serde_yaml::Value::Mapping(m) => {
                    let mut out = Vec::with_capacity(m.len());
                    for (key, value) in m {
                        let name = key
                            .as_str()
                            .map(str::to_owned)
                            .unwrap_or_else(|| format!("phase {}", out.len() + 1));
                        let block: PhaseBlock = from_value(value.clone(), &name)?;
                        out.push((name, block));
                    }
                    out
                }
                serde_yaml::Value::Sequence(seq) => {
                    let mut out = Vec::with_capacity(seq.len());
                    for (i, item) in seq.iter().enumerate() {
                        let entry: NamedPhase = from_value(item.clone(), "phases")?;
                        let name = entry.name.unwrap_or_else(|| format!("phase {}", i + 1));
                        out.push((name, entry.phase));
                    }
                    out
                }
                _ => {
                    return Err(Error::Config(
                        "'phases' must be a mapping or a list".into(),
                    ))
                }
            }
        } else if let (Some(p1), Some(p2)) = (doc.get("phase1"), doc.get("phase2")) {
            // Legacy fixed two-phase shape.
            vec![
                ("phase1".to_string(), from_value(p1.clone(), "phase1")?),
                ("phase2".to_string(), from_value(p2.clone(), "phase2")?),
            ]
        } else {
            return Err(Error::Config(
                "workflow needs 'phases' (mapping or list), or 'phase1' and 'phase2'".into(),
            ));
        };

        // A workflow that declares no phases would "complete" having done
        // nothing; reject it like an empty step list.
        if phases.is_empty() {
            return Err(Error::Config("workflow has no phases".into()));
        }
        for (name, block) in &phases {
            block.validate(name)?;
        }
        Ok(WorkflowConfig { defaults, phases })
    }
}

fn from_value<T: serde::de::DeserializeOwned>(v: serde_yaml::Value, ctx: &str) -> Result<T> {
    serde_yaml::from_value(v).map_err(|e| Error::Config(format!("{}: {}", ctx, e)))
}

/// Immutable effective configuration for one step, resolved once before
/// polling starts: built-in defaults, then the workflow `defaults` block,
/// then the step block, later layers winning key by key.
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub name: String,
    pub condition: ConditionSpec,
    pub action: ActionSpec,
    pub region: Option<Region>,
    pub monitor_index: usize,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub dry_run: bool,
    pub post_action_delay: Duration,
    pub diagnostics: Option<DiagnosticsSpec>,
}

impl StepConfig {
    pub fn resolve(step: &StepBlock, defaults: &StepOverlay) -> Result<Self> {
        let name = step
            .name
            .clone()
            .unwrap_or_else(|| "(unnamed)".to_string());
        let s = &step.overlay;

        let condition = s
            .condition
            .clone()
            .or_else(|| defaults.condition.clone())
            .ok_or_else(|| Error::Config(format!("step '{}' has no condition", name)))?;
        let action = s
            .action
            .clone()
            .or_else(|| defaults.action.clone())
            .unwrap_or(ActionSpec::NoOp);

        // Catch malformed numeric fields here, before any Duration
        // conversion can panic on them in the worker.
        let max_wait_seconds = s
            .max_wait_seconds
            .or(defaults.max_wait_seconds)
            .unwrap_or(DEFAULT_MAX_WAIT_SECONDS);
        if !max_wait_seconds.is_finite() || max_wait_seconds < 0.0 {
            return Err(Error::Config(format!(
                "step '{}': max_wait_seconds must be non-negative, got {}",
                name, max_wait_seconds
            )));
        }
        if !condition.confidence.is_finite() || !(0.0..=1.0).contains(&condition.confidence) {
            return Err(Error::Config(format!(
                "step '{}': confidence must be within 0..1, got {}",
                name, condition.confidence
            )));
        }
        if let ActionSpec::Sleep { seconds } = &action {
            if !seconds.is_finite() || *seconds < 0.0 {
                return Err(Error::Config(format!(
                    "step '{}': sleep seconds must be non-negative, got {}",
                    name, seconds
                )));
            }
        }

        Ok(StepConfig {
            condition,
            action,
            region: s.region.or(defaults.region),
            monitor_index: s.monitor_index.or(defaults.monitor_index).unwrap_or(0),
            poll_interval: Duration::from_millis(
                s.poll_interval_ms
                    .or(defaults.poll_interval_ms)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            max_wait: Duration::from_secs_f64(max_wait_seconds),
            dry_run: s.dry_run.or(defaults.dry_run).unwrap_or(false),
            post_action_delay: Duration::from_millis(
                s.post_action_delay_ms
                    .or(defaults.post_action_delay_ms)
                    .unwrap_or(0),
            ),
            diagnostics: s.diagnostics.clone().or_else(|| defaults.diagnostics.clone()),
            name,
        })
    }
}

//! # Drover Engine
//!
//! Executes declarative browser test plans: an ordered list of actions that
//! launch a scriptable target browser, open and navigate windows, wait on
//! load conditions, measure timing, and assert over redrawn output.
//!
//! The engine is strictly single-threaded and cooperative. Nothing waits in
//! the background: the only way time passes in the target is a wait step
//! explicitly pumping its event loop one tick at a time, which makes every
//! run deterministic with respect to the target's event sequence.
//!
//! ## Architecture
//!
//! - [`context`]: the mutable state bag threaded through every step
//! - [`conditions`]: the pure window-status predicate behind every wait
//! - [`timers`]: named stopwatches and ordering assertions
//! - [`executor`]: the plan walker, step dispatcher, and action handlers
//! - [`target`]: the facade to the browser process, with process-backed and
//!   scripted implementations

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use drover_types::{Plan, validate_plan};

pub mod conditions;
pub mod context;
pub mod error;
pub mod executor;
pub mod target;
pub mod timers;

pub use conditions::conditions_met;
pub use context::{ExecContext, RepeatState, Scope};
pub use error::StepError;
pub use executor::{run_plan, run_step};
pub use target::{
    PlotCommand, ProcessLauncher, ProcessTarget, ScriptedLauncher, ScriptedTarget, Target, TargetError, TargetLauncher,
    WindowId, WindowState,
};

/// Load and validate a plan document.
///
/// Documents are YAML by default; a `.json` extension switches to JSON.
/// Decoding rejects unknown actions, check kinds, and condition statuses;
/// validation then applies the constraints the schema cannot express. Both
/// failure modes surface before the target is ever launched.
pub fn load_plan(path: impl AsRef<Path>) -> Result<Plan> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read plan file: {}", path.display()))?;

    let plan: Plan = if path.extension().is_some_and(|extension| extension == "json") {
        serde_json::from_str(&contents).with_context(|| format!("failed to decode JSON plan: {}", path.display()))?
    } else {
        serde_yaml::from_str(&contents).with_context(|| format!("failed to decode YAML plan: {}", path.display()))?
    };

    validate_plan(&plan).with_context(|| format!("plan '{}' failed validation", plan.title))?;
    Ok(plan)
}

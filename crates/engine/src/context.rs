//! Mutable state threaded through every step of a run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use indexmap::IndexMap;

use crate::target::{Target, WindowId};
use crate::timers::TimerRegistry;

/// State of one named repeat loop.
#[derive(Debug, Clone)]
pub struct RepeatState {
    /// Current counter value; doubles as a millisecond budget when a
    /// `sleep-ms` step names this repeat.
    pub counter: i64,
    /// Increment applied after each iteration.
    pub step: i64,
    /// Start of the current iteration, reset by the controller each time
    /// around the loop.
    pub started: Instant,
    /// Cleared by a linked `sleep-ms` step to terminate the loop.
    pub active: bool,
}

/// The execution context: one per run, owned by the plan walker and passed
/// by mutable reference to every handler.
pub struct ExecContext {
    /// Path of the target executable, consumed by the `launch` step.
    pub target_path: PathBuf,
    /// Live target handle between `launch` and `quit`.
    pub browser: Option<Box<dyn Target>>,
    /// Open windows by plan tag. Insertion-ordered so `*all*` conditions
    /// observe windows deterministically.
    pub windows: IndexMap<String, WindowId>,
    /// Named stopwatches.
    pub timers: TimerRegistry,
    /// Repeat loop states by tag.
    pub repeats: HashMap<String, RepeatState>,
}

impl ExecContext {
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
            browser: None,
            windows: IndexMap::new(),
            timers: TimerRegistry::default(),
            repeats: HashMap::new(),
        }
    }
}

/// Per-dispatch frame carrying the nesting depth.
///
/// Travels down the dispatcher by value instead of living as a counter in
/// the context, so nested repeat recursion cannot leave the depth skewed on
/// an error path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope {
    depth: u16,
}

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    /// The scope for steps nested one level below this one.
    pub fn child(self) -> Self {
        Self { depth: self.depth + 1 }
    }

    pub fn depth(self) -> u16 {
        self.depth
    }
}

//! Plan document schema.
//!
//! A plan is an ordered list of steps plus identification metadata, authored
//! in YAML (JSON works too). Every step is one member of a closed action
//! vocabulary: the `action` field selects the [`Step`] variant, so a typo or
//! an unsupported action is rejected while the document is being decoded,
//! before anything runs.
//!
//! The schema deliberately resolves two ambiguities at parse time instead of
//! leaving them to the executor:
//!
//! - `sleep-ms.time` is either a literal millisecond count or the name of a
//!   repeat loop; [`SleepBudget`] keeps the two apart as distinct variants.
//! - `plot-check.checks` entries are single-key maps; [`PlotAssertion`]
//!   closes the set of check kinds, so an unknown key fails to decode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A complete test plan: metadata plus the ordered step sequence.
///
/// Immutable once loaded; the executor never writes back into the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Grouping label, used only for run identification in the trace output.
    pub group: String,
    /// Human-readable plan title.
    pub title: String,
    /// Steps executed strictly top to bottom.
    pub steps: Vec<Step>,
}

/// One action in a plan.
///
/// The wire form is a map with an `action` discriminator in kebab-case,
/// matching the authoring vocabulary:
///
/// ```yaml
/// - action: window-new
///   tag: w1
///   url: http://example.com/
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Spawn the target browser process. Must run before any other action.
    Launch,
    /// Open a new window and remember it under `tag`.
    WindowNew {
        tag: String,
        /// Optional URL to start loading immediately.
        #[serde(default)]
        url: Option<String>,
    },
    /// Close the window registered under `window` and wait for it to die.
    WindowClose { window: String },
    /// Instruct an existing window to load `url`.
    Navigate { window: String, url: String },
    /// Pump the target until `conditions` hold or the budget elapses.
    SleepMs {
        conditions: Vec<Condition>,
        time: SleepBudget,
    },
    /// Pump the target until `conditions` hold. No timeout.
    Block { conditions: Vec<Condition> },
    /// Run `steps` repeatedly with a named counter until terminated.
    Repeat {
        tag: String,
        /// Initial counter value, in milliseconds when used as a budget.
        min: i64,
        /// Counter increment applied after each iteration.
        step: i64,
        steps: Vec<Step>,
    },
    /// Start a named stopwatch.
    TimerStart { tag: String },
    /// Stop a named stopwatch, recording its elapsed time.
    TimerStop { timer: String },
    /// Assert an ordering between two stopped timers, e.g. `"t1 < t2"`.
    TimerCheck { condition: String },
    /// Redraw a window and assert over the emitted plot commands.
    PlotCheck {
        window: String,
        checks: Vec<PlotAssertion>,
    },
    /// Shut the target browser down and wait for confirmation.
    Quit,
}

impl Step {
    /// The authoring name of this step's action, as written in plan files.
    pub fn action_name(&self) -> &'static str {
        match self {
            Step::Launch => "launch",
            Step::WindowNew { .. } => "window-new",
            Step::WindowClose { .. } => "window-close",
            Step::Navigate { .. } => "navigate",
            Step::SleepMs { .. } => "sleep-ms",
            Step::Block { .. } => "block",
            Step::Repeat { .. } => "repeat",
            Step::TimerStart { .. } => "timer-start",
            Step::TimerStop { .. } => "timer-stop",
            Step::TimerCheck { .. } => "timer-check",
            Step::PlotCheck { .. } => "plot-check",
            Step::Quit => "quit",
        }
    }
}

/// A single wait condition: a window selector plus the status it must reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Which window(s) the condition observes.
    pub window: WindowSelector,
    /// Required status. Only `complete` is defined.
    pub status: ConditionStatus,
}

/// Selects the window(s) a condition applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WindowSelector {
    /// Every window currently open (wire form `*all*`).
    All,
    /// The window registered under this tag.
    Tag(String),
}

const ALL_WINDOWS: &str = "*all*";

impl From<String> for WindowSelector {
    fn from(raw: String) -> Self {
        if raw == ALL_WINDOWS {
            WindowSelector::All
        } else {
            WindowSelector::Tag(raw)
        }
    }
}

impl From<WindowSelector> for String {
    fn from(selector: WindowSelector) -> Self {
        match selector {
            WindowSelector::All => ALL_WINDOWS.to_string(),
            WindowSelector::Tag(tag) => tag,
        }
    }
}

impl fmt::Display for WindowSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowSelector::All => f.write_str(ALL_WINDOWS),
            WindowSelector::Tag(tag) => f.write_str(tag),
        }
    }
}

/// Status a condition waits for. A closed set: extending it is a schema
/// change, not a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionStatus {
    /// The selected window(s) have stopped throbbing.
    Complete,
}

/// Budget for a `sleep-ms` step, fixed at parse time by the scalar type of
/// the `time` field: a number is a literal wall-clock budget, a string names
/// an active repeat loop whose counter supplies the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SleepBudget {
    /// Wall-clock budget in milliseconds, measured from step entry.
    Millis(u64),
    /// Budget derived from the named repeat's counter; satisfying the
    /// condition inside that budget also terminates the repeat.
    FromRepeat(String),
}

/// One check applied to a window's redraw output.
///
/// The wire form is a single-key map, e.g. `{text-contains: "Loaded"}` or
/// `{bitmap-count: 2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlotAssertion {
    /// The space-joined text of all text plot commands must contain this
    /// substring.
    TextContains(String),
    /// Exactly this many bitmap plot commands must have been emitted.
    BitmapCount(usize),
}

/// Comparison operator of a `timer-check` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    Less,
    Greater,
}

impl fmt::Display for TimerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerOp::Less => f.write_str("<"),
            TimerOp::Greater => f.write_str(">"),
        }
    }
}

/// A parsed `timer-check` expression: `<left> <op> <right>` where the
/// operands name previously stopped timers.
///
/// Parsing lives here so plan validation and the executor share one reading
/// of the expression format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerComparison {
    pub left: String,
    pub op: TimerOp,
    pub right: String,
}

impl FromStr for TimerComparison {
    type Err = String;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = expression.split_whitespace().collect();
        let [left, op, right] = tokens.as_slice() else {
            return Err(format!(
                "expected '<timer> <op> <timer>', got '{expression}'"
            ));
        };
        let op = match *op {
            "<" => TimerOp::Less,
            ">" => TimerOp::Greater,
            other => return Err(format!("unsupported operator '{other}'; use '<' or '>'")),
        };
        Ok(TimerComparison {
            left: (*left).to_string(),
            op,
            right: (*right).to_string(),
        })
    }
}

pub mod validation;

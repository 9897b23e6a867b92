//! Error taxonomy for plan execution.
//!
//! Three families share one fail-fast channel: precondition violations
//! (state the plan assumed but the context does not hold), assertion
//! failures (the test's actual verdicts), and transport errors from the
//! target process. There is no recovery path for any of them; the first
//! error aborts the run.

use std::time::Duration;

use thiserror::Error;

use drover_types::TimerOp;

use crate::target::TargetError;

/// Fatal error raised while executing a plan step.
#[derive(Debug, Error)]
pub enum StepError {
    // Precondition violations.
    #[error("the target browser is already running; 'launch' may only run once")]
    BrowserAlreadyLaunched,

    #[error("no target browser is running; run 'launch' first")]
    BrowserNotLaunched,

    #[error("window tag '{tag}' is already in use")]
    DuplicateWindowTag { tag: String },

    #[error("no window is registered under tag '{tag}'")]
    UnknownWindowTag { tag: String },

    #[error("timer '{name}' has already been started")]
    DuplicateTimer { name: String },

    #[error("timer '{name}' was never started")]
    UnknownTimer { name: String },

    #[error("timer '{name}' has already been stopped")]
    TimerAlreadyStopped { name: String },

    #[error("timer '{name}' is still running; stop it before comparing")]
    TimerStillRunning { name: String },

    #[error("repeat tag '{tag}' is already registered")]
    DuplicateRepeat { tag: String },

    #[error("sleep-ms references unknown repeat '{name}'")]
    UnknownRepeat { name: String },

    // Configuration errors that survive plan validation being skipped.
    #[error("timer-check expression is malformed: {reason}")]
    MalformedTimerCheck { reason: String },

    // Assertion failures.
    #[error(
        "timer ordering violated: '{left}' took {left_taken:?}, '{right}' took {right_taken:?}, expected {left} {op} {right}"
    )]
    TimerOrderViolation {
        left: String,
        left_taken: Duration,
        op: TimerOp,
        right: String,
        right_taken: Duration,
    },

    #[error("redraw text does not contain '{needle}' (full text: '{haystack}')")]
    TextNotFound { needle: String, haystack: String },

    #[error("expected {expected} bitmap plot(s), found {actual}")]
    BitmapCountMismatch { expected: usize, actual: usize },

    #[error("window '{tag}' is still alive after close")]
    WindowStillAlive { tag: String },

    #[error("the target did not confirm a clean shutdown")]
    QuitNotConfirmed,

    // Transport failures from the target boundary.
    #[error(transparent)]
    Target(#[from] TargetError),
}

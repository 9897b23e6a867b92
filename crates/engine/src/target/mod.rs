//! The target facade: everything the engine is allowed to ask of the
//! browser process under test.
//!
//! The executor never talks to a child process directly; it goes through
//! [`Target`], and obtains one through a [`TargetLauncher`]. That seam is
//! what keeps every wait step testable: the process-backed implementation
//! ([`process::ProcessTarget`]) pumps real protocol lines, while
//! [`scripted::ScriptedTarget`] replays pre-programmed throbber transitions
//! tick by tick.

use std::fmt;
use std::path::Path;

use thiserror::Error;

pub mod process;
pub mod scripted;

pub use process::{ProcessLauncher, ProcessTarget};
pub use scripted::{ScriptedLauncher, ScriptedTarget, TickEffect};

/// Identifier the target assigns to one of its windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable state of one target window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// False once the target has announced the window's destruction.
    pub alive: bool,
    /// True while the window's loading indicator is running.
    pub throbbing: bool,
}

/// One drawing primitive from a window redraw snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotCommand {
    /// A run of rendered text at the given position.
    Text { x: i64, y: i64, text: String },
    /// A rendered bitmap with its geometry.
    Bitmap { x: i64, y: i64, width: u32, height: u32 },
}

/// Transport-level failure at the target boundary.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("failed to spawn target '{path}': {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("target io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("target closed its output stream unexpectedly")]
    Closed,

    #[error("malformed target protocol line: '{line}'")]
    Protocol { line: String },
}

/// Handle to a running target browser.
///
/// All calls are synchronous; progress only happens when the engine
/// explicitly asks for it via [`Target::pump_tick`]. Implementations keep
/// whatever bookkeeping they need so that [`Target::window_state`] is a
/// cheap, side-effect-free read.
pub trait Target {
    /// Open a new window, optionally starting a navigation straight away.
    fn new_window(&mut self, url: Option<&str>) -> Result<WindowId, TargetError>;

    /// Ask an existing window to load `url`.
    fn navigate(&mut self, window: WindowId, url: &str) -> Result<(), TargetError>;

    /// Request destruction of a window. Death is observed asynchronously
    /// through [`Target::window_state`] after further ticks.
    fn kill_window(&mut self, window: WindowId) -> Result<(), TargetError>;

    /// Current observable state of a window. Unknown ids read as dead.
    fn window_state(&self, window: WindowId) -> WindowState;

    /// Request a redraw and collect the emitted plot commands in order.
    fn redraw(&mut self, window: WindowId) -> Result<Vec<PlotCommand>, TargetError>;

    /// Advance the target's own event loop by exactly one event.
    fn pump_tick(&mut self) -> Result<(), TargetError>;

    /// Request shutdown and wait for it to complete. Returns true when the
    /// target confirmed a clean exit.
    fn quit_and_wait(&mut self) -> Result<bool, TargetError>;
}

/// Creates a live [`Target`] from the target executable path.
pub trait TargetLauncher {
    fn launch(&self, target_path: &Path) -> Result<Box<dyn Target>, TargetError>;
}

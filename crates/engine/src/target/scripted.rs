//! Deterministic in-memory target.
//!
//! A stand-in for a live target process: window ids are handed out
//! sequentially starting at 1, and each `pump_tick` applies the next
//! scripted [`TickEffect`]. Tests use it to choreograph throbber
//! transitions and window death against the executor's wait loops without
//! spawning anything.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use super::{PlotCommand, Target, TargetError, TargetLauncher, WindowId, WindowState};

/// One scripted consequence of pumping the target event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    /// The tick carries no observable change.
    Idle,
    StartThrobber(WindowId),
    StopThrobber(WindowId),
    DestroyWindow(WindowId),
}

/// Scriptable fake target.
#[derive(Debug, Default)]
pub struct ScriptedTarget {
    next_id: u32,
    windows: HashMap<WindowId, WindowState>,
    effects: VecDeque<TickEffect>,
    plots: HashMap<WindowId, Vec<PlotCommand>>,
    refuse_quit: bool,
    ignore_kill: bool,
    ticks: u64,
}

impl ScriptedTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a target that will replay `effects`, one per tick, in order.
    /// Ticks past the end of the script are idle.
    pub fn with_script(effects: impl IntoIterator<Item = TickEffect>) -> Self {
        Self {
            effects: effects.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Queue another effect at the end of the script.
    pub fn push_effect(&mut self, effect: TickEffect) {
        self.effects.push_back(effect);
    }

    /// Stage the plot commands a future `redraw` of `window` will return.
    pub fn stage_plots(&mut self, window: WindowId, plots: Vec<PlotCommand>) {
        self.plots.insert(window, plots);
    }

    /// Make `quit_and_wait` report an unconfirmed shutdown.
    pub fn refuse_quit(&mut self) {
        self.refuse_quit = true;
    }

    /// Make `kill_window` requests go unanswered, so windows only die via
    /// a scripted [`TickEffect::DestroyWindow`].
    pub fn ignore_kill(&mut self) {
        self.ignore_kill = true;
    }

    /// Number of ticks pumped so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn apply(&mut self, effect: TickEffect) {
        match effect {
            TickEffect::Idle => {}
            TickEffect::StartThrobber(id) => self.set_throbbing(id, true),
            TickEffect::StopThrobber(id) => self.set_throbbing(id, false),
            TickEffect::DestroyWindow(id) => {
                if let Some(state) = self.windows.get_mut(&id) {
                    state.alive = false;
                    state.throbbing = false;
                }
            }
        }
    }

    fn set_throbbing(&mut self, id: WindowId, throbbing: bool) {
        if let Some(state) = self.windows.get_mut(&id) {
            state.throbbing = throbbing;
        }
    }
}

impl Target for ScriptedTarget {
    fn new_window(&mut self, url: Option<&str>) -> Result<WindowId, TargetError> {
        self.next_id += 1;
        let id = WindowId(self.next_id);
        // A window created with a url starts loading immediately.
        self.windows.insert(
            id,
            WindowState {
                alive: true,
                throbbing: url.is_some(),
            },
        );
        Ok(id)
    }

    fn navigate(&mut self, window: WindowId, _url: &str) -> Result<(), TargetError> {
        self.set_throbbing(window, true);
        Ok(())
    }

    fn kill_window(&mut self, window: WindowId) -> Result<(), TargetError> {
        if !self.ignore_kill
            && let Some(state) = self.windows.get_mut(&window)
        {
            state.alive = false;
            state.throbbing = false;
        }
        Ok(())
    }

    fn window_state(&self, window: WindowId) -> WindowState {
        self.windows.get(&window).copied().unwrap_or(WindowState {
            alive: false,
            throbbing: false,
        })
    }

    fn redraw(&mut self, window: WindowId) -> Result<Vec<PlotCommand>, TargetError> {
        Ok(self.plots.get(&window).cloned().unwrap_or_default())
    }

    fn pump_tick(&mut self) -> Result<(), TargetError> {
        self.ticks += 1;
        if let Some(effect) = self.effects.pop_front() {
            self.apply(effect);
        }
        Ok(())
    }

    fn quit_and_wait(&mut self) -> Result<bool, TargetError> {
        self.windows.clear();
        Ok(!self.refuse_quit)
    }
}

/// Launcher that hands out one pre-built [`ScriptedTarget`].
pub struct ScriptedLauncher {
    target: Mutex<Option<ScriptedTarget>>,
}

impl ScriptedLauncher {
    pub fn new(target: ScriptedTarget) -> Self {
        Self {
            target: Mutex::new(Some(target)),
        }
    }
}

impl TargetLauncher for ScriptedLauncher {
    fn launch(&self, _target_path: &Path) -> Result<Box<dyn Target>, TargetError> {
        let target = self
            .target
            .lock()
            .expect("scripted launcher lock poisoned")
            .take()
            .ok_or_else(|| TargetError::Io(std::io::Error::other("scripted target already launched")))?;
        Ok(Box::new(target))
    }
}

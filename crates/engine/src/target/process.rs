//! Process-backed target transport.
//!
//! Spawns the target executable with piped stdin/stdout (stderr stays on
//! the console) and drives it over a line-oriented protocol. Commands go
//! down stdin; the target announces everything it does (window creation,
//! throbber transitions, window death, shutdown) one event per line on
//! stdout. `pump_tick` consumes exactly one such line, which is what gives
//! the wait steps their deterministic tick-at-a-time semantics.

use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use super::{PlotCommand, Target, TargetError, TargetLauncher, WindowId, WindowState};

/// Launches [`ProcessTarget`]s from the executable path in the context.
pub struct ProcessLauncher;

impl TargetLauncher for ProcessLauncher {
    fn launch(&self, target_path: &Path) -> Result<Box<dyn Target>, TargetError> {
        Ok(Box::new(ProcessTarget::spawn(target_path)?))
    }
}

/// One event line announced by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TargetEvent {
    Started,
    ClosingDown,
    Finished,
    WindowNew(WindowId),
    ThrobberStart(WindowId),
    ThrobberStop(WindowId),
    WindowDestroyed(WindowId),
    RedrawStart(WindowId),
    RedrawStop(WindowId),
    Plot(PlotCommand),
    /// Vocabulary this driver does not act on; logged and skipped.
    Unhandled,
}

/// A live target child process.
pub struct ProcessTarget {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    started: bool,
    finished: bool,
    windows: HashMap<WindowId, WindowState>,
    /// Windows announced by the target but not yet claimed by `new_window`.
    announced: VecDeque<WindowId>,
}

impl ProcessTarget {
    /// Spawn the target executable and pump until it announces readiness.
    pub fn spawn(path: &Path) -> Result<Self, TargetError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| TargetError::Spawn {
                path: path.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().expect("stdin was piped at spawn");
        let stdout = child.stdout.take().expect("stdout was piped at spawn");

        let mut target = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            started: false,
            finished: false,
            windows: HashMap::new(),
            announced: VecDeque::new(),
        };

        while !target.started {
            target.pump_tick()?;
        }
        debug!(target = %path.display(), "target started");
        Ok(target)
    }

    fn send(&mut self, command: &str) -> Result<(), TargetError> {
        debug!(command, "sending target command");
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, TargetError> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line)?;
        if bytes == 0 {
            return Err(TargetError::Closed);
        }
        Ok(line.trim_end().to_string())
    }

    fn apply(&mut self, event: TargetEvent) {
        match event {
            TargetEvent::Started => self.started = true,
            TargetEvent::ClosingDown => {}
            TargetEvent::Finished => self.finished = true,
            TargetEvent::WindowNew(id) => {
                self.windows.insert(
                    id,
                    WindowState {
                        alive: true,
                        throbbing: false,
                    },
                );
                self.announced.push_back(id);
            }
            TargetEvent::ThrobberStart(id) => self.set_throbbing(id, true),
            TargetEvent::ThrobberStop(id) => self.set_throbbing(id, false),
            TargetEvent::WindowDestroyed(id) => {
                if let Some(state) = self.windows.get_mut(&id) {
                    state.alive = false;
                    state.throbbing = false;
                }
            }
            // Redraw brackets and plots outside a redraw exchange carry no
            // state; `redraw` consumes them in-line.
            TargetEvent::RedrawStart(_) | TargetEvent::RedrawStop(_) | TargetEvent::Plot(_) => {}
            TargetEvent::Unhandled => {}
        }
    }

    fn set_throbbing(&mut self, id: WindowId, throbbing: bool) {
        if let Some(state) = self.windows.get_mut(&id) {
            state.throbbing = throbbing;
        }
    }
}

impl Target for ProcessTarget {
    fn new_window(&mut self, url: Option<&str>) -> Result<WindowId, TargetError> {
        match url {
            Some(url) => self.send(&format!("WINDOW NEW {url}"))?,
            None => self.send("WINDOW NEW")?,
        }
        loop {
            if let Some(id) = self.announced.pop_front() {
                return Ok(id);
            }
            self.pump_tick()?;
        }
    }

    fn navigate(&mut self, window: WindowId, url: &str) -> Result<(), TargetError> {
        self.send(&format!("WINDOW GO {window} {url}"))
    }

    fn kill_window(&mut self, window: WindowId) -> Result<(), TargetError> {
        self.send(&format!("WINDOW DESTROY {window}"))
    }

    fn window_state(&self, window: WindowId) -> WindowState {
        self.windows.get(&window).copied().unwrap_or(WindowState {
            alive: false,
            throbbing: false,
        })
    }

    fn redraw(&mut self, window: WindowId) -> Result<Vec<PlotCommand>, TargetError> {
        self.send(&format!("WINDOW REDRAW {window}"))?;

        let mut plots = Vec::new();
        let mut in_redraw = false;
        loop {
            let line = self.read_line()?;
            match parse_event(&line)? {
                TargetEvent::RedrawStart(id) if id == window => in_redraw = true,
                TargetEvent::RedrawStop(id) if id == window => return Ok(plots),
                TargetEvent::Plot(plot) if in_redraw => plots.push(plot),
                // Unrelated events may interleave with the redraw reply;
                // they still update window bookkeeping.
                event => self.apply(event),
            }
        }
    }

    fn pump_tick(&mut self) -> Result<(), TargetError> {
        let line = self.read_line()?;
        let event = parse_event(&line)?;
        if event == TargetEvent::Unhandled {
            debug!(line, "ignoring target line");
        }
        self.apply(event);
        Ok(())
    }

    fn quit_and_wait(&mut self) -> Result<bool, TargetError> {
        self.send("QUIT")?;
        while !self.finished {
            match self.read_line() {
                Ok(line) => {
                    let event = parse_event(&line)?;
                    self.apply(event);
                }
                Err(TargetError::Closed) => break,
                Err(error) => return Err(error),
            }
        }
        let status = self.child.wait()?;
        Ok(self.finished && status.success())
    }
}

impl Drop for ProcessTarget {
    fn drop(&mut self) {
        // Best-effort teardown when the run aborts mid-plan.
        if let Ok(None) = self.child.try_wait() {
            warn!("target still running at teardown; killing it");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn parse_event(line: &str) -> Result<TargetEvent, TargetError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let event = match tokens.as_slice() {
        ["STARTED"] => TargetEvent::Started,
        ["CLOSING_DOWN"] => TargetEvent::ClosingDown,
        ["FINISHED"] => TargetEvent::Finished,
        ["WINDOW", "NEW", "WIN", id] => TargetEvent::WindowNew(parse_window_id(id, line)?),
        ["WINDOW", "START_THROBBER", "WIN", id] => TargetEvent::ThrobberStart(parse_window_id(id, line)?),
        ["WINDOW", "STOP_THROBBER", "WIN", id] => TargetEvent::ThrobberStop(parse_window_id(id, line)?),
        ["WINDOW", "DESTROY", "WIN", id] => TargetEvent::WindowDestroyed(parse_window_id(id, line)?),
        ["REDRAW", "WIN", id, "START"] => TargetEvent::RedrawStart(parse_window_id(id, line)?),
        ["REDRAW", "WIN", id, "STOP"] => TargetEvent::RedrawStop(parse_window_id(id, line)?),
        ["PLOT", rest @ ..] => TargetEvent::Plot(parse_plot(rest, line)?),
        _ => TargetEvent::Unhandled,
    };
    Ok(event)
}

fn parse_plot(tokens: &[&str], line: &str) -> Result<PlotCommand, TargetError> {
    match tokens {
        ["TEXT", "X", x, "Y", y, "STR", text @ ..] => Ok(PlotCommand::Text {
            x: parse_number(x, line)?,
            y: parse_number(y, line)?,
            text: text.join(" "),
        }),
        ["BITMAP", "X", x, "Y", y, "WIDTH", width, "HEIGHT", height] => Ok(PlotCommand::Bitmap {
            x: parse_number(x, line)?,
            y: parse_number(y, line)?,
            width: parse_number(width, line)?,
            height: parse_number(height, line)?,
        }),
        _ => Err(TargetError::Protocol { line: line.to_string() }),
    }
}

fn parse_window_id(token: &str, line: &str) -> Result<WindowId, TargetError> {
    let id = parse_number(token, line)?;
    Ok(WindowId(id))
}

fn parse_number<N: std::str::FromStr>(token: &str, line: &str) -> Result<N, TargetError> {
    token.parse().map_err(|_| TargetError::Protocol { line: line.to_string() })
}

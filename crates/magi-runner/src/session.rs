//! Session spawning and the caller-facing handle
//!
//! ## Usage
//!
//! ```ignore
//! let session = magi_runner::start("claude", &args, RunnerOptions::new(cwd))?;
//! let (mut events, handle) = session.into_parts();
//! while let Some(event) = events.next().await {
//!     match event? {
//!         StreamEvent::Delta { content, .. } => print!("{}", content),
//!         _ => {}
//!     }
//! }
//! handle.kill().await?; // no-op once exited
//! ```

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::options::RunnerOptions;
use crate::stream::EventStream;
use serde::Serialize;
use std::ffi::OsStr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extra wait on top of the grace period before `kill()` gives up waiting.
const KILL_WAIT_MARGIN: Duration = Duration::from_secs(2);

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Spawned, waiting for the readiness signal
    Starting,
    /// Content is being accepted
    Streaming,
    /// A graceful exit was requested
    ExitRequested,
    /// The process has exited and every event was queued
    Exited,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Streaming => write!(f, "streaming"),
            Self::ExitRequested => write!(f, "exit_requested"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Requests from handles to the session driver.
#[derive(Debug)]
pub(crate) enum Control {
    Kill,
    Write(String),
    Resize { cols: u16, rows: u16 },
}

/// Spawn `command` inside a pseudo-terminal and start streaming its output.
///
/// Must be called from within a tokio runtime. Fails immediately when the
/// options are invalid or the process cannot be spawned.
pub fn start<I, S>(command: &str, args: I, options: RunnerOptions) -> Result<Session>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    options.validate()?;

    let id = options
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let (pty, pts) =
        pty_process::open().map_err(|e| Error::Spawn(format!("Failed to open PTY: {}", e)))?;
    pty.resize(pty_process::Size::new(options.rows, options.cols))
        .map_err(|e| Error::Spawn(format!("Failed to size PTY: {}", e)))?;

    let mut pty_cmd = pty_process::Command::new(command).args(args);
    if options.clear_env {
        pty_cmd = pty_cmd.env_clear();
    }
    for (key, value) in &options.env {
        pty_cmd = pty_cmd.env(key, value);
    }
    if !options.env.contains_key("TERM") {
        pty_cmd = pty_cmd.env("TERM", "xterm-256color");
    }
    pty_cmd = pty_cmd.current_dir(&options.cwd);

    let child = pty_cmd
        .spawn(pts)
        .map_err(|e| Error::Spawn(format!("Failed to spawn '{}': {}", command, e)))?;

    info!(
        session_id = %id,
        command = %command,
        cwd = %options.cwd.display(),
        pid = ?child.id(),
        "Spawned PTY session"
    );

    let (reader, writer) = pty.into_split();
    let (event_tx, event_rx) = mpsc::channel(options.event_capacity);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SessionState::Starting);
    let grace_period = options.grace_period;

    let driver = Driver::new(
        id.clone(),
        &options,
        reader,
        writer,
        child,
        event_tx,
        control_rx,
        state_tx,
    );
    let join = tokio::spawn(driver.run());

    Ok(Session {
        events: EventStream::new(id.clone(), event_rx, join),
        handle: SessionHandle {
            id,
            control: control_tx,
            state: state_rx,
            grace_period,
        },
    })
}

/// A running session: its event stream plus a control handle.
pub struct Session {
    events: EventStream,
    handle: SessionHandle,
}

impl Session {
    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.handle.id()
    }

    /// A cloneable control handle.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Mutable access to the event stream.
    pub fn events(&mut self) -> &mut EventStream {
        &mut self.events
    }

    /// Split into the event stream and the control handle.
    #[must_use]
    pub fn into_parts(self) -> (EventStream, SessionHandle) {
        (self.events, self.handle)
    }
}

/// Cloneable control handle for a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<SessionState>,
    grace_period: Duration,
}

impl SessionHandle {
    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Whether the session has reached its terminal state.
    #[must_use]
    pub fn is_exited(&self) -> bool {
        self.state() == SessionState::Exited
    }

    /// Request a graceful exit and wait for the process to go away.
    ///
    /// The driver writes the exit input, then force-kills after the grace
    /// period. Calling this again, or after the session exited, is a no-op.
    pub async fn kill(&self) -> Result<()> {
        if self.is_exited() {
            debug!(session_id = %self.id, "Kill requested after exit; nothing to do");
            return Ok(());
        }
        if self.control.send(Control::Kill).is_err() {
            // Driver already gone
            return Ok(());
        }
        let wait = tokio::time::timeout(self.grace_period + KILL_WAIT_MARGIN, self.wait_exited());
        if wait.await.is_err() {
            warn!(session_id = %self.id, "Session did not exit within the grace period");
        }
        Ok(())
    }

    /// Wait until the session reaches `Exited`.
    pub async fn wait_exited(&self) {
        let mut state = self.state.clone();
        // An error means the driver dropped its sender, which only happens on exit
        let _ = state
            .wait_for(|s| *s == SessionState::Exited)
            .await
            .map(|_| ());
    }

    /// Write raw input to the terminal (`\r` submits a line).
    pub fn write_input(&self, input: impl Into<String>) -> Result<()> {
        self.control
            .send(Control::Write(input.into()))
            .map_err(|_| exited_error())
    }

    /// Resize the terminal.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        if cols == 0 || rows == 0 {
            return Err(Error::InvalidOptions(
                "terminal size must be non-zero".to_string(),
            ));
        }
        self.control
            .send(Control::Resize { cols, rows })
            .map_err(|_| exited_error())
    }
}

fn exited_error() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "session has exited",
    ))
}

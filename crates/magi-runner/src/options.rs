//! Runner options

use crate::batch::BatchSchedule;
use crate::error::{Error, Result};
use crate::filter::{LineFilter, NoNoise, SharedFilter};
use crate::pipeline::{LineCallback, PipelineConfig};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default terminal width.
pub const DEFAULT_COLS: u16 = 120;
/// Default terminal height.
pub const DEFAULT_ROWS: u16 = 40;
/// Default silence timeout.
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_secs(120);
/// Grace period between the exit request and a forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);
/// Duplicate-suppression window.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
/// Event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
/// Literal line that asks the runner to end the session.
pub const COMPLETION_SENTINEL: &str = "[[MAGI_TASK_COMPLETE]]";
/// Input written to the terminal to request a graceful exit.
pub const DEFAULT_EXIT_INPUT: &str = "exit\r";

/// Options for one runner session.
#[derive(Clone)]
pub struct RunnerOptions {
    /// Working directory (required)
    pub cwd: PathBuf,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// Start from an empty environment instead of inheriting the parent's
    pub clear_env: bool,
    /// Terminal columns
    pub cols: u16,
    /// Terminal rows
    pub rows: u16,
    /// Silence timeout; any raw output resets it
    pub silence_timeout: Duration,
    /// Wait after the exit request before force-killing
    pub grace_period: Duration,
    /// Noise predicate
    pub noise: SharedFilter,
    /// Readiness predicate
    pub readiness: Option<SharedFilter>,
    /// Adaptive batching tiers
    pub batch_schedule: BatchSchedule,
    /// Caller-supplied correlation id
    pub session_id: Option<String>,
    /// Observer for every cleaned line
    pub line_callback: Option<LineCallback>,
    /// Emit a final `complete` event
    pub emit_complete: bool,
    /// Emit every cleaned line as console output
    pub console_passthrough: bool,
    /// Completion sentinel; `None` disables it
    pub sentinel: Option<String>,
    /// Input written on a graceful exit request
    pub exit_input: String,
    /// Duplicate-suppression window
    pub history_capacity: usize,
    /// Bounded event queue size
    pub event_capacity: usize,
}

impl fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerOptions")
            .field("cwd", &self.cwd)
            .field("env_keys", &self.env.keys().collect::<Vec<_>>())
            .field("clear_env", &self.clear_env)
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("silence_timeout", &self.silence_timeout)
            .field("grace_period", &self.grace_period)
            .field("has_readiness", &self.readiness.is_some())
            .field("batch_schedule", &self.batch_schedule)
            .field("session_id", &self.session_id)
            .field("emit_complete", &self.emit_complete)
            .field("sentinel", &self.sentinel)
            .field("history_capacity", &self.history_capacity)
            .finish_non_exhaustive()
    }
}

impl RunnerOptions {
    /// Options with defaults for the given working directory.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            env: HashMap::new(),
            clear_env: false,
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
            noise: Arc::new(NoNoise),
            readiness: None,
            batch_schedule: BatchSchedule::default(),
            session_id: None,
            line_callback: None,
            emit_complete: true,
            console_passthrough: false,
            sentinel: Some(COMPLETION_SENTINEL.to_string()),
            exit_input: DEFAULT_EXIT_INPUT.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Do not inherit the parent environment.
    #[must_use]
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    /// Set the terminal size.
    #[must_use]
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }

    /// Set the silence timeout.
    #[must_use]
    pub fn with_silence_timeout(mut self, timeout: Duration) -> Self {
        self.silence_timeout = timeout;
        self
    }

    /// Set the kill grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Set the noise predicate.
    #[must_use]
    pub fn with_noise(mut self, filter: impl LineFilter + 'static) -> Self {
        self.noise = Arc::new(filter);
        self
    }

    /// Set the readiness predicate.
    #[must_use]
    pub fn with_readiness(mut self, filter: impl LineFilter + 'static) -> Self {
        self.readiness = Some(Arc::new(filter));
        self
    }

    /// Set the batching schedule.
    #[must_use]
    pub fn with_batch_schedule(mut self, schedule: BatchSchedule) -> Self {
        self.batch_schedule = schedule;
        self
    }

    /// Use a caller-supplied correlation id.
    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Observe every cleaned line.
    #[must_use]
    pub fn with_line_callback(
        mut self,
        callback: impl Fn(&str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.line_callback = Some(Arc::new(callback));
        self
    }

    /// Whether to emit a final `complete` event.
    #[must_use]
    pub fn with_emit_complete(mut self, emit: bool) -> Self {
        self.emit_complete = emit;
        self
    }

    /// Emit every cleaned line as console output.
    #[must_use]
    pub fn with_console_passthrough(mut self, enabled: bool) -> Self {
        self.console_passthrough = enabled;
        self
    }

    /// Override or disable the completion sentinel.
    #[must_use]
    pub fn with_sentinel(mut self, sentinel: Option<String>) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Input written on a graceful exit request.
    #[must_use]
    pub fn with_exit_input(mut self, input: impl Into<String>) -> Self {
        self.exit_input = input.into();
        self
    }

    /// Set the duplicate-suppression window.
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the event queue size.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Reject options that cannot run.
    pub fn validate(&self) -> Result<()> {
        if !self.cwd.is_dir() {
            return Err(Error::InvalidOptions(format!(
                "working directory does not exist: {}",
                self.cwd.display()
            )));
        }
        if self.cols == 0 || self.rows == 0 {
            return Err(Error::InvalidOptions(
                "terminal size must be non-zero".to_string(),
            ));
        }
        if self.silence_timeout.is_zero() {
            return Err(Error::InvalidOptions(
                "silence timeout must be non-zero".to_string(),
            ));
        }
        if self.batch_schedule.is_empty() {
            return Err(Error::InvalidOptions(
                "batch schedule needs at least one tier".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidOptions(
                "event capacity must be non-zero".to_string(),
            ));
        }
        if self.sentinel.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(Error::InvalidOptions(
                "sentinel must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            noise: self.noise.clone(),
            readiness: self.readiness.clone(),
            sentinel: self.sentinel.clone(),
            history_capacity: self.history_capacity,
            console_passthrough: self.console_passthrough,
            line_callback: self.line_callback.clone(),
        }
    }
}

//! Line pipeline: buffering, filtering, readiness gating and deduplication
//!
//! Every line the subprocess prints goes through the same steps, in order:
//!
//! ```text
//! 1. strip escapes, resolve carriage-return overwrites, trim trailing space
//! 2. before readiness: drop noise, wait for the readiness predicate
//!    (the triggering line is a boundary, never content)
//! 3. drop noise
//! 4. completion sentinel -> exit request, never content
//! 5. drop lines present in the recent-history window, else accept
//! ```

use crate::ansi::strip_ansi_escapes;
use crate::error::{Error, Result};
use crate::filter::{SharedFilter, Signal};
use std::collections::VecDeque;
use std::sync::Arc;

/// Callback observing every cleaned line before filtering.
pub type LineCallback = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// What a chunk of input produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutput {
    /// Line accepted as content (no trailing newline)
    Accepted(String),
    /// Side-channel value reported by a predicate
    Signal(Signal),
    /// Raw cleaned line for console passthrough
    Console(String),
    /// The readiness predicate fired
    Ready,
    /// The completion sentinel was seen
    ExitRequested,
}

/// Static configuration of a pipeline.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Noise predicate, applied before and after readiness
    pub noise: SharedFilter,
    /// Readiness predicate; `None` means streaming from the first line
    pub readiness: Option<SharedFilter>,
    /// Literal line that requests a graceful exit
    pub sentinel: Option<String>,
    /// Size of the duplicate-suppression window
    pub history_capacity: usize,
    /// Emit every cleaned line as console output
    pub console_passthrough: bool,
    /// Observer for every cleaned line
    pub line_callback: Option<LineCallback>,
}

/// Bounded FIFO of recently accepted lines.
#[derive(Debug, Clone)]
pub struct RecentHistory {
    lines: VecDeque<String>,
    capacity: usize,
}

impl RecentHistory {
    /// Create an empty window.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Whether the line is in the window.
    #[must_use]
    pub fn contains(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }

    /// Record a line, evicting the oldest past capacity.
    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Number of lines held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Per-session line state machine.
///
/// Outputs collect in `pending` until a call completes. When a line fails,
/// the outputs of the lines before it stay in `pending` for
/// [`LinePipeline::take_pending`].
pub struct LinePipeline {
    config: PipelineConfig,
    partial: String,
    history: RecentHistory,
    ready: bool,
    accepted: usize,
    pending: Vec<PipelineOutput>,
    exit_echo: Option<String>,
}

impl LinePipeline {
    /// Create a pipeline. Without a readiness predicate it starts ready.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let ready = config.readiness.is_none();
        let history = RecentHistory::new(config.history_capacity);
        Self {
            config,
            partial: String::new(),
            history,
            ready,
            accepted: 0,
            pending: Vec::new(),
            exit_echo: None,
        }
    }

    /// Whether readiness has been reached.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of accepted lines so far.
    #[must_use]
    pub fn accepted_lines(&self) -> usize {
        self.accepted
    }

    /// Feed decoded text; complete lines are processed, the tail is kept.
    pub fn feed(&mut self, text: &str) -> Result<Vec<PipelineOutput>> {
        self.partial.push_str(text);
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            self.process_line(&line[..line.len() - 1])?;
        }
        Ok(self.take_pending())
    }

    /// Process a trailing partial line once output has closed.
    pub fn finish(&mut self) -> Result<Vec<PipelineOutput>> {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.process_line(&line)?;
        }
        Ok(self.take_pending())
    }

    /// Outputs produced before a failed `feed` or `finish`.
    pub fn take_pending(&mut self) -> Vec<PipelineOutput> {
        std::mem::take(&mut self.pending)
    }

    /// Drop the next line equal to `input`, the terminal's echo of what
    /// was just written to the tool.
    pub fn expect_echo(&mut self, input: &str) {
        let echo = clean_line(input);
        self.exit_echo = (!echo.trim().is_empty()).then(|| echo.trim().to_string());
    }

    fn process_line(&mut self, raw: &str) -> Result<()> {
        let Self {
            config,
            history,
            ready,
            accepted,
            pending: out,
            exit_echo,
            ..
        } = self;
        let line = clean_line(raw);

        if exit_echo.as_deref().is_some_and(|echo| line.trim() == echo) {
            *exit_echo = None;
            return Ok(());
        }

        if let Some(callback) = &config.line_callback {
            callback(&line)?;
        }
        if config.console_passthrough && !line.is_empty() {
            out.push(PipelineOutput::Console(line.clone()));
        }

        let mut report = |signal: Signal| out.push(PipelineOutput::Signal(signal));

        if !*ready {
            if config.noise.is_match(&line, &mut report) {
                return Ok(());
            }
            if let Some(readiness) = &config.readiness {
                if readiness.is_match(&line, &mut report) {
                    *ready = true;
                    out.push(PipelineOutput::Ready);
                }
            }
            return Ok(());
        }

        if config.noise.is_match(&line, &mut report) {
            return Ok(());
        }

        if config
            .sentinel
            .as_deref()
            .is_some_and(|s| line.trim() == s)
        {
            out.push(PipelineOutput::ExitRequested);
            return Ok(());
        }

        if history.contains(&line) {
            return Ok(());
        }
        history.push(line.clone());
        *accepted += 1;
        out.push(PipelineOutput::Accepted(line));
        Ok(())
    }
}

/// Clean one raw line: keep the last carriage-return segment, strip escapes
/// and trailing whitespace.
pub(crate) fn clean_line(raw: &str) -> String {
    let raw = raw.trim_end_matches('\r');
    let visible = raw.rsplit('\r').next().unwrap_or(raw);
    strip_ansi_escapes(visible).trim_end().to_string()
}

/// Run a closure, converting a panic into a processing error.
pub(crate) fn contain_panic<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic while processing output".to_string());
            Err(Error::Processing(message))
        }
    }
}

#[cfg(test)]
mod tests;

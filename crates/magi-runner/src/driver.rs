//! Per-session driver task
//!
//! Owns the PTY, the child process and all per-session state. Every timer
//! (silence, batch, forced kill) is a deadline polled in one `select!` loop,
//! so a session never has more than one pending timer of each kind.
//!
//! Events go to an ordered outbox first and are handed to the channel as
//! capacity frees up. A consumer that stops polling pauses PTY reads but
//! never the deadlines or control messages, so `kill()` stays bounded.

use crate::batch::Batcher;
use crate::decode::Utf8Decoder;
use crate::error::{Error, Result};
use crate::event::{SessionOutcome, StreamEvent, Termination};
use crate::options::RunnerOptions;
use crate::pipeline::{contain_panic, LinePipeline, PipelineOutput};
use crate::session::{Control, SessionState};
use pty_process::{OwnedReadPty, OwnedWritePty};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

const READ_BUFFER_SIZE: usize = 4096;

/// Per-read timeout while draining output after the process exited.
const DRAIN_READ_TIMEOUT: Duration = Duration::from_millis(100);

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365)
}

pub(crate) struct Driver {
    id: String,
    reader: OwnedReadPty,
    writer: OwnedWritePty,
    child: Child,
    pipeline: LinePipeline,
    batcher: Batcher,
    decoder: Utf8Decoder,
    events: mpsc::Sender<StreamEvent>,
    outbox: VecDeque<StreamEvent>,
    outbox_limit: usize,
    control: mpsc::UnboundedReceiver<Control>,
    state: watch::Sender<SessionState>,
    silence_timeout: Duration,
    grace_period: Duration,
    exit_input: String,
    emit_complete: bool,
    order: u64,
    emitted_chars: usize,
    termination: Option<Termination>,
    exit_requested: bool,
    kill_deadline: Option<Instant>,
    consumer_gone: bool,
}

impl Driver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        options: &RunnerOptions,
        reader: OwnedReadPty,
        writer: OwnedWritePty,
        child: Child,
        events: mpsc::Sender<StreamEvent>,
        control: mpsc::UnboundedReceiver<Control>,
        state: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            id,
            reader,
            writer,
            child,
            pipeline: LinePipeline::new(options.pipeline_config()),
            batcher: Batcher::new(options.batch_schedule.clone()),
            decoder: Utf8Decoder::default(),
            events,
            outbox: VecDeque::new(),
            outbox_limit: options.event_capacity.max(1),
            control,
            state,
            silence_timeout: options.silence_timeout,
            grace_period: options.grace_period,
            exit_input: options.exit_input.clone(),
            emit_complete: options.emit_complete,
            order: 0,
            emitted_chars: 0,
            termination: None,
            exit_requested: false,
            kill_deadline: None,
            consumer_gone: false,
        }
    }

    pub async fn run(mut self) -> Result<SessionOutcome> {
        let started = std::time::Instant::now();
        self.emit(StreamEvent::Start {
            session_id: self.id.clone(),
        });
        if self.pipeline.is_ready() {
            self.advance(SessionState::Streaming);
        }

        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut silence_deadline = Instant::now() + self.silence_timeout;
        let mut output_open = true;
        let mut control_open = true;

        let status = loop {
            let batch_deadline = self.batcher.deadline();
            let kill_deadline = self.kill_deadline;
            let backlogged = self.outbox.len() >= self.outbox_limit;
            let events = self.events.clone();

            tokio::select! {
                permit = events.reserve(), if !self.outbox.is_empty() && !self.consumer_gone => {
                    let delivered = permit
                        .map(|permit| {
                            if let Some(event) = self.outbox.pop_front() {
                                permit.send(event);
                            }
                        })
                        .is_ok();
                    if !delivered {
                        self.consumer_dropped().await;
                    } else if backlogged {
                        // Silence measures the tool, not a slow consumer
                        silence_deadline = Instant::now() + self.silence_timeout;
                    }
                }
                read = self.reader.read(&mut buf), if output_open && !backlogged => match read {
                    Ok(n) if n > 0 => {
                        silence_deadline = Instant::now() + self.silence_timeout;
                        self.handle_bytes(&buf[..n]).await;
                    }
                    // EOF, or EIO once the child side of the PTY closes
                    _ => output_open = false,
                },
                status = self.child.wait() => break status,
                _ = sleep_until(silence_deadline), if !self.exit_requested && !backlogged => {
                    warn!(
                        session_id = %self.id,
                        timeout_ms = self.silence_timeout.as_millis() as u64,
                        "No output within silence timeout"
                    );
                    self.request_exit(Termination::Silence).await;
                }
                _ = sleep_until(batch_deadline.unwrap_or_else(far_future)), if batch_deadline.is_some() => {
                    self.flush_delta().await;
                }
                _ = sleep_until(kill_deadline.unwrap_or_else(far_future)), if kill_deadline.is_some() => {
                    warn!(session_id = %self.id, "Grace period elapsed, killing process");
                    if let Err(e) = self.child.start_kill() {
                        debug!(session_id = %self.id, error = %e, "Kill failed");
                    }
                    self.kill_deadline = None;
                }
                _ = events.closed(), if !self.consumer_gone => self.consumer_dropped().await,
                control = self.control.recv(), if control_open => match control {
                    Some(control) => self.handle_control(control).await,
                    None => control_open = false,
                },
            }
        };

        if output_open {
            self.drain_output(&mut buf).await;
        }
        self.finish_output().await;

        let exit_code = match &status {
            Ok(status) => Some(status.code().unwrap_or(-1)),
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Failed to wait for process");
                None
            }
        };
        let outcome = SessionOutcome {
            session_id: self.id.clone(),
            exit_code,
            termination: self.termination.unwrap_or(Termination::Exited),
            accepted_lines: self.pipeline.accepted_lines(),
            emitted_chars: self.emitted_chars,
            duration: started.elapsed(),
        };

        info!(
            session_id = %self.id,
            exit_code = ?outcome.exit_code,
            termination = %outcome.termination,
            accepted_lines = outcome.accepted_lines,
            duration_ms = outcome.duration.as_millis() as u64,
            "Session exited"
        );

        // The process is gone; what is left is delivery
        self.advance(SessionState::Exited);
        self.deliver_outbox().await;
        Ok(outcome)
    }

    /// Hand every queued event to the channel, waiting for the consumer.
    async fn deliver_outbox(&mut self) {
        while let Some(event) = self.outbox.pop_front() {
            if self.consumer_gone || self.events.send(event).await.is_err() {
                self.outbox.clear();
                return;
            }
        }
    }

    /// Read what is left in the PTY once the process is gone.
    async fn drain_output(&mut self, buf: &mut [u8]) {
        loop {
            match timeout(DRAIN_READ_TIMEOUT, self.reader.read(buf)).await {
                Ok(Ok(n)) if n > 0 => self.handle_bytes(&buf[..n]).await,
                _ => break,
            }
        }
    }

    /// Process the trailing partial line and emit the final event.
    async fn finish_output(&mut self) {
        let tail = self.decoder.finish();
        if !tail.is_empty() {
            self.handle_text(&tail).await;
        }
        match contain_panic(|| self.pipeline.finish()) {
            Ok(outputs) => self.apply(outputs).await,
            Err(e) => {
                let accepted = self.pipeline.take_pending();
                self.apply(accepted).await;
                self.processing_failed(e).await;
            }
        }

        if self.emit_complete {
            let content = self.batcher.drain();
            self.emitted_chars += content.chars().count();
            let order = self.next_order();
            self.emit(StreamEvent::Complete {
                session_id: self.id.clone(),
                content,
                order,
            });
        } else {
            self.flush_delta().await;
        }
    }

    async fn handle_bytes(&mut self, bytes: &[u8]) {
        let text = self.decoder.decode(bytes);
        if !text.is_empty() {
            self.handle_text(&text).await;
        }
    }

    async fn handle_text(&mut self, text: &str) {
        match contain_panic(|| self.pipeline.feed(text)) {
            Ok(outputs) => self.apply(outputs).await,
            Err(e) => {
                let accepted = self.pipeline.take_pending();
                self.apply(accepted).await;
                self.processing_failed(e).await;
            }
        }
    }

    async fn apply(&mut self, outputs: Vec<PipelineOutput>) {
        for output in outputs {
            match output {
                PipelineOutput::Accepted(mut line) => {
                    line.push('\n');
                    self.batcher.push(&line, Instant::now());
                }
                PipelineOutput::Signal(signal) => {
                    debug!(session_id = %self.id, rule = %signal.rule, value = %signal.value, "Signal");
                    self.emit(StreamEvent::SideChannel {
                        session_id: self.id.clone(),
                        content: format!("{}: {}", signal.rule, signal.value),
                    });
                }
                PipelineOutput::Console(line) => {
                    self.emit(StreamEvent::SideChannel {
                        session_id: self.id.clone(),
                        content: line,
                    });
                }
                PipelineOutput::Ready => {
                    info!(session_id = %self.id, "Readiness reached, streaming output");
                    self.advance(SessionState::Streaming);
                }
                PipelineOutput::ExitRequested => {
                    info!(session_id = %self.id, "Completion sentinel seen");
                    self.request_exit(Termination::Sentinel).await;
                }
            }
        }
    }

    async fn processing_failed(&mut self, e: Error) {
        error!(session_id = %self.id, error = %e, "Output processing failed");
        self.emit(StreamEvent::Error {
            session_id: self.id.clone(),
            error: e.to_string(),
        });
        self.request_exit(Termination::ProcessingError).await;
    }

    async fn handle_control(&mut self, control: Control) {
        match control {
            Control::Kill => self.request_exit(Termination::Cancelled).await,
            Control::Write(input) => {
                if let Err(e) = self.writer.write_all(input.as_bytes()).await {
                    warn!(session_id = %self.id, error = %e, "Failed to write input");
                }
            }
            Control::Resize { cols, rows } => {
                if let Err(e) = self.writer.resize(pty_process::Size::new(rows, cols)) {
                    warn!(session_id = %self.id, error = %e, "Failed to resize terminal");
                }
            }
        }
    }

    /// Write the exit input once and arm the forced-kill deadline.
    async fn request_exit(&mut self, reason: Termination) {
        if self.exit_requested {
            return;
        }
        self.exit_requested = true;
        self.termination.get_or_insert(reason);
        self.advance(SessionState::ExitRequested);
        info!(session_id = %self.id, reason = %reason, "Requesting graceful exit");

        self.pipeline.expect_echo(&self.exit_input);
        if let Err(e) = self.writer.write_all(self.exit_input.as_bytes()).await {
            debug!(session_id = %self.id, error = %e, "Failed to write exit input");
        }
        self.kill_deadline = Some(Instant::now() + self.grace_period);
    }

    async fn flush_delta(&mut self) {
        if let Some(content) = self.batcher.flush() {
            self.emitted_chars += content.chars().count();
            let order = self.next_order();
            self.emit(StreamEvent::Delta {
                session_id: self.id.clone(),
                content,
                order,
            });
        }
    }

    fn next_order(&mut self) -> u64 {
        let order = self.order;
        self.order += 1;
        order
    }

    /// Queue an event for delivery in order.
    fn emit(&mut self, event: StreamEvent) {
        if !self.consumer_gone {
            self.outbox.push_back(event);
        }
    }

    async fn consumer_dropped(&mut self) {
        self.consumer_gone = true;
        self.outbox.clear();
        debug!(session_id = %self.id, "Event stream dropped, cancelling session");
        self.request_exit(Termination::Cancelled).await;
    }

    fn advance(&self, to: SessionState) {
        self.state.send_if_modified(|current| {
            if to > *current {
                *current = to;
                true
            } else {
                false
            }
        });
    }
}

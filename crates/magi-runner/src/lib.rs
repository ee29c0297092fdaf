//! Magi Runner - PTY-backed streaming for interactive CLI tools
//!
//! This crate runs an interactive command-line tool inside a pseudo-terminal
//! and turns its screen output into an ordered stream of clean content:
//! - Session: spawn, lifecycle, graceful exit and forced kill
//! - Pipeline: escape stripping, noise filtering, readiness gating, dedupe
//! - Batch: adaptive delta batching by buffer size
//! - Filter: line predicates and named rule sets
//! - Manager: registry of live sessions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ansi;
pub mod batch;
mod decode;
mod driver;
pub mod error;
pub mod event;
pub mod filter;
pub mod manager;
pub mod options;
pub mod pipeline;
pub mod session;
pub mod stream;

pub use batch::{BatchSchedule, BatchTier};
pub use error::{Error, Result};
pub use event::{SessionOutcome, StreamEvent, Termination};
pub use filter::{terminal_chrome, LineFilter, NoNoise, NoiseRule, RuleKind, RuleSet, SharedFilter, Signal};
pub use manager::SessionManager;
pub use options::RunnerOptions;
pub use session::{start, Session, SessionHandle, SessionState};
pub use stream::EventStream;

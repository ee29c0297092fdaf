//! Event printing
//!
//! Plain text mode writes answer content to stdout and everything else to
//! stderr, so `magi run ... > answer.md` captures only the answer.

use chrono::{DateTime, Utc};
use magi_slots::SlotLease;
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use tracing::{info, warn};

use crate::providers::{AgentEvent, RunSummary};

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn event(&self, event: &AgentEvent) {
        if self.json {
            self.json_line(event);
            return;
        }
        match event {
            AgentEvent::MessageStart {
                session_id,
                provider,
            } => info!(session_id = %session_id, provider = %provider, "Session started"),
            AgentEvent::MessageDelta { content, .. } | AgentEvent::MessageComplete { content, .. } => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(content.as_bytes());
                let _ = stdout.flush();
            }
            AgentEvent::ConsoleOutput { content, .. } => eprintln!("[console] {}", content),
            AgentEvent::Error { error, .. } => eprintln!("[error] {}", error),
        }
    }

    pub fn summary(&self, summary: &RunSummary) {
        if self.json {
            self.json_line(&json!({ "type": "summary", "outcome": summary.outcome }));
            return;
        }
        let outcome = &summary.outcome;
        eprintln!(
            "Session {} finished ({}, exit code {}, {} lines, {:.1}s)",
            summary.session_id,
            outcome.termination,
            outcome
                .exit_code
                .map_or_else(|| "unknown".to_string(), |c| c.to_string()),
            outcome.accepted_lines,
            outcome.duration.as_secs_f64()
        );
    }

    pub fn leases(&self, leases: &[SlotLease], stale_cutoff: DateTime<Utc>) {
        if self.json {
            for lease in leases {
                self.json_line(&json!({ "lease": lease, "stale": lease.is_stale(stale_cutoff) }));
            }
            return;
        }
        if leases.is_empty() {
            println!("No leases");
            return;
        }
        println!(
            "{:<36}  {:<12}  {:<24}  {:<20}  {}",
            "SLOT", "CLASS", "HOLDER", "HEARTBEAT", "KEY"
        );
        for lease in leases {
            let heartbeat = lease.last_heartbeat.format("%Y-%m-%d %H:%M:%S");
            let marker = if lease.is_stale(stale_cutoff) { " (stale)" } else { "" };
            println!(
                "{:<36}  {:<12}  {:<24}  {:<20}  {}{}",
                lease.slot_id,
                lease.resource_class,
                lease.process_id,
                heartbeat,
                lease.resource_key,
                marker
            );
        }
    }

    pub fn purged(&self, count: u64) {
        if self.json {
            self.json_line(&json!({ "purged": count }));
        } else {
            println!("Purged {} stale lease(s)", count);
        }
    }

    fn json_line(&self, value: &impl Serialize) {
        match serde_json::to_string(value) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "Failed to serialize output"),
        }
    }
}

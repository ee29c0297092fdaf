//! Provider adapter
//!
//! Runs one prompt through a provider: takes a slot when the provider is
//! limited, streams the session through the runner, and maps its events.
//! The slot is released once the stream ended, whatever the result.

use anyhow::{Context, Result};
use futures::StreamExt;
use magi_runner::{SessionManager, SessionOutcome};
use magi_slots::{Slot, SlotLimiter, SlotStore};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use super::backoff::{acquire_slot, SlotBackoff};
use super::{AgentEvent, ProviderProfile};
use crate::settings::{AppConfig, RunnerSettings};

/// Result of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub session_id: String,
    /// Concatenated delta and complete content
    pub content: String,
    pub outcome: SessionOutcome,
}

/// Runs prompts through one provider
#[derive(Clone)]
pub struct ProviderAdapter {
    profile: ProviderProfile,
    runner: RunnerSettings,
    limiter: Option<SlotLimiter>,
    backoff: SlotBackoff,
    manager: SessionManager,
}

impl ProviderAdapter {
    pub fn new(profile: ProviderProfile, runner: RunnerSettings, manager: SessionManager) -> Self {
        Self {
            profile,
            runner,
            limiter: None,
            backoff: SlotBackoff::default(),
            manager,
        }
    }

    /// Adapter for `profile` with the limiter and retry policy from `config`
    pub async fn from_config(
        profile: ProviderProfile,
        config: &AppConfig,
        manager: SessionManager,
    ) -> Result<Self> {
        let mut adapter = Self::new(profile, config.runner.clone(), manager);
        if adapter.profile.limited {
            let path = config.slots.database_path(&config.data_dir);
            let store = SlotStore::from_path(&path)
                .await
                .with_context(|| format!("Failed to open slot database {}", path.display()))?;
            let limiter_config = config
                .slots
                .limiter_config(&adapter.profile.resource_class, adapter.profile.max_slots);
            let limiter = SlotLimiter::new(store, limiter_config)?;
            adapter = adapter.with_limiter(limiter, config.slots.retry.to_backoff());
        }
        Ok(adapter)
    }

    /// Cap runs with `limiter`, waiting for a free slot per `backoff`
    #[must_use]
    pub fn with_limiter(mut self, limiter: SlotLimiter, backoff: SlotBackoff) -> Self {
        self.limiter = Some(limiter);
        self.backoff = backoff;
        self
    }

    /// Run `prompt` in `cwd`, handing every event to `on_event`
    pub async fn run<F>(&self, prompt: &str, cwd: &Path, mut on_event: F) -> Result<RunSummary>
    where
        F: FnMut(AgentEvent),
    {
        let session_id = uuid::Uuid::new_v4().to_string();
        let slot = self.take_slot(&session_id).await?;

        let result = self.stream(prompt, cwd, &session_id, &mut on_event).await;

        if let Some(slot) = slot {
            if let Err(e) = slot.release().await {
                warn!(slot_id = %slot.id(), error = %e, "Failed to release slot");
            }
        }
        result
    }

    async fn take_slot(&self, resource_key: &str) -> Result<Option<Slot>> {
        let Some(limiter) = self.limiter.as_ref().filter(|_| self.profile.limited) else {
            return Ok(None);
        };

        let slot = acquire_slot(limiter, resource_key, &self.backoff).await?;
        Ok(Some(slot))
    }

    async fn stream(
        &self,
        prompt: &str,
        cwd: &Path,
        session_id: &str,
        on_event: &mut dyn FnMut(AgentEvent),
    ) -> Result<RunSummary> {
        let options = self
            .profile
            .runner_options(&self.runner, cwd)
            .with_session_id(session_id);
        let args = self.profile.args_for(prompt);

        info!(
            session_id = %session_id,
            provider = %self.profile.kind,
            command = %self.profile.command,
            "Starting provider session"
        );
        let session = self
            .manager
            .start(&self.profile.command, &args, options)
            .await
            .with_context(|| format!("Failed to start {}", self.profile.command))?;
        let (mut events, _handle) = session.into_parts();

        let mut content = String::new();
        let mut failure = None;
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    let event = AgentEvent::from_stream(event, self.profile.kind);
                    if let Some(text) = event.content() {
                        content.push_str(text);
                    }
                    on_event(event);
                }
                Err(e) => failure = Some(e),
            }
        }

        if let Some(e) = failure {
            return Err(e).with_context(|| {
                format!("{} session {} failed", self.profile.kind.display_name(), session_id)
            });
        }
        let outcome = events
            .outcome()
            .cloned()
            .context("Session ended without an outcome")?;

        Ok(RunSummary {
            session_id: session_id.to_string(),
            content,
            outcome,
        })
    }
}

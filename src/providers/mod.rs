//! Provider adapters for interactive AI coding CLIs
//!
//! Each provider contributes a small declarative table: command and argument
//! template, the noise rules matching its terminal chrome, an optional
//! readiness rule, the input that asks it to quit, and whether its runs are
//! capped by the slot limiter. Settings can override everything but the
//! rule tables.

mod adapter;
mod backoff;
mod claude_code;
mod codex;
mod events;
mod gemini;
mod shell;

pub use adapter::{ProviderAdapter, RunSummary};
pub use events::AgentEvent;
pub use backoff::SlotBackoff;

use crate::settings::{ProviderSettings, RunnerSettings};
use anyhow::{Context, Result};
use clap::ValueEnum;
use magi_runner::{RuleSet, RunnerOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Placeholder replaced with the prompt in argument templates
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Supported CLI tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Claude Code (Anthropic CLI)
    ClaudeCode,
    /// Codex (OpenAI)
    Codex,
    /// Gemini CLI (Google)
    Gemini,
    /// Any command run through `/bin/sh -c`
    Shell,
}

impl ProviderKind {
    /// Key of the provider's `[providers.<key>]` section
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude_code",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Shell => "shell",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "Claude Code",
            Self::Codex => "Codex",
            Self::Gemini => "Gemini CLI",
            Self::Shell => "Shell",
        }
    }

    fn defaults(&self) -> Result<ProviderDefaults, regex::Error> {
        match self {
            Self::ClaudeCode => claude_code::defaults(),
            Self::Codex => codex::defaults(),
            Self::Gemini => gemini::defaults(),
            Self::Shell => shell::defaults(),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Built-in table of one provider
pub(crate) struct ProviderDefaults {
    command: &'static str,
    args: &'static [&'static str],
    noise: RuleSet,
    readiness: Option<RuleSet>,
    exit_input: &'static str,
    limited: bool,
}

/// A provider with settings applied
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub kind: ProviderKind,
    pub command: String,
    pub args_template: Vec<String>,
    pub noise: RuleSet,
    pub readiness: Option<RuleSet>,
    pub exit_input: String,
    /// Whether runs take a slot from the limiter
    pub limited: bool,
    pub resource_class: String,
    pub max_slots: Option<u32>,
    pub silence_timeout: Option<Duration>,
    pub env: HashMap<String, String>,
}

impl ProviderProfile {
    /// Built-in defaults overlaid with `settings`
    pub fn resolve(kind: ProviderKind, settings: Option<&ProviderSettings>) -> Result<Self> {
        let defaults = kind
            .defaults()
            .with_context(|| format!("Invalid built-in rules for {}", kind.display_name()))?;
        let settings = settings.cloned().unwrap_or_default();

        Ok(Self {
            kind,
            command: settings
                .command
                .unwrap_or_else(|| defaults.command.to_string()),
            args_template: settings
                .args
                .unwrap_or_else(|| defaults.args.iter().map(|a| a.to_string()).collect()),
            noise: defaults.noise,
            readiness: defaults.readiness,
            exit_input: settings
                .exit_input
                .unwrap_or_else(|| defaults.exit_input.to_string()),
            limited: settings.limited.unwrap_or(defaults.limited),
            resource_class: settings
                .resource_class
                .unwrap_or_else(|| kind.config_key().to_string()),
            max_slots: settings.max_slots,
            silence_timeout: settings.silence_timeout_secs.map(Duration::from_secs),
            env: settings.env,
        })
    }

    /// Profile for an arbitrary command, run verbatim
    pub fn custom(command: impl Into<String>, args: Vec<String>) -> Result<Self> {
        let mut profile = Self::resolve(ProviderKind::Shell, None)?;
        profile.command = command.into();
        profile.args_template = args;
        Ok(profile)
    }

    /// Arguments with the prompt substituted
    pub fn args_for(&self, prompt: &str) -> Vec<String> {
        self.args_template
            .iter()
            .map(|a| a.replace(PROMPT_PLACEHOLDER, prompt))
            .collect()
    }

    /// Runner options for one run of this provider
    pub fn runner_options(&self, runner: &RunnerSettings, cwd: &Path) -> RunnerOptions {
        let mut options = runner
            .to_options(cwd)
            .with_noise(self.noise.clone())
            .with_exit_input(self.exit_input.clone());
        if let Some(readiness) = &self.readiness {
            options = options.with_readiness(readiness.clone());
        }
        if let Some(timeout) = self.silence_timeout {
            options = options.with_silence_timeout(timeout);
        }
        for (key, value) in &self.env {
            options = options.with_env(key.clone(), value.clone());
        }
        options
    }
}

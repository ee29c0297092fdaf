//! Codex terminal chrome
//!
//! Codex prints a banner and echoes the prompt under a `user` header; the
//! answer starts after the `codex` header.

use magi_runner::{terminal_chrome, NoiseRule, RuleSet};

use super::ProviderDefaults;

pub(super) fn defaults() -> Result<ProviderDefaults, regex::Error> {
    let noise = terminal_chrome()
        .with(NoiseRule::regex("banner", r"^\s*>?_?\s*OpenAI Codex")?)
        .with(NoiseRule::regex("status", r"(?i)^\s*(working|thinking)\b.*esc")?)
        .with(NoiseRule::regex("tokens_used", r"^\s*tokens used:?\s*\S+")?)
        .with(NoiseRule::contains("send_hint", "⏎ send"));

    let readiness = RuleSet::new().with(NoiseRule::exact("answer_header", "codex"));

    Ok(ProviderDefaults {
        command: "codex",
        args: &["{prompt}"],
        noise,
        readiness: Some(readiness),
        exit_input: "/quit\r",
        limited: false,
    })
}

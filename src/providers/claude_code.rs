//! Claude Code terminal chrome

use magi_runner::{terminal_chrome, NoiseRule, RuleSet};

use super::ProviderDefaults;

pub(super) fn defaults() -> Result<ProviderDefaults, regex::Error> {
    let noise = terminal_chrome()
        .with(
            NoiseRule::contains("status", "esc to interrupt")
                .with_signal(r"([\d.]+k?) tokens")?,
        )
        .with(NoiseRule::regex("thinking", r"^[✻✽✶✳✢·*]\s+\S+…")?)
        .with(NoiseRule::regex("prompt", r"^[│|]?\s*>\s")?)
        .with(NoiseRule::contains("welcome", "Welcome to Claude Code"))
        .with(NoiseRule::contains("shortcuts", "? for shortcuts"))
        .with(NoiseRule::regex("tip", r"^\s*(※\s*)?Tip:")?)
        .with(NoiseRule::regex("cwd", r"^\s*cwd:\s")?)
        .with(NoiseRule::contains("auto_accept", "auto-accept edits"));

    Ok(ProviderDefaults {
        command: "claude",
        args: &["{prompt}"],
        noise,
        readiness: None,
        exit_input: "/exit\r",
        limited: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use magi_runner::LineFilter;

    fn rules() -> RuleSet {
        defaults().unwrap().noise
    }

    #[test]
    fn test_chrome_is_noise() {
        let rules = rules();
        assert_eq!(rules.matching_rule("╭──────────────────╮"), Some("box_drawing"));
        assert_eq!(rules.matching_rule("✻ Pondering… (3s)"), Some("spinner"));
        assert_eq!(rules.matching_rule("* Pondering… (3s)"), Some("thinking"));
        assert_eq!(rules.matching_rule("│ > fix the bug"), Some("prompt"));
        assert_eq!(rules.matching_rule("Welcome to Claude Code!"), Some("welcome"));
        assert_eq!(rules.matching_rule("  ? for shortcuts"), Some("shortcuts"));
        assert_eq!(rules.matching_rule(" ※ Tip: use /help"), Some("tip"));
    }

    #[test]
    fn test_content_passes() {
        let rules = rules();
        assert_eq!(rules.matching_rule("The bug is in parse_args."), None);
        assert_eq!(rules.matching_rule("fn main() {"), None);
    }

    #[test]
    fn test_status_line_reports_tokens() {
        let rules = rules();
        let mut signals = Vec::new();
        let matched = rules.is_match("(12s · 1.2k tokens · esc to interrupt)", &mut |s| {
            signals.push(s)
        });
        assert!(matched);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].rule, "status");
        assert_eq!(signals[0].value, "1.2k");
    }
}

//! Gemini CLI terminal chrome

use magi_runner::{terminal_chrome, NoiseRule};

use super::ProviderDefaults;

pub(super) fn defaults() -> Result<ProviderDefaults, regex::Error> {
    let noise = terminal_chrome()
        .with(NoiseRule::contains("cancel_hint", "esc to cancel"))
        .with(NoiseRule::regex("prompt", r"^[│|]?\s*>\s")?)
        .with(NoiseRule::regex("tips", r"^\s*Tips for getting started")?)
        .with(NoiseRule::regex("tip_item", r"^\s*\d\.\s+(Ask questions|Be specific|Create GEMINI\.md|/help)")?)
        .with(NoiseRule::regex("footer", r"(?i)\bgemini-[\d.]+-(pro|flash)\b.*context left")?)
        .with(NoiseRule::prefix("using", "Using:"));

    Ok(ProviderDefaults {
        command: "gemini",
        args: &["-i", "{prompt}"],
        noise,
        readiness: None,
        exit_input: "/quit\r",
        limited: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_is_noise() {
        let noise = defaults().unwrap().noise;
        assert_eq!(noise.matching_rule("Tips for getting started:"), Some("tips"));
        assert_eq!(noise.matching_rule("2. Be specific for the best results."), Some("tip_item"));
        assert_eq!(
            noise.matching_rule("~/src/app   no sandbox   gemini-2.5-pro (98% context left)"),
            Some("footer")
        );
        assert_eq!(noise.matching_rule("⠋ Thinking (esc to cancel, 2s)"), Some("spinner"));
        assert_eq!(noise.matching_rule("Here is the summary."), None);
    }
}

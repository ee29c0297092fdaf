//! Plain shell commands

use magi_runner::terminal_chrome;

use super::ProviderDefaults;

pub(super) fn defaults() -> Result<ProviderDefaults, regex::Error> {
    Ok(ProviderDefaults {
        command: "/bin/sh",
        args: &["-c", "{prompt}"],
        noise: terminal_chrome(),
        readiness: None,
        exit_input: "exit\r",
        limited: false,
    })
}

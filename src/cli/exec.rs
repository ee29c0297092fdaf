//! `magi exec`

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::run::run_profile;
use super::Printer;
use crate::providers::ProviderProfile;
use crate::settings::AppConfig;

pub async fn run(
    config: &AppConfig,
    command: Vec<String>,
    cwd: Option<PathBuf>,
    printer: Printer,
) -> Result<()> {
    let mut parts = command.into_iter();
    let program = parts.next().context("No command given")?;
    let profile = ProviderProfile::custom(program, parts.collect())?;
    run_profile(config, profile, "", cwd, printer).await
}

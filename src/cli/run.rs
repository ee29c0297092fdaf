//! `magi run`

use anyhow::{Context, Result};
use magi_runner::SessionManager;
use std::path::PathBuf;
use tracing::warn;

use super::Printer;
use crate::providers::{ProviderAdapter, ProviderKind, ProviderProfile};
use crate::settings::AppConfig;

pub async fn run(
    config: &AppConfig,
    kind: ProviderKind,
    prompt: &str,
    cwd: Option<PathBuf>,
    printer: Printer,
) -> Result<()> {
    let profile = ProviderProfile::resolve(kind, config.providers.get(kind.config_key()))?;
    run_profile(config, profile, prompt, cwd, printer).await
}

/// Stream one run of `profile`; Ctrl-C stops the session and releases its slot
pub(super) async fn run_profile(
    config: &AppConfig,
    profile: ProviderProfile,
    prompt: &str,
    cwd: Option<PathBuf>,
    printer: Printer,
) -> Result<()> {
    let cwd = resolve_cwd(cwd)?;
    let manager = SessionManager::new();
    let adapter = ProviderAdapter::from_config(profile, config, manager.clone()).await?;

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping sessions");
            manager.shutdown_all().await;
        }
    });

    let result = adapter.run(prompt, &cwd, |event| printer.event(&event)).await;
    interrupt.abort();

    let summary = result?;
    printer.summary(&summary);
    Ok(())
}

fn resolve_cwd(cwd: Option<PathBuf>) -> Result<PathBuf> {
    match cwd {
        Some(path) => path
            .canonicalize()
            .with_context(|| format!("Invalid working directory {}", path.display())),
        None => std::env::current_dir().context("Failed to read current directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_resolve_cwd() {
        assert!(resolve_cwd(None).unwrap().is_absolute());
        assert_eq!(
            resolve_cwd(Some(PathBuf::from("/"))).unwrap(),
            Path::new("/")
        );
        assert!(resolve_cwd(Some(PathBuf::from("/nonexistent/magi"))).is_err());
    }
}

//! `magi slots`

use anyhow::{Context, Result};
use chrono::Utc;
use magi_slots::SlotStore;

use super::Printer;
use crate::settings::AppConfig;

async fn open_store(config: &AppConfig) -> Result<SlotStore> {
    let path = config.slots.database_path(&config.data_dir);
    SlotStore::from_path(&path)
        .await
        .with_context(|| format!("Failed to open slot database {}", path.display()))
}

pub async fn list(config: &AppConfig, class: Option<&str>, printer: &Printer) -> Result<()> {
    let store = open_store(config).await?;
    let leases = store.list(class).await?;
    let cutoff = Utc::now() - chrono::Duration::seconds(config.slots.stale_after_secs as i64);
    printer.leases(&leases, cutoff);
    Ok(())
}

pub async fn purge(config: &AppConfig, printer: &Printer) -> Result<()> {
    let store = open_store(config).await?;
    let cutoff = Utc::now() - chrono::Duration::seconds(config.slots.stale_after_secs as i64);
    let purged = store.purge_stale(cutoff).await?;
    printer.purged(purged);
    Ok(())
}

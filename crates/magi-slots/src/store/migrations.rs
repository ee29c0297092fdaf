use super::SlotStore;
use crate::error::Result;

impl SlotStore {
    /// Create the lease table and indexes (idempotent)
    pub(super) async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS slot_leases (
                slot_id TEXT PRIMARY KEY,
                process_id TEXT NOT NULL,
                resource_class TEXT NOT NULL,
                resource_key TEXT NOT NULL,
                acquired_at INTEGER NOT NULL,
                last_heartbeat INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_leases_heartbeat ON slot_leases(last_heartbeat)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_leases_class ON slot_leases(resource_class)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}

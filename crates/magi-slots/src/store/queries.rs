use super::SlotStore;
use crate::error::Result;
use crate::lease::{LeaseRow, SlotLease};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::warn;
use uuid::Uuid;

impl SlotStore {
    /// Insert `lease` unless its class already holds `max_slots` leases.
    ///
    /// The count and insert run under `BEGIN IMMEDIATE`, which takes the
    /// database write lock before counting, so concurrent acquirers in any
    /// process are serialised. Returns `false` when the class is full.
    pub async fn insert_if_below(&self, lease: &SlotLease, max_slots: u32) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = count_and_insert(&mut conn, lease, max_slots).await;
        let finish = if matches!(result, Ok(true)) {
            "COMMIT"
        } else {
            "ROLLBACK"
        };

        if let Err(e) = sqlx::query(finish).execute(&mut *conn).await {
            warn!(error = %e, statement = finish, "Failed to end lease transaction");
            // Never hand a connection with an open transaction back to the pool
            drop(conn.detach());
            result?;
            return Err(e.into());
        }

        result
    }

    /// Delete leases whose heartbeat is older than `cutoff`
    pub async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM slot_leases WHERE last_heartbeat < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Refresh a lease's heartbeat; `false` if the row is gone
    pub async fn touch(&self, slot_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE slot_leases SET last_heartbeat = ? WHERE slot_id = ?")
            .bind(at.timestamp_millis())
            .bind(slot_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a lease; `false` if it was already gone
    pub async fn delete(&self, slot_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM slot_leases WHERE slot_id = ?")
            .bind(slot_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of leases of a class heartbeating since `cutoff`
    pub async fn count_live(&self, resource_class: &str, cutoff: DateTime<Utc>) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM slot_leases WHERE resource_class = ? AND last_heartbeat >= ?",
        )
        .bind(resource_class)
        .bind(cutoff.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Get a lease by ID
    pub async fn get(&self, slot_id: Uuid) -> Result<Option<SlotLease>> {
        let row: Option<LeaseRow> = sqlx::query_as("SELECT * FROM slot_leases WHERE slot_id = ?")
            .bind(slot_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(SlotLease::try_from).transpose()
    }

    /// List leases, optionally for one class, oldest first
    pub async fn list(&self, resource_class: Option<&str>) -> Result<Vec<SlotLease>> {
        let rows: Vec<LeaseRow> = match resource_class {
            Some(class) => {
                sqlx::query_as(
                    "SELECT * FROM slot_leases WHERE resource_class = ? ORDER BY acquired_at ASC",
                )
                .bind(class)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM slot_leases ORDER BY resource_class, acquired_at ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Insert a lease row as-is, bypassing the cap
    #[cfg(test)]
    pub(crate) async fn insert_raw(&self, lease: &SlotLease) -> Result<()> {
        insert(&mut *self.pool.acquire().await?, lease).await
    }
}

async fn count_and_insert(
    conn: &mut SqliteConnection,
    lease: &SlotLease,
    max_slots: u32,
) -> Result<bool> {
    let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM slot_leases WHERE resource_class = ?")
        .bind(&lease.resource_class)
        .fetch_one(&mut *conn)
        .await?;

    if live >= i64::from(max_slots) {
        return Ok(false);
    }

    insert(conn, lease).await?;
    Ok(true)
}

async fn insert(conn: &mut SqliteConnection, lease: &SlotLease) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO slot_leases (
            slot_id, process_id, resource_class, resource_key, acquired_at, last_heartbeat
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(lease.slot_id.to_string())
    .bind(&lease.process_id)
    .bind(&lease.resource_class)
    .bind(&lease.resource_key)
    .bind(lease.acquired_at.timestamp_millis())
    .bind(lease.last_heartbeat.timestamp_millis())
    .execute(conn)
    .await?;

    Ok(())
}

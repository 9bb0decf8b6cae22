use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Per-attachment serialization for column allocation. Two workers appending
/// to the same sheet concurrently could otherwise both see a field as missing
/// and create duplicate columns.
///
/// Implemented as a transaction-scoped Postgres advisory lock: dropping the
/// guard rolls the (write-free) transaction back and releases the lock, even
/// on panic or cancellation.
pub struct AttachmentLock {
    tx: Transaction<'static, Postgres>,
}

pub async fn lock_attachment(pool: &PgPool, id: Uuid) -> Result<AttachmentLock, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(lock_key(id))
        .execute(&mut *tx)
        .await?;
    Ok(AttachmentLock { tx })
}

impl AttachmentLock {
    pub async fn release(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

/// Advisory lock keys are i64; fold the uuid's high bits down.
fn lock_key(id: Uuid) -> i64 {
    (id.as_u128() >> 64) as i64
}

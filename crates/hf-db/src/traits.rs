//! Warehouse client trait

use crate::error::DbResult;
use crate::pool::ConnectionHandle;
use async_trait::async_trait;

/// The statement-execution surface the executor drives.
///
/// Implemented by [`ConnectionHandle`] for live warehouses; tests supply
/// in-process fakes. Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Execute one statement, returning rows affected
    async fn execute(&self, sql: &str) -> DbResult<u64>;

    /// Open an explicit transaction
    async fn begin(&self) -> DbResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> DbResult<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> DbResult<()>;
}

#[async_trait]
impl WarehouseClient for ConnectionHandle {
    async fn execute(&self, sql: &str) -> DbResult<u64> {
        ConnectionHandle::execute(self, sql).await
    }

    async fn begin(&self) -> DbResult<()> {
        ConnectionHandle::begin(self).await
    }

    async fn commit(&self) -> DbResult<()> {
        ConnectionHandle::commit(self).await
    }

    async fn rollback(&self) -> DbResult<()> {
        ConnectionHandle::rollback(self).await
    }
}

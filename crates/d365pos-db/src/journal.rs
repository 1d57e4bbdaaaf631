//! # Journal Store
//!
//! What the sale finalizer needs from local storage, behind a trait so the
//! finalizer can be tested against a mock.

use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::automock;

use d365pos_core::FinalizedTransaction;

use crate::error::DbResult;
use crate::pool::Database;

#[automock]
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Next receipt sequence number for a terminal on a business day.
    async fn next_receipt_sequence(&self, terminal_id: &str, day: NaiveDate) -> DbResult<u32>;

    /// Persists a finalized transaction atomically.
    async fn record(&self, transaction: &FinalizedTransaction) -> DbResult<()>;

    /// Full transaction by receipt id.
    async fn find_by_receipt(&self, receipt_id: &str) -> DbResult<Option<FinalizedTransaction>>;
}

#[async_trait]
impl JournalStore for Database {
    async fn next_receipt_sequence(&self, terminal_id: &str, day: NaiveDate) -> DbResult<u32> {
        self.transactions()
            .next_receipt_sequence(terminal_id, day)
            .await
    }

    async fn record(&self, transaction: &FinalizedTransaction) -> DbResult<()> {
        self.transactions().insert(transaction).await
    }

    async fn find_by_receipt(&self, receipt_id: &str) -> DbResult<Option<FinalizedTransaction>> {
        self.transactions().find_by_receipt(receipt_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;

    #[tokio::test]
    async fn test_database_as_journal_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: &dyn JournalStore = &db;
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        assert_eq!(store.next_receipt_sequence("T01", day).await.unwrap(), 1);
        assert!(store.find_by_receipt("T01-20261016-0001").await.unwrap().is_none());
    }
}

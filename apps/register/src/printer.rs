//! # Receipt Sinks
//!
//! Where formatted receipts go. Failures here are reported to the caller,
//! which logs them; a sale is never undone because a receipt did not print.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use d365pos_core::Receipt;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Receipt output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives every finalized receipt.
#[automock]
#[async_trait]
pub trait ReceiptSink: Send + Sync {
    async fn emit(&self, receipt: &Receipt) -> Result<(), SinkError>;
}

/// Writes receipts to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl ReceiptSink for StdoutSink {
    async fn emit(&self, receipt: &Receipt) -> Result<(), SinkError> {
        let mut out = tokio::io::stdout();
        out.write_all(receipt.render().as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
        Ok(())
    }
}

/// Appends receipts to a text file, one blank line between receipts.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink { path: path.into() }
    }
}

#[async_trait]
impl ReceiptSink for FileSink {
    async fn emit(&self, receipt: &Receipt) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(receipt.render().as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        debug!(path = ?self.path, receipt_id = %receipt.receipt_id, "Receipt archived");
        Ok(())
    }
}

/// Sends each receipt to several sinks; the first failure is returned after
/// every sink has been tried.
pub struct TeeSink {
    sinks: Vec<Arc<dyn ReceiptSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn ReceiptSink>>) -> Self {
        TeeSink { sinks }
    }
}

#[async_trait]
impl ReceiptSink for TeeSink {
    async fn emit(&self, receipt: &Receipt) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.emit(receipt).await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use d365pos_core::{BasketTotals, PaymentMethod, TransactionType};
    use rust_decimal::Decimal;

    fn receipt(id: &str) -> Receipt {
        Receipt {
            receipt_id: id.to_string(),
            transaction_type: TransactionType::Sale,
            totals: BasketTotals::default(),
            breakdown: vec![],
            method: PaymentMethod::Card,
            tendered: Decimal::ZERO,
            change: Decimal::ZERO,
            text_lines: vec!["HEADER".to_string(), format!("Receipt {}", id)],
        }
    }

    #[tokio::test]
    async fn test_file_sink_appends() {
        let path = std::env::temp_dir()
            .join(format!("d365pos-receipts-{}", uuid::Uuid::new_v4()))
            .join("receipts.txt");
        let sink = FileSink::new(&path);

        sink.emit(&receipt("R1")).await.unwrap();
        sink.emit(&receipt("R2")).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "HEADER\nReceipt R1\n\nHEADER\nReceipt R2\n\n");

        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[tokio::test]
    async fn test_tee_tries_every_sink() {
        let mut failing = MockReceiptSink::new();
        failing.expect_emit().times(1).returning(|_| {
            Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "paper out",
            )))
        });
        let mut working = MockReceiptSink::new();
        working.expect_emit().times(1).returning(|_| Ok(()));

        let tee = TeeSink::new(vec![Arc::new(failing), Arc::new(working)]);
        let err = tee.emit(&receipt("R1")).await.unwrap_err();
        assert!(err.to_string().contains("paper out"));
    }
}

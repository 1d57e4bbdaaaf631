//! # Transaction Repository
//!
//! The local journal of finalized transactions.
//!
//! ## Journal Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. RECEIPT ID                                                         │
//! │     └── next_receipt_sequence(terminal, day) → 1, 2, 3 …               │
//! │                                                                         │
//! │  2. INSERT (one SQLite transaction)                                    │
//! │     └── pos_transactions          header                               │
//! │     └── pos_transaction_lines     × N                                  │
//! │     └── pos_transaction_payments  0..1                                 │
//! │     └── pos_transaction_taxes     0..1                                 │
//! │                                                                         │
//! │  3. READ                                                               │
//! │     └── list_recent()            journal view                          │
//! │     └── find_by_receipt()        seed a return                         │
//! │                                                                         │
//! │  Rows are never updated. Corrections are new Void / Return rows.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use d365pos_core::amount::sum_amounts;
use d365pos_core::{
    FinalizedTransaction, PaymentMethod, PaymentType, TransactionHeader, TransactionLine,
    TransactionPayment, TransactionTax, TransactionType,
};

use super::{decimal_column, unsigned_column};
use crate::error::{DbError, DbResult};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct HeaderRow {
    transaction_id: String,
    store_id: String,
    terminal_id: String,
    shift_id: String,
    staff_id: String,
    receipt_id: String,
    business_date: NaiveDate,
    currency: String,
    total: String,
    transaction_type: i64,
    created_at: DateTime<Utc>,
}

impl HeaderRow {
    fn into_header(self) -> DbResult<TransactionHeader> {
        let transaction_type = TransactionType::from_code(self.transaction_type).ok_or_else(|| {
            DbError::invalid_data("transaction_type", self.transaction_type.to_string())
        })?;

        Ok(TransactionHeader {
            total: decimal_column("total", &self.total)?,
            transaction_type,
            transaction_id: self.transaction_id,
            store_id: self.store_id,
            terminal_id: self.terminal_id,
            shift_id: self.shift_id,
            staff_id: self.staff_id,
            receipt_id: self.receipt_id,
            business_date: self.business_date,
            currency: self.currency,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    line_num: i64,
    item_id: String,
    description: String,
    unit_id: String,
    quantity: String,
    unit_price: String,
    net_amount: String,
    tax_amount: String,
    gross_amount: String,
    disc_amount: String,
    disc_amount_without_tax: String,
}

impl LineRow {
    fn into_line(self) -> DbResult<TransactionLine> {
        Ok(TransactionLine {
            line_num: unsigned_column("line_num", self.line_num)?,
            quantity: decimal_column("quantity", &self.quantity)?,
            unit_price: decimal_column("unit_price", &self.unit_price)?,
            net_amount: decimal_column("net_amount", &self.net_amount)?,
            tax_amount: decimal_column("tax_amount", &self.tax_amount)?,
            gross_amount: decimal_column("gross_amount", &self.gross_amount)?,
            disc_amount: decimal_column("disc_amount", &self.disc_amount)?,
            disc_amount_without_tax: decimal_column(
                "disc_amount_without_tax",
                &self.disc_amount_without_tax,
            )?,
            item_id: self.item_id,
            description: self.description,
            unit_id: self.unit_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    payment_date_time: DateTime<Utc>,
    method: String,
    payment_type: String,
    currency: String,
    amount: String,
    tendered: String,
    change_amount: String,
}

impl PaymentRow {
    fn into_payment(self) -> DbResult<TransactionPayment> {
        let method: PaymentMethod = self
            .method
            .parse()
            .map_err(|_| DbError::invalid_data("method", self.method.as_str()))?;
        let payment_type = match self.payment_type.as_str() {
            "Payment" => PaymentType::Payment,
            "Refund" => PaymentType::Refund,
            other => return Err(DbError::invalid_data("payment_type", other)),
        };

        Ok(TransactionPayment {
            payment_date_time: self.payment_date_time,
            method,
            payment_type,
            amount: decimal_column("amount", &self.amount)?,
            tendered: decimal_column("tendered", &self.tendered)?,
            change: decimal_column("change_amount", &self.change_amount)?,
            currency: self.currency,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaxRow {
    tax_name: String,
    tax_rate: String,
    tax_amount: String,
}

impl TaxRow {
    fn into_tax(self) -> DbResult<TransactionTax> {
        Ok(TransactionTax {
            tax_rate: decimal_column("tax_rate", &self.tax_rate)?,
            tax_amount: decimal_column("tax_amount", &self.tax_amount)?,
            tax_name: self.tax_name,
        })
    }
}

// =============================================================================
// Journal View
// =============================================================================

/// One row of the journal view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub header: TransactionHeader,
    pub line_count: usize,
    /// Σ line net
    pub subtotal: Decimal,
    /// Σ tax record amounts
    pub tax: Decimal,
    /// Σ line gross
    pub total: Decimal,
}

impl JournalEntry {
    fn new(header: TransactionHeader, lines: &[TransactionLine], taxes: &[TransactionTax]) -> Self {
        JournalEntry {
            header,
            line_count: lines.len(),
            subtotal: sum_amounts(lines.iter().map(|l| l.net_amount)),
            tax: sum_amounts(taxes.iter().map(|t| t.tax_amount)),
            total: sum_amounts(lines.iter().map(|l| l.gross_amount)),
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the transaction journal.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Writes header, lines, payment and tax in one transaction.
    ///
    /// Either every row is written or none is.
    pub async fn insert(&self, transaction: &FinalizedTransaction) -> DbResult<()> {
        let header = &transaction.header;
        debug!(
            transaction_id = %header.transaction_id,
            receipt_id = %header.receipt_id,
            lines = transaction.lines.len(),
            "Inserting transaction"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO pos_transactions (
                transaction_id, store_id, terminal_id, shift_id, staff_id,
                receipt_id, business_date, currency, total, transaction_type,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&header.transaction_id)
        .bind(&header.store_id)
        .bind(&header.terminal_id)
        .bind(&header.shift_id)
        .bind(&header.staff_id)
        .bind(&header.receipt_id)
        .bind(header.business_date)
        .bind(&header.currency)
        .bind(header.total.to_string())
        .bind(header.transaction_type.code())
        .bind(header.created_at)
        .execute(&mut *tx)
        .await?;

        for line in &transaction.lines {
            sqlx::query(
                r#"
                INSERT INTO pos_transaction_lines (
                    transaction_id, line_num, item_id, description, unit_id,
                    quantity, unit_price, net_amount, tax_amount, gross_amount,
                    disc_amount, disc_amount_without_tax
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&header.transaction_id)
            .bind(i64::from(line.line_num))
            .bind(&line.item_id)
            .bind(&line.description)
            .bind(&line.unit_id)
            .bind(line.quantity.to_string())
            .bind(line.unit_price.to_string())
            .bind(line.net_amount.to_string())
            .bind(line.tax_amount.to_string())
            .bind(line.gross_amount.to_string())
            .bind(line.disc_amount.to_string())
            .bind(line.disc_amount_without_tax.to_string())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(payment) = &transaction.payment {
            sqlx::query(
                r#"
                INSERT INTO pos_transaction_payments (
                    transaction_id, payment_date_time, method, payment_type,
                    currency, amount, tendered, change_amount
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&header.transaction_id)
            .bind(payment.payment_date_time)
            .bind(payment.method.as_str())
            .bind(payment.payment_type.as_str())
            .bind(&payment.currency)
            .bind(payment.amount.to_string())
            .bind(payment.tendered.to_string())
            .bind(payment.change.to_string())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(tax) = &transaction.tax {
            sqlx::query(
                r#"
                INSERT INTO pos_transaction_taxes (
                    transaction_id, tax_name, tax_rate, tax_amount
                ) VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&header.transaction_id)
            .bind(&tax.tax_name)
            .bind(tax.tax_rate.to_string())
            .bind(tax.tax_amount.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets a header by transaction id.
    pub async fn get_by_id(&self, transaction_id: &str) -> DbResult<Option<TransactionHeader>> {
        let row: Option<HeaderRow> = sqlx::query_as(
            r#"
            SELECT transaction_id, store_id, terminal_id, shift_id, staff_id,
                   receipt_id, business_date, currency, total, transaction_type,
                   created_at
            FROM pos_transactions
            WHERE transaction_id = ?1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HeaderRow::into_header).transpose()
    }

    /// Gets a header by receipt id.
    pub async fn get_by_receipt(&self, receipt_id: &str) -> DbResult<Option<TransactionHeader>> {
        let row: Option<HeaderRow> = sqlx::query_as(
            r#"
            SELECT transaction_id, store_id, terminal_id, shift_id, staff_id,
                   receipt_id, business_date, currency, total, transaction_type,
                   created_at
            FROM pos_transactions
            WHERE receipt_id = ?1
            "#,
        )
        .bind(receipt_id.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(HeaderRow::into_header).transpose()
    }

    /// Lines of a transaction, by line number.
    pub async fn lines(&self, transaction_id: &str) -> DbResult<Vec<TransactionLine>> {
        let rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT line_num, item_id, description, unit_id, quantity, unit_price,
                   net_amount, tax_amount, gross_amount, disc_amount,
                   disc_amount_without_tax
            FROM pos_transaction_lines
            WHERE transaction_id = ?1
            ORDER BY line_num
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LineRow::into_line).collect()
    }

    pub async fn payments(&self, transaction_id: &str) -> DbResult<Vec<TransactionPayment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT payment_date_time, method, payment_type, currency, amount,
                   tendered, change_amount
            FROM pos_transaction_payments
            WHERE transaction_id = ?1
            ORDER BY id
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    pub async fn taxes(&self, transaction_id: &str) -> DbResult<Vec<TransactionTax>> {
        let rows: Vec<TaxRow> = sqlx::query_as(
            r#"
            SELECT tax_name, tax_rate, tax_amount
            FROM pos_transaction_taxes
            WHERE transaction_id = ?1
            ORDER BY id
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaxRow::into_tax).collect()
    }

    /// Header plus children, or None if the id is unknown.
    pub async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> DbResult<Option<FinalizedTransaction>> {
        match self.get_by_id(transaction_id).await? {
            Some(header) => self.assemble(header).await.map(Some),
            None => Ok(None),
        }
    }

    /// Full transaction by receipt id.
    pub async fn find_by_receipt(&self, receipt_id: &str) -> DbResult<Option<FinalizedTransaction>> {
        match self.get_by_receipt(receipt_id).await? {
            Some(header) => self.assemble(header).await.map(Some),
            None => Ok(None),
        }
    }

    async fn assemble(&self, header: TransactionHeader) -> DbResult<FinalizedTransaction> {
        let lines = self.lines(&header.transaction_id).await?;
        let payment = self.payments(&header.transaction_id).await?.into_iter().next();
        let tax = self.taxes(&header.transaction_id).await?.into_iter().next();

        Ok(FinalizedTransaction {
            header,
            lines,
            payment,
            tax,
        })
    }

    /// Newest transactions first, with journal totals.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<JournalEntry>> {
        let rows: Vec<HeaderRow> = sqlx::query_as(
            r#"
            SELECT transaction_id, store_id, terminal_id, shift_id, staff_id,
                   receipt_id, business_date, currency, total, transaction_type,
                   created_at
            FROM pos_transactions
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let header = row.into_header()?;
            let lines = self.lines(&header.transaction_id).await?;
            let taxes = self.taxes(&header.transaction_id).await?;
            entries.push(JournalEntry::new(header, &lines, &taxes));
        }

        debug!(count = entries.len(), "Journal listed");
        Ok(entries)
    }

    /// Next receipt sequence number for a terminal on a business day.
    pub async fn next_receipt_sequence(&self, terminal_id: &str, day: NaiveDate) -> DbResult<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM pos_transactions
            WHERE terminal_id = ?1 AND business_date = ?2
            "#,
        )
        .bind(terminal_id)
        .bind(day)
        .fetch_one(&self.pool)
        .await?;

        let count: u32 = unsigned_column("count", count)?;
        Ok(count + 1)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pos_transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn line(line_num: u32, qty: &str, net: &str, tax: &str, gross: &str) -> TransactionLine {
        TransactionLine {
            line_num,
            item_id: format!("ITEM{}", line_num),
            description: format!("Item {}", line_num),
            unit_id: "EA".to_string(),
            quantity: d(qty),
            unit_price: d("10.000"),
            net_amount: d(net),
            tax_amount: d(tax),
            gross_amount: d(gross),
            disc_amount: d("0.000"),
            disc_amount_without_tax: d("0.000"),
        }
    }

    fn sale(receipt_id: &str, day: NaiveDate) -> FinalizedTransaction {
        FinalizedTransaction {
            header: TransactionHeader {
                transaction_id: uuid::Uuid::new_v4().to_string(),
                store_id: "S01".to_string(),
                terminal_id: "T01".to_string(),
                shift_id: "1".to_string(),
                staff_id: "1001".to_string(),
                receipt_id: receipt_id.to_string(),
                business_date: day,
                currency: "SAR".to_string(),
                total: d("41.000"),
                transaction_type: TransactionType::Sale,
                created_at: Utc::now(),
            },
            lines: vec![
                line(1, "2", "20.000", "1.000", "21.000"),
                line(2, "1", "19.048", "0.952", "20.000"),
            ],
            payment: Some(TransactionPayment {
                payment_date_time: Utc::now(),
                method: PaymentMethod::Cash,
                payment_type: PaymentType::Payment,
                currency: "SAR".to_string(),
                amount: d("41.000"),
                tendered: d("50.000"),
                change: d("9.000"),
            }),
            tax: Some(TransactionTax {
                tax_name: "VAT".to_string(),
                tax_rate: d("5"),
                tax_amount: d("1.952"),
            }),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();
        let transaction = sale("T01-20261016-0001", day());

        repo.insert(&transaction).await.unwrap();

        let loaded = repo
            .get_transaction(&transaction.header.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.header.receipt_id, "T01-20261016-0001");
        assert_eq!(loaded.lines, transaction.lines);
        assert_eq!(loaded.payment.unwrap().change, d("9.000"));
        assert_eq!(loaded.tax.unwrap().tax_amount, d("1.952"));
    }

    #[tokio::test]
    async fn test_find_by_receipt() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();
        repo.insert(&sale("T01-20261016-0001", day())).await.unwrap();

        let found = repo.find_by_receipt(" T01-20261016-0001 ").await.unwrap();
        assert_eq!(found.unwrap().lines.len(), 2);
        assert!(repo.find_by_receipt("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_receipt_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();
        repo.insert(&sale("T01-20261016-0001", day())).await.unwrap();

        let duplicate = sale("T01-20261016-0001", day());
        let err = repo.insert(&duplicate).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate { .. }));

        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo
            .lines(&duplicate.header.transaction_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_journal_totals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();
        repo.insert(&sale("T01-20261016-0001", day())).await.unwrap();

        let entries = repo.list_recent(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].line_count, 2);
        assert_eq!(entries[0].subtotal, d("39.048"));
        assert_eq!(entries[0].tax, d("1.952"));
        assert_eq!(entries[0].total, d("41.000"));
    }

    #[tokio::test]
    async fn test_receipt_sequence_per_terminal_and_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();

        assert_eq!(repo.next_receipt_sequence("T01", day()).await.unwrap(), 1);
        repo.insert(&sale("T01-20261016-0001", day())).await.unwrap();
        repo.insert(&sale("T01-20261016-0002", day())).await.unwrap();

        assert_eq!(repo.next_receipt_sequence("T01", day()).await.unwrap(), 3);
        assert_eq!(repo.next_receipt_sequence("T02", day()).await.unwrap(), 1);
        let tomorrow = day().succ_opt().unwrap();
        assert_eq!(repo.next_receipt_sequence("T01", tomorrow).await.unwrap(), 1);
    }
}

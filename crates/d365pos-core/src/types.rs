//! # Domain Types
//!
//! Catalog records fed by the ERP and the records of a finalized transaction.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Catalog (read-only snapshot)                      │
//! │                                                                         │
//! │  ┌──────────────┐ 1    * ┌──────────────┐                               │
//! │  │   Product    │───────►│  UnitPrice   │  keyed (item_id, unit_id)     │
//! │  │  item_id     │        │  unit_price  │                               │
//! │  │  barcode     │        │  incl. tax?  │                               │
//! │  │  plu_code    │        └──────────────┘                               │
//! │  └──────────────┘                                                       │
//! │                                                                         │
//! │  ┌──────────────┐ 1    * ┌──────────────┐                               │
//! │  │ BarcodeMask  │───────►│ MaskSegment  │  ordered by segment_number    │
//! │  │  prefix      │        │  Product/    │                               │
//! │  │  length      │        │  Price/...   │                               │
//! │  └──────────────┘        └──────────────┘                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  FinalizedTransaction (immutable)                       │
//! │                                                                         │
//! │  TransactionHeader ──┬── TransactionLine × N                            │
//! │                      ├── TransactionPayment (0..1)                      │
//! │                      └── TransactionTax     (0..1)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog
// =============================================================================

/// A sellable product as published by the ERP for this store.
///
/// Immutable for the lifetime of a sale session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Stable ERP item number.
    pub item_id: String,

    /// Default sales unit (e.g. "EA", "KG").
    pub unit_id: String,

    /// Primary barcode, unique within a catalog snapshot.
    pub barcode: String,

    pub description: String,

    /// Arabic description carried by the ERP feed, used on receipts when set.
    pub description_ar: Option<String>,

    /// Price-Look-Up code used by weight/price embedded barcodes.
    pub plu_code: Option<String>,

    pub tax_group: String,

    /// Tax rate as a fraction (0.05 = 5%).
    pub tax_factor: Decimal,
}

/// Price of an item in a given unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPrice {
    pub item_id: String,
    pub unit_id: String,
    pub unit_price: Decimal,

    /// ERP "price includes tax" amount. Any value above zero means the
    /// listed price already contains tax.
    pub price_include_tax: Decimal,
}

impl UnitPrice {
    /// True when the listed price already contains tax.
    pub fn includes_tax(&self) -> bool {
        self.price_include_tax > Decimal::ZERO
    }
}

/// Kind of field a mask segment encodes.
///
/// The ERP defines more segment kinds than the register decodes; anything
/// other than Product and Price is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SegmentType {
    Product,
    Price,
    Quantity,
    Other(String),
}

impl SegmentType {
    pub fn as_str(&self) -> &str {
        match self {
            SegmentType::Product => "Product",
            SegmentType::Price => "Price",
            SegmentType::Quantity => "Quantity",
            SegmentType::Other(other) => other,
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for SegmentType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "product" => SegmentType::Product,
            "price" => SegmentType::Price,
            "quantity" => SegmentType::Quantity,
            _ => SegmentType::Other(value),
        }
    }
}

impl From<SegmentType> for String {
    fn from(value: SegmentType) -> Self {
        value.as_str().to_string()
    }
}

/// One fixed-width field of a barcode mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskSegment {
    pub segment_number: u32,
    pub segment_type: SegmentType,

    /// Field width in characters.
    pub length: usize,

    /// Implied decimal places (price segments only).
    pub decimals: u32,

    /// Mask fill character as configured in the ERP.
    pub fill_char: Option<String>,
}

/// Template for barcodes that embed a PLU and a price.
///
/// ## Example
/// ```text
/// prefix = 21, length = 13
///
///   2 1 │ 1 2 3 4 5 │ 0 0 3 2 9 9
///  ─────┼───────────┼─────────────
///  prefix  Product      Price (2 dp)
///           PLU         → 32.99
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeMask {
    pub mask_id: String,
    pub description: String,

    /// Mask pattern text as shown in the ERP.
    pub mask: String,

    pub prefix: u32,

    /// Total barcode length, prefix included.
    pub length: usize,

    /// Segments, kept sorted by `segment_number`.
    pub segments: Vec<MaskSegment>,
}

impl BarcodeMask {
    /// Prefix as it appears at the start of a barcode.
    pub fn prefix_text(&self) -> String {
        self.prefix.to_string()
    }

    /// True when `code` starts with the prefix and has exactly the mask length.
    pub fn matches(&self, code: &str) -> bool {
        code.len() == self.length && code.starts_with(&self.prefix_text())
    }

    /// Sorts segments by segment number.
    pub fn sort_segments(&mut self) {
        self.segments.sort_by_key(|s| s.segment_number);
    }

    /// First segment of the given type.
    pub fn segment(&self, segment_type: &SegmentType) -> Option<&MaskSegment> {
        self.segments.iter().find(|s| &s.segment_type == segment_type)
    }
}

// =============================================================================
// Transaction Enums
// =============================================================================

/// Transaction type as recorded in the journal.
///
/// ## Stored Values
/// ```text
/// Sale = 0   Return = 1   Void = 2   Exchange = 3
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Return,
    Void,
    Exchange,
}

impl TransactionType {
    pub fn code(&self) -> i64 {
        match self {
            TransactionType::Sale => 0,
            TransactionType::Return => 1,
            TransactionType::Void => 2,
            TransactionType::Exchange => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TransactionType::Sale),
            1 => Some(TransactionType::Return),
            2 => Some(TransactionType::Void),
            3 => Some(TransactionType::Exchange),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Sale => write!(f, "Sale"),
            TransactionType::Return => write!(f, "Return"),
            TransactionType::Void => write!(f, "Void"),
            TransactionType::Exchange => write!(f, "Exchange"),
        }
    }
}

/// Tender used to settle a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
}

impl PaymentMethod {
    /// Payment method name expected by the ERP.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            other => Err(format!("Unknown payment method: '{}'", other)),
        }
    }
}

/// Direction of the money movement on a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Customer pays the register.
    Payment,
    /// Register pays the customer back (net negative total).
    Refund,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Payment => "Payment",
            PaymentType::Refund => "Refund",
        }
    }

    /// Payment for totals >= 0, refund below zero.
    pub fn for_total(total: Decimal) -> Self {
        if total < Decimal::ZERO {
            PaymentType::Refund
        } else {
            PaymentType::Payment
        }
    }
}

/// Per-line action code sent with each ERP item entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineAction {
    Sale,
    Return,
    Void,
}

impl LineAction {
    pub fn code(&self) -> i32 {
        match self {
            LineAction::Sale => 0,
            LineAction::Return => 1,
            LineAction::Void => 2,
        }
    }

    /// Sale for positive quantities, Return for negative ones.
    pub fn for_quantity(quantity: Decimal) -> Self {
        if quantity < Decimal::ZERO {
            LineAction::Return
        } else {
            LineAction::Sale
        }
    }
}

// =============================================================================
// Finalized Transaction
// =============================================================================

/// Journal header of a finalized transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHeader {
    /// Local identifier (UUID v4).
    pub transaction_id: String,
    pub store_id: String,
    pub terminal_id: String,
    pub shift_id: String,
    pub staff_id: String,
    pub receipt_id: String,
    pub business_date: NaiveDate,
    pub currency: String,
    pub total: Decimal,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
}

/// One sales line of a finalized transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLine {
    pub line_num: u32,
    pub item_id: String,
    pub description: String,
    pub unit_id: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub net_amount: Decimal,
    pub tax_amount: Decimal,
    pub gross_amount: Decimal,
    pub disc_amount: Decimal,
    pub disc_amount_without_tax: Decimal,
}

/// The single payment record of a finalized transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayment {
    pub payment_date_time: DateTime<Utc>,
    pub method: PaymentMethod,
    pub payment_type: PaymentType,
    pub currency: String,

    /// Amount settled (equals the transaction total).
    pub amount: Decimal,

    /// Cash handed over by the customer (equals `amount` for card).
    pub tendered: Decimal,

    pub change: Decimal,
}

/// The single aggregated tax record of a finalized transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTax {
    pub tax_name: String,

    /// Percentage (5 = 5%).
    pub tax_rate: Decimal,

    pub tax_amount: Decimal,
}

/// Header plus children, exactly as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedTransaction {
    pub header: TransactionHeader,
    pub lines: Vec<TransactionLine>,
    pub payment: Option<TransactionPayment>,
    pub tax: Option<TransactionTax>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(prefix: u32, length: usize) -> BarcodeMask {
        BarcodeMask {
            mask_id: "M1".to_string(),
            description: "Weighed items".to_string(),
            mask: "21XXXXXPPPPPP".to_string(),
            prefix,
            length,
            segments: vec![],
        }
    }

    #[test]
    fn test_mask_matches_prefix_and_length() {
        let m = mask(21, 13);
        assert!(m.matches("2112345003299"));
        assert!(!m.matches("211234500329"));
        assert!(!m.matches("2212345003299"));
    }

    #[test]
    fn test_segment_type_parsing() {
        assert_eq!(SegmentType::from("Product".to_string()), SegmentType::Product);
        assert_eq!(SegmentType::from("price".to_string()), SegmentType::Price);
        assert_eq!(
            SegmentType::from("Employee".to_string()),
            SegmentType::Other("Employee".to_string())
        );
        assert_eq!(String::from(SegmentType::Price), "Price");
    }

    #[test]
    fn test_transaction_type_codes() {
        for t in [
            TransactionType::Sale,
            TransactionType::Return,
            TransactionType::Void,
            TransactionType::Exchange,
        ] {
            assert_eq!(TransactionType::from_code(t.code()), Some(t));
        }
        assert_eq!(TransactionType::from_code(9), None);
    }

    #[test]
    fn test_price_includes_tax_flag() {
        let mut price = UnitPrice {
            item_id: "A".to_string(),
            unit_id: "EA".to_string(),
            unit_price: Decimal::new(1000, 2),
            price_include_tax: Decimal::ZERO,
        };
        assert!(!price.includes_tax());
        price.price_include_tax = Decimal::ONE;
        assert!(price.includes_tax());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("CASH".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("card".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_line_action_follows_sign() {
        assert_eq!(LineAction::for_quantity(Decimal::ONE), LineAction::Sale);
        assert_eq!(LineAction::for_quantity(-Decimal::ONE), LineAction::Return);
        assert_eq!(PaymentType::for_total(Decimal::new(-5, 0)), PaymentType::Refund);
    }
}

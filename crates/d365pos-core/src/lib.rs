//! # d365pos-core: Pure Business Logic for the D365 POS Register
//!
//! Barcode resolution, the basket ledger, line tax computation, tender
//! validation and receipt layout. Nothing in here touches a database, the
//! network or the file system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        D365 POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Register app (d365pos binary)                   │   │
//! │  │    scan ──► basket ──► confirm ──► commit ──► receipt           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ d365pos-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  barcode  │  │  basket   │  │    tax    │  │  tender   │  │   │
//! │  │   │ Resolver  │  │  Basket   │  │ TaxEngine │  │ Confirm.  │  │   │
//! │  │   │  masks    │  │  totals   │  │ incl/excl │  │  change   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌──────────────────────────┐  │  ┌─────────────────────────────────┐  │
//! │  │ d365pos-db (journal,     │◄─┴─►│ d365pos-sync (ERP catalog and   │  │
//! │  │ catalog snapshot)        │     │ recordSales)                    │  │
//! │  └──────────────────────────┘     └─────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog and journal records
//! - [`amount`] - 3-decimal rounding and formatting
//! - [`catalog`] - Indexed read-only catalog snapshot
//! - [`barcode`] - Scanned code → product + quantity
//! - [`tax`] - Inclusive / exclusive line tax
//! - [`basket`] - The basket ledger
//! - [`tender`] - Tender validation and change
//! - [`journal`] - Finalized sale and void records
//! - [`receipt`] - Fixed-width receipt layout
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use d365pos_core::tax::{TaxEngine, TaxRegime};
//! use rust_decimal::Decimal;
//!
//! // 1 × 10.500 tax-inclusive at 5%
//! let amounts = TaxEngine::compute_line(
//!     Decimal::ONE,
//!     Decimal::new(10_500, 3),
//!     Decimal::new(5, 2),
//!     TaxRegime::Inclusive,
//! );
//!
//! assert_eq!(amounts.net, Decimal::new(10_000, 3));
//! assert_eq!(amounts.tax, Decimal::new(500, 3));
//! assert_eq!(amounts.gross, amounts.net + amounts.tax);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod amount;
pub mod barcode;
pub mod basket;
pub mod catalog;
pub mod error;
pub mod journal;
pub mod receipt;
pub mod tax;
pub mod tender;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use barcode::{BarcodeResolver, MatchSource, Resolution};
pub use basket::{Basket, BasketLine, BasketTotals};
pub use catalog::Catalog;
pub use error::{CoreError, CoreResult, ValidationError};
pub use journal::{aggregate_tax, build_sale, build_void, format_receipt_id, TransactionContext};
pub use receipt::{Receipt, ReceiptContext, ReceiptFormatter};
pub use tax::{LineAmounts, TaxEngine, TaxRegime};
pub use tender::{compute_confirmation, ConfirmationDetails, ConfirmedLine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines in a single basket, void lines included.
pub const MAX_BASKET_LINES: usize = 200;

/// Maximum magnitude of a single line quantity.
///
/// Catches a price typed into the quantity field (9999 is above any
/// realistic weighed or counted quantity).
pub const MAX_LINE_QUANTITY: rust_decimal::Decimal = rust_decimal::Decimal::from_parts(9999, 0, 0, false, 0);

/// Longest barcode / item id / PLU the resolver accepts.
pub const MAX_CODE_LENGTH: usize = 64;

/// Tax name written to the journal and sent to the ERP.
pub const DEFAULT_TAX_NAME: &str = "VAT";

//! # Register Commands
//!
//! Every operation the console and the CLI can run.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs      ◄─── You are here (exports)
//! ├── basket.rs   ◄─── Scan, quantity correction, return seeding
//! ├── sale.rs     ◄─── Payment confirmation/commit, voids
//! ├── catalog.rs  ◄─── ERP catalog sync, price check, search
//! ├── sign_in.rs  ◄─── Operator sign-in, company/store lookup
//! └── journal.rs  ◄─── Finalized transaction views
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Command Flow                                         │
//! │                                                                         │
//! │  console line "qty 2 3"   or   `d365pos price-check MILK1L`             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  fn set_quantity(                                                       │
//! │      session: &SessionState,  ◄── only the state it needs              │
//! │      line_num: u32,                                                     │
//! │      quantity: Decimal,                                                 │
//! │  ) -> Result<BasketResponse, ApiError>                                  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  printed as text, or as JSON with --json                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod basket;
pub mod catalog;
pub mod journal;
pub mod sale;
pub mod sign_in;

pub use basket::{
    get_basket, scan_code, seed_return, set_quantity, BasketResponse, ReturnSeedResponse,
    ScanResponse,
};
pub use catalog::{
    price_check, search_products, sync_catalog, PriceCheckResponse, SyncResponse,
    SyncStepSummary,
};
pub use journal::{list_journal, show_receipt, JournalRow};
pub use sale::{
    cancel_transaction, commit_payment, confirm_payment, void_line, PaymentPrompt, SaleResponse,
};
pub use sign_in::{sign_in, SignInResponse};

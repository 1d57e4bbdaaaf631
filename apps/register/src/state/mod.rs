//! # State Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌────────────────────┐  ┌─────────────────────┐     │
//! │  │  AppConfig   │  │   SessionState     │  │   Database          │     │
//! │  │  (read-only) │  │  Mutex<Basket>     │  │  (sqlx pool,        │     │
//! │  │  erp, store, │  │  RwLock<Catalog>   │  │   thread-safe)      │     │
//! │  │  receipt, db │  │  AtomicBool busy   │  │                     │     │
//! │  └──────────────┘  └────────────────────┘  └─────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod session;

pub use config::{AppConfig, DatabaseSettings, ReceiptSettings, StoreSettings};
pub use session::{BusyGuard, SessionState};

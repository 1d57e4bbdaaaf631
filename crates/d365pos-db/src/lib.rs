//! # d365pos-db: Local Storage for the D365 POS Register
//!
//! SQLite storage for the catalog snapshot and the transaction journal,
//! through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  catalog sync ──────┐                 ┌────── sale finalizer            │
//! │                     ▼                 ▼                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   d365pos-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │◄───│ CatalogRepository  │  │ (embedded) │  │   │
//! │  │   │  SqlitePool   │    │ TransactionRepo.   │  │ 001_init   │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   JournalStore: the finalizer's view of the journal             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (default: platform data dir / d365pos.db)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use d365pos_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("register.db")).await?;
//! let catalog = db.catalog().load_catalog().await?;
//! let recent = db.transactions().list_recent(20).await?;
//! ```

pub mod error;
pub mod journal;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use journal::{JournalStore, MockJournalStore};
pub use pool::{Database, DbConfig};

pub use repository::catalog::{CatalogCounts, CatalogRepository};
pub use repository::transaction::{JournalEntry, TransactionRepository};

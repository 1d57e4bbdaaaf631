//! # Session State
//!
//! The single active transaction of a register session.
//!
//! ## Thread Safety
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Session State                                        │
//! │                                                                         │
//! │  basket  : Mutex<Basket>          one writer at a time                 │
//! │  catalog : RwLock<Arc<Catalog>>   swapped whole after a sync           │
//! │  busy    : AtomicBool             raised while an ERP call is awaited  │
//! │                                                                         │
//! │  Every mutation first checks `busy` and fails fast with Busy.          │
//! │  The basket lock is never held across an await.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::debug;

use d365pos_core::{Basket, Catalog};

use crate::error::ApiError;

/// Basket, catalog snapshot and busy flag of one register.
#[derive(Debug)]
pub struct SessionState {
    basket: Mutex<Basket>,
    catalog: RwLock<Arc<Catalog>>,
    busy: AtomicBool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Catalog::empty())
    }
}

impl SessionState {
    pub fn new(catalog: Catalog) -> Self {
        SessionState {
            basket: Mutex::new(Basket::new()),
            catalog: RwLock::new(Arc::new(catalog)),
            busy: AtomicBool::new(false),
        }
    }

    /// Current catalog snapshot.
    pub fn catalog(&self) -> Arc<Catalog> {
        match self.catalog.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Installs a freshly loaded catalog. Lines already in the basket keep
    /// their snapshotted prices.
    pub fn replace_catalog(&self, catalog: Catalog) {
        let mut guard = match self.catalog.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!(products = catalog.product_count(), "Catalog snapshot replaced");
        *guard = Arc::new(catalog);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Raises the busy flag for the lifetime of the guard.
    ///
    /// Fails with `Busy` when another operation holds it.
    pub fn begin_busy(&self) -> Result<BusyGuard<'_>, ApiError> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ApiError::busy())?;
        Ok(BusyGuard { flag: &self.busy })
    }

    /// Runs `f` on the basket (read only).
    pub fn with_basket<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Basket) -> R,
    {
        f(&self.lock())
    }

    /// Runs `f` on the basket, rejecting the call while busy.
    pub fn with_basket_mut<F, R>(&self, f: F) -> Result<R, ApiError>
    where
        F: FnOnce(&mut Basket) -> Result<R, ApiError>,
    {
        if self.is_busy() {
            return Err(ApiError::busy());
        }
        f(&mut self.lock())
    }

    /// Basket mutation used by the finalizer, which already holds the busy flag.
    pub(crate) fn with_basket_while_busy<F, R>(&self, _guard: &BusyGuard<'_>, f: F) -> R
    where
        F: FnOnce(&mut Basket) -> R,
    {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Basket> {
        match self.basket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Clears the busy flag when dropped.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_busy_flag_blocks_mutations() {
        let session = SessionState::default();

        let guard = session.begin_busy().unwrap();
        assert!(session.is_busy());
        assert!(matches!(
            session.begin_busy().unwrap_err().code,
            ErrorCode::Busy
        ));
        let err = session.with_basket_mut(|_| Ok(())).unwrap_err();
        assert!(matches!(err.code, ErrorCode::Busy));

        drop(guard);
        assert!(!session.is_busy());
        assert!(session.with_basket_mut(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_replace_catalog() {
        let session = SessionState::default();
        assert!(session.catalog().is_empty());

        let old = session.catalog();
        session.replace_catalog(Catalog::empty());
        assert!(!Arc::ptr_eq(&old, &session.catalog()));
    }
}

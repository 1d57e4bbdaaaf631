//! # Product Catalog Snapshot
//!
//! Read-only lookup tables loaded from storage when a register session starts.
//!
//! ## Indexes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products: Vec<Product>            (catalog order preserved)           │
//! │     │                                                                   │
//! │     ├── by_barcode  : barcode       → index   (direct match)           │
//! │     ├── by_item_id  : item_id       → index   (direct match, returns)  │
//! │     └── by_plu      : normalized PLU → index  (mask match)             │
//! │                                                                         │
//! │  prices : (item_id, unit_id) → UnitPrice                               │
//! │  masks  : Vec<BarcodeMask>         (segments sorted, catalog order)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! When two products share a key, the first one in catalog order wins.

use std::collections::HashMap;

use crate::types::{BarcodeMask, Product, UnitPrice};

/// Immutable catalog snapshot with lookup indexes.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    prices: HashMap<(String, String), UnitPrice>,
    masks: Vec<BarcodeMask>,
    by_barcode: HashMap<String, usize>,
    by_item_id: HashMap<String, usize>,
    by_plu: HashMap<String, usize>,
}

impl Catalog {
    /// Builds the snapshot and its indexes.
    pub fn new(products: Vec<Product>, prices: Vec<UnitPrice>, masks: Vec<BarcodeMask>) -> Self {
        let mut by_barcode = HashMap::new();
        let mut by_item_id = HashMap::new();
        let mut by_plu = HashMap::new();

        for (idx, product) in products.iter().enumerate() {
            if !product.barcode.is_empty() {
                by_barcode.entry(product.barcode.clone()).or_insert(idx);
            }
            by_item_id.entry(product.item_id.clone()).or_insert(idx);
            if let Some(plu) = product.plu_code.as_deref() {
                if !plu.trim().is_empty() {
                    by_plu.entry(normalize_plu(plu)).or_insert(idx);
                }
            }
        }

        let mut price_index = HashMap::with_capacity(prices.len());
        for price in prices {
            price_index
                .entry((price.item_id.clone(), price.unit_id.clone()))
                .or_insert(price);
        }

        let masks = masks
            .into_iter()
            .map(|mut mask| {
                mask.sort_segments();
                mask
            })
            .collect();

        Catalog {
            products,
            prices: price_index,
            masks,
            by_barcode,
            by_item_id,
            by_plu,
        }
    }

    /// An empty catalog (nothing synced yet).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn masks(&self) -> &[BarcodeMask] {
        &self.masks
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn price_count(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Product whose barcode is exactly `barcode`.
    pub fn by_barcode(&self, barcode: &str) -> Option<&Product> {
        self.by_barcode.get(barcode).map(|&idx| &self.products[idx])
    }

    /// Product whose item id is exactly `item_id`.
    pub fn by_item_id(&self, item_id: &str) -> Option<&Product> {
        self.by_item_id.get(item_id).map(|&idx| &self.products[idx])
    }

    /// Product with the given PLU. Leading zeros are not significant.
    pub fn by_plu(&self, plu: &str) -> Option<&Product> {
        self.by_plu
            .get(&normalize_plu(plu))
            .map(|&idx| &self.products[idx])
    }

    /// Unit price for an (item, unit) pair.
    pub fn unit_price(&self, item_id: &str, unit_id: &str) -> Option<&UnitPrice> {
        self.prices.get(&(item_id.to_string(), unit_id.to_string()))
    }

    /// All unit prices of an item, item id compared case-insensitively.
    ///
    /// Sorted by unit id so the price-check listing is stable.
    pub fn prices_for(&self, item_id: &str) -> Vec<&UnitPrice> {
        let mut prices: Vec<&UnitPrice> = self
            .prices
            .values()
            .filter(|p| p.item_id.eq_ignore_ascii_case(item_id))
            .collect();
        prices.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        prices
    }

    /// Case-insensitive substring search over description, barcode and item id.
    ///
    /// An empty query returns the first `limit` products.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Product> {
        let needle = query.trim().to_lowercase();
        self.products
            .iter()
            .filter(|p| {
                needle.is_empty()
                    || p.description.to_lowercase().contains(&needle)
                    || p.barcode.to_lowercase().contains(&needle)
                    || p.item_id.to_lowercase().contains(&needle)
            })
            .take(limit)
            .collect()
    }
}

/// PLU codes are numeric in the ERP; "00123" and "123" are the same code.
fn normalize_plu(plu: &str) -> String {
    let trimmed = plu.trim().trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

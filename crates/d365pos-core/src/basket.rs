//! # Basket Ledger
//!
//! The in-memory order of the transaction being rung up.
//!
//! ## Line Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_or_increment(product, unit, qty)                                  │
//! │       │                                                                 │
//! │       ├── active line with same (item, unit)? ──► qty += n,            │
//! │       │                                           price refreshed      │
//! │       └── otherwise ─────────────────────────────► new line,           │
//! │                                                    price snapshotted   │
//! │                                                                         │
//! │  set_quantity(line, qty) ──► corrected qty, price refreshed            │
//! │  void_line(line)         ──► is_void = true (line stays visible)       │
//! │  seed_return(lines)      ──► add_or_increment(…, −qty) per line        │
//! │  reset()                 ──► empty basket, zero totals                 │
//! │                                                                         │
//! │  EVERY mutation ends with recompute(): totals are rebuilt from the     │
//! │  active lines, never patched incrementally.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Voided lines are skipped when looking for a line to increment, so
//! re-adding a voided item opens a fresh line.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::{round_amount, sum_amounts};
use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::tax::{LineAmounts, TaxEngine, TaxRegime};
use crate::types::{Product, TransactionLine, TransactionType, UnitPrice};
use crate::validation::{validate_line_quantity, validate_quantity, validate_quantity_limit};
use crate::MAX_BASKET_LINES;

// =============================================================================
// Basket Line
// =============================================================================

/// One line of the basket.
///
/// Price, tax flag and tax factor are copies taken from the catalog when the
/// line was added or last updated; the catalog itself is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketLine {
    /// 1-based, never reused within a basket.
    pub line_num: u32,
    pub item_id: String,
    pub unit_id: String,
    pub description: String,

    /// Signed: negative for returned goods.
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub price_includes_tax: bool,
    pub tax_factor: Decimal,
    pub is_void: bool,
    pub added_at: DateTime<Utc>,
}

impl BasketLine {
    fn new(line_num: u32, product: &Product, price: &UnitPrice, quantity: Decimal) -> Self {
        BasketLine {
            line_num,
            item_id: product.item_id.clone(),
            unit_id: price.unit_id.clone(),
            description: product.description.clone(),
            quantity,
            unit_price: price.unit_price,
            price_includes_tax: price.includes_tax(),
            tax_factor: product.tax_factor,
            is_void: false,
            added_at: Utc::now(),
        }
    }

    fn refresh_price(&mut self, price: &UnitPrice) {
        self.unit_price = price.unit_price;
        self.price_includes_tax = price.includes_tax();
    }

    /// quantity × unit price, unrounded.
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    pub fn regime(&self) -> TaxRegime {
        TaxRegime::from_flag(self.price_includes_tax)
    }

    /// Rounded tax, net and gross of this line.
    pub fn amounts(&self) -> LineAmounts {
        TaxEngine::compute_line(self.quantity, self.unit_price, self.tax_factor, self.regime())
    }

    /// Journal record of this line.
    pub fn to_transaction_line(&self) -> TransactionLine {
        let amounts = self.amounts();
        TransactionLine {
            line_num: self.line_num,
            item_id: self.item_id.clone(),
            description: self.description.clone(),
            unit_id: self.unit_id.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            net_amount: amounts.net,
            tax_amount: amounts.tax,
            gross_amount: amounts.gross,
            disc_amount: round_amount(Decimal::ZERO),
            disc_amount_without_tax: round_amount(Decimal::ZERO),
        }
    }

    /// Journal record of this line with every amount zeroed (void journal).
    pub fn to_void_line(&self) -> TransactionLine {
        let zero = LineAmounts::zero();
        TransactionLine {
            net_amount: zero.net,
            tax_amount: zero.tax,
            gross_amount: zero.gross,
            ..self.to_transaction_line()
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Running totals over the active (non-void) lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketTotals {
    pub active_lines: usize,
    /// Σ line net (the receipt "subtotal").
    pub net: Decimal,
    pub tax: Decimal,
    /// Σ line gross (amount due).
    pub gross: Decimal,
}

// =============================================================================
// Basket
// =============================================================================

/// The basket ledger.
///
/// ## Invariants
/// - `totals` always equals the sum of the active lines' rounded amounts
/// - Line numbers are unique and increasing
/// - At most [`MAX_BASKET_LINES`] lines (void ones included)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    lines: Vec<BasketLine>,
    totals: BasketTotals,
    next_line_num: u32,
    pub created_at: DateTime<Utc>,
}

impl Default for Basket {
    fn default() -> Self {
        Self::new()
    }
}

impl Basket {
    pub fn new() -> Self {
        Basket {
            lines: Vec::new(),
            totals: BasketTotals::default(),
            next_line_num: 1,
            created_at: Utc::now(),
        }
    }

    /// All lines, void ones included, in insertion order.
    pub fn lines(&self) -> &[BasketLine] {
        &self.lines
    }

    /// Non-void lines.
    pub fn active_lines(&self) -> impl Iterator<Item = &BasketLine> {
        self.lines.iter().filter(|l| !l.is_void)
    }

    pub fn line(&self, line_num: u32) -> Option<&BasketLine> {
        self.lines.iter().find(|l| l.line_num == line_num)
    }

    pub fn totals(&self) -> BasketTotals {
        self.totals
    }

    /// True when there is nothing to finalize.
    pub fn is_empty(&self) -> bool {
        self.totals.active_lines == 0
    }

    /// Adds a product or increments its active line.
    ///
    /// ## Arguments
    /// * `product` - catalog product
    /// * `unit_id` - unit to sell in (usually `product.unit_id`)
    /// * `quantity` - signed quantity; negative for returns
    /// * `catalog` - current snapshot, source of the unit price
    ///
    /// ## Returns
    /// The line number that was created or incremented.
    pub fn add_or_increment(
        &mut self,
        product: &Product,
        unit_id: &str,
        quantity: Decimal,
        catalog: &Catalog,
    ) -> CoreResult<u32> {
        validate_line_quantity(quantity)?;

        let price = catalog
            .unit_price(&product.item_id, unit_id)
            .ok_or_else(|| CoreError::PriceNotFound {
                item_id: product.item_id.clone(),
                unit_id: unit_id.to_string(),
            })?;

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| !l.is_void && l.item_id == product.item_id && l.unit_id == unit_id)
        {
            let new_quantity = line.quantity + quantity;
            validate_quantity_limit(new_quantity)?;

            line.quantity = new_quantity;
            line.refresh_price(price);
            let line_num = line.line_num;
            debug!(line_num, item_id = %product.item_id, %new_quantity, "Incremented basket line");
            self.recompute();
            return Ok(line_num);
        }

        if self.lines.len() >= MAX_BASKET_LINES {
            return Err(CoreError::BasketFull {
                max: MAX_BASKET_LINES,
            });
        }

        let line_num = self.next_line_num;
        self.next_line_num += 1;
        self.lines
            .push(BasketLine::new(line_num, product, price, quantity));
        debug!(line_num, item_id = %product.item_id, unit_id, %quantity, "Added basket line");

        self.recompute();
        Ok(line_num)
    }

    /// Explicit quantity correction.
    ///
    /// `quantity` is the new magnitude and must be positive; a return line
    /// keeps its negative sign. The unit price is refreshed from `catalog`
    /// when the catalog still prices the line.
    pub fn set_quantity(
        &mut self,
        line_num: u32,
        quantity: Decimal,
        catalog: &Catalog,
    ) -> CoreResult<()> {
        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.line_num == line_num)
            .ok_or(CoreError::LineNotFound(line_num))?;

        if line.is_void {
            return Err(CoreError::LineVoided(line_num));
        }

        line.quantity = if line.quantity < Decimal::ZERO {
            -quantity
        } else {
            quantity
        };
        if let Some(price) = catalog.unit_price(&line.item_id, &line.unit_id) {
            line.refresh_price(price);
        }
        debug!(line_num, quantity = %line.quantity, "Corrected basket line quantity");

        self.recompute();
        Ok(())
    }

    /// Marks a line void. Voiding a void line is a no-op.
    pub fn void_line(&mut self, line_num: u32) -> CoreResult<&BasketLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.line_num == line_num)
            .ok_or(CoreError::LineNotFound(line_num))?;

        if !self.lines[idx].is_void {
            self.lines[idx].is_void = true;
            debug!(line_num, "Voided basket line");
        }

        self.recompute();
        Ok(&self.lines[idx])
    }

    /// Seeds return lines from a previously finalized transaction.
    ///
    /// Each original line is added with its quantity negated. Lines whose
    /// item or unit price is gone from the current catalog are skipped.
    ///
    /// ## Returns
    /// Number of original lines that were seeded.
    pub fn seed_return(&mut self, original: &[TransactionLine], catalog: &Catalog) -> usize {
        let mut seeded = 0;

        for line in original {
            let Some(product) = catalog.by_item_id(&line.item_id) else {
                debug!(item_id = %line.item_id, "Return line skipped: item no longer in catalog");
                continue;
            };

            match self.add_or_increment(product, &line.unit_id, -line.quantity, catalog) {
                Ok(_) => seeded += 1,
                Err(e) => {
                    debug!(item_id = %line.item_id, unit_id = %line.unit_id, error = %e, "Return line skipped");
                }
            }
        }

        seeded
    }

    /// Clears every line and zeroes the totals.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.next_line_num = 1;
        self.created_at = Utc::now();
        self.recompute();
    }

    /// Rebuilds totals from the active lines. Idempotent.
    pub fn recompute(&mut self) {
        let amounts: Vec<LineAmounts> = self.active_lines().map(BasketLine::amounts).collect();

        self.totals = BasketTotals {
            active_lines: amounts.len(),
            net: sum_amounts(amounts.iter().map(|a| a.net)),
            tax: sum_amounts(amounts.iter().map(|a| a.tax)),
            gross: sum_amounts(amounts.iter().map(|a| a.gross)),
        };
    }

    /// Journal type implied by the active quantities.
    ///
    /// ```text
    /// all > 0  → Sale
    /// all < 0  → Return
    /// mixed    → Exchange
    /// ```
    pub fn transaction_type(&self) -> TransactionType {
        let has_sale = self.active_lines().any(|l| l.quantity > Decimal::ZERO);
        let has_return = self.active_lines().any(|l| l.quantity < Decimal::ZERO);

        match (has_sale, has_return) {
            (true, true) => TransactionType::Exchange,
            (false, true) => TransactionType::Return,
            _ => TransactionType::Sale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn product(item_id: &str, tax_factor: &str) -> Product {
        Product {
            item_id: item_id.to_string(),
            unit_id: "EA".to_string(),
            barcode: format!("BC-{}", item_id),
            description: format!("Product {}", item_id),
            description_ar: None,
            plu_code: None,
            tax_group: "VAT".to_string(),
            tax_factor: d(tax_factor),
        }
    }

    fn price(item_id: &str, value: &str, includes_tax: bool) -> UnitPrice {
        UnitPrice {
            item_id: item_id.to_string(),
            unit_id: "EA".to_string(),
            unit_price: d(value),
            price_include_tax: if includes_tax { Decimal::ONE } else { Decimal::ZERO },
        }
    }

    /// A: 10.00 excl. 5%, B: 20.00 incl. 5%
    fn catalog() -> Catalog {
        Catalog::new(
            vec![product("A", "0.05"), product("B", "0.05")],
            vec![price("A", "10.00", false), price("B", "20.00", true)],
            vec![],
        )
    }

    fn add(basket: &mut Basket, catalog: &Catalog, item_id: &str, qty: &str) -> u32 {
        let product = catalog.by_item_id(item_id).unwrap().clone();
        basket
            .add_or_increment(&product, "EA", d(qty), catalog)
            .unwrap()
    }

    #[test]
    fn test_two_regime_scenario() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "2");
        add(&mut basket, &cat, "B", "1");

        let line1 = basket.line(1).unwrap().amounts();
        assert_eq!(line1.tax, d("1.000"));
        assert_eq!(line1.gross, d("21.000"));

        let line2 = basket.line(2).unwrap().amounts();
        assert_eq!(line2.tax, d("0.952"));
        assert_eq!(line2.net, d("19.048"));
        assert_eq!(line2.gross, d("20.000"));

        let totals = basket.totals();
        assert_eq!(totals.net, d("39.048"));
        assert_eq!(totals.tax, d("1.952"));
        assert_eq!(totals.gross, d("41.000"));
        assert_eq!(totals.active_lines, 2);
    }

    #[test]
    fn test_same_item_increments() {
        let cat = catalog();
        let mut basket = Basket::new();
        let first = add(&mut basket, &cat, "A", "2");
        let second = add(&mut basket, &cat, "A", "3");

        assert_eq!(first, second);
        assert_eq!(basket.lines().len(), 1);
        assert_eq!(basket.line(first).unwrap().quantity, d("5"));
    }

    #[test]
    fn test_increment_refreshes_price() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "1");

        let repriced = Catalog::new(
            vec![product("A", "0.05")],
            vec![price("A", "12.00", true)],
            vec![],
        );
        add(&mut basket, &repriced, "A", "1");

        let line = basket.line(1).unwrap();
        assert_eq!(line.unit_price, d("12.00"));
        assert!(line.price_includes_tax);
        assert_eq!(basket.totals().gross, d("24.000"));
    }

    #[test]
    fn test_void_excludes_line_and_readd_opens_new_line() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "2");
        add(&mut basket, &cat, "B", "1");
        let before = basket.line(2).unwrap().amounts();

        basket.void_line(1).unwrap();
        assert_eq!(basket.totals().gross, d("20.000"));
        assert_eq!(basket.line(2).unwrap().amounts(), before);
        assert_eq!(basket.lines().len(), 2);

        let readded = add(&mut basket, &cat, "A", "1");
        assert_eq!(readded, 3);
        assert_eq!(basket.line(1).unwrap().quantity, d("2"));
        assert_eq!(basket.totals().gross, d("30.500"));
    }

    #[test]
    fn test_void_is_idempotent() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "2");
        basket.void_line(1).unwrap();
        let totals = basket.totals();
        basket.void_line(1).unwrap();
        assert_eq!(basket.totals(), totals);
        assert!(basket.is_empty());
        assert!(matches!(basket.void_line(9), Err(CoreError::LineNotFound(9))));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "0.333");
        add(&mut basket, &cat, "B", "7");
        let once = basket.totals();
        basket.recompute();
        basket.recompute();
        assert_eq!(basket.totals(), once);

        let sum_tax: Decimal = basket.active_lines().map(|l| l.amounts().tax).sum();
        assert_eq!(once.tax, sum_tax);
    }

    #[test]
    fn test_seed_return_negates_and_skips_unknown() {
        let cat = catalog();
        let mut basket = Basket::new();
        let original = vec![
            TransactionLine {
                line_num: 1,
                item_id: "A".to_string(),
                description: "Product A".to_string(),
                unit_id: "EA".to_string(),
                quantity: d("5"),
                unit_price: d("10.00"),
                net_amount: d("50.000"),
                tax_amount: d("2.500"),
                gross_amount: d("52.500"),
                disc_amount: Decimal::ZERO,
                disc_amount_without_tax: Decimal::ZERO,
            },
            TransactionLine {
                line_num: 2,
                item_id: "GONE".to_string(),
                description: "Delisted".to_string(),
                unit_id: "EA".to_string(),
                quantity: d("1"),
                unit_price: d("1.00"),
                net_amount: d("1.000"),
                tax_amount: d("0.050"),
                gross_amount: d("1.050"),
                disc_amount: Decimal::ZERO,
                disc_amount_without_tax: Decimal::ZERO,
            },
        ];

        let seeded = basket.seed_return(&original, &cat);

        assert_eq!(seeded, 1);
        assert_eq!(basket.lines().len(), 1);
        assert_eq!(basket.line(1).unwrap().quantity, d("-5"));
        assert!(basket.totals().gross <= Decimal::ZERO);
        assert_eq!(basket.totals().gross, d("-52.500"));
        assert_eq!(basket.transaction_type(), TransactionType::Return);
    }

    #[test]
    fn test_set_quantity_keeps_return_sign() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "-5");
        basket.set_quantity(1, d("2"), &cat).unwrap();
        assert_eq!(basket.line(1).unwrap().quantity, d("-2"));

        assert!(basket.set_quantity(1, Decimal::ZERO, &cat).is_err());
        basket.void_line(1).unwrap();
        assert!(matches!(
            basket.set_quantity(1, d("1"), &cat),
            Err(CoreError::LineVoided(1))
        ));
    }

    #[test]
    fn test_transaction_type_exchange() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "1");
        add(&mut basket, &cat, "B", "-1");
        assert_eq!(basket.transaction_type(), TransactionType::Exchange);
    }

    #[test]
    fn test_missing_price_is_rejected() {
        let cat = catalog();
        let mut basket = Basket::new();
        let product = cat.by_item_id("A").unwrap().clone();
        let err = basket
            .add_or_increment(&product, "BOX", d("1"), &cat)
            .unwrap_err();
        assert!(matches!(err, CoreError::PriceNotFound { .. }));
        assert!(basket.lines().is_empty());
    }

    #[test]
    fn test_reset() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "1");
        basket.reset();
        assert!(basket.lines().is_empty());
        assert_eq!(basket.totals(), BasketTotals::default());
        assert_eq!(add(&mut basket, &cat, "B", "1"), 1);
    }

    #[test]
    fn test_void_line_journal_record_is_zero() {
        let cat = catalog();
        let mut basket = Basket::new();
        add(&mut basket, &cat, "A", "2");
        let record = basket.line(1).unwrap().to_void_line();
        assert_eq!(record.quantity, d("2"));
        assert_eq!(record.gross_amount, Decimal::ZERO);
    }
}

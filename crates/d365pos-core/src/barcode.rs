//! # Barcode Resolver
//!
//! Turns a scanned or typed code into a (product, unit, quantity) triple.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  code                                                                   │
//! │    │                                                                    │
//! │    ├─► 1. Direct match: product.barcode == code  ─┐                     │
//! │    │                    product.item_id == code  ─┴─► qty = 1           │
//! │    │                                                                    │
//! │    └─► 2. Mask match: code starts with prefix AND len == mask.length    │
//! │              │          (first mask in catalog order wins)              │
//! │              │                                                          │
//! │              ├── no Product segment ──────────────► InvalidMask         │
//! │              │                                                          │
//! │              ├── PLU = code[prefix .. prefix + product_len]             │
//! │              │     unknown PLU ───────────────────► NotFound            │
//! │              │                                                          │
//! │              └── Price segment? total = digits with implied decimals    │
//! │                    qty = total / unit_price                             │
//! │                    (unparsable total, zero price or overflow → 1)       │
//! │                                                                         │
//! │  nothing matched ──────────────────────────────────► NotFound           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A code that matches a product directly is never decoded as a mask, even
//! when a mask happens to fit its prefix and length.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::types::{BarcodeMask, Product, SegmentType};

/// How a code was matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MatchSource {
    Barcode,
    ItemId,
    Mask { mask_id: String, plu: String },
}

/// Result of resolving a code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub product: Product,
    pub unit_id: String,
    pub quantity: Decimal,
    pub source: MatchSource,
}

/// Stateless resolver over a catalog snapshot.
#[derive(Debug, Clone, Copy)]
pub struct BarcodeResolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> BarcodeResolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        BarcodeResolver { catalog }
    }

    /// Resolves `code` against the catalog.
    ///
    /// ## Returns
    /// * `Ok(Resolution)` - product, its default unit and the quantity
    /// * `Err(CoreError::NotFound)` - no product, mask or PLU matched
    /// * `Err(CoreError::InvalidMask)` - matched mask has no Product segment
    pub fn resolve(&self, code: &str) -> CoreResult<Resolution> {
        let code = code.trim();

        if let Some(product) = self.catalog.by_barcode(code) {
            debug!(code, item_id = %product.item_id, "Resolved by barcode");
            return Ok(self.direct(product, MatchSource::Barcode));
        }

        if let Some(product) = self.catalog.by_item_id(code) {
            debug!(code, item_id = %product.item_id, "Resolved by item id");
            return Ok(self.direct(product, MatchSource::ItemId));
        }

        let mask = self
            .catalog
            .masks()
            .iter()
            .find(|m| m.matches(code))
            .ok_or_else(|| CoreError::NotFound {
                code: code.to_string(),
            })?;

        self.decode_mask(code, mask)
    }

    fn direct(&self, product: &Product, source: MatchSource) -> Resolution {
        Resolution {
            product: product.clone(),
            unit_id: product.unit_id.clone(),
            quantity: Decimal::ONE,
            source,
        }
    }

    fn decode_mask(&self, code: &str, mask: &BarcodeMask) -> CoreResult<Resolution> {
        let invalid = || CoreError::InvalidMask {
            mask_id: mask.mask_id.clone(),
        };

        let product_segment = mask.segment(&SegmentType::Product).ok_or_else(invalid)?;

        let plu_start = mask.prefix_text().len();
        let plu_end = plu_start + product_segment.length;
        let plu = code.get(plu_start..plu_end).ok_or_else(invalid)?;

        let product = self.catalog.by_plu(plu).ok_or_else(|| CoreError::NotFound {
            code: code.to_string(),
        })?;

        let quantity = match mask.segment(&SegmentType::Price) {
            Some(price_segment) => {
                let digits = code.get(plu_end..plu_end + price_segment.length);
                let total = digits.and_then(|d| embedded_amount(d, price_segment.decimals));
                let unit_price = self
                    .catalog
                    .unit_price(&product.item_id, &product.unit_id)
                    .map(|p| p.unit_price)
                    .unwrap_or(Decimal::ZERO);

                total
                    .filter(|_| !unit_price.is_zero())
                    .and_then(|total| total.checked_div(unit_price))
                    .unwrap_or(Decimal::ONE)
            }
            None => Decimal::ONE,
        };

        debug!(
            code,
            mask_id = %mask.mask_id,
            plu,
            item_id = %product.item_id,
            %quantity,
            "Resolved by barcode mask"
        );

        Ok(Resolution {
            product: product.clone(),
            unit_id: product.unit_id.clone(),
            quantity,
            source: MatchSource::Mask {
                mask_id: mask.mask_id.clone(),
                plu: plu.to_string(),
            },
        })
    }
}

/// Reads a fixed-point digit string with `decimals` implied places.
///
/// ## Examples
/// ```text
/// "003299", 2  → "0032.99" → 32.99
/// "5",      2  → "0.05"    → 0.05
/// "1234",   0  → "1234"    → 1234
/// ```
pub fn embedded_amount(digits: &str, decimals: u32) -> Option<Decimal> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let decimals = decimals as usize;
    let text = if decimals == 0 {
        digits.to_string()
    } else if digits.len() > decimals {
        let split = digits.len() - decimals;
        format!("{}.{}", &digits[..split], &digits[split..])
    } else {
        format!("0.{:0>width$}", digits, width = decimals)
    };

    Decimal::from_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MaskSegment, UnitPrice};

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn product(item_id: &str, barcode: &str, plu: Option<&str>, unit_id: &str) -> Product {
        Product {
            item_id: item_id.to_string(),
            unit_id: unit_id.to_string(),
            barcode: barcode.to_string(),
            description: format!("Product {}", item_id),
            description_ar: None,
            plu_code: plu.map(str::to_string),
            tax_group: "VAT".to_string(),
            tax_factor: d("0.05"),
        }
    }

    fn price(item_id: &str, unit_id: &str, value: &str) -> UnitPrice {
        UnitPrice {
            item_id: item_id.to_string(),
            unit_id: unit_id.to_string(),
            unit_price: d(value),
            price_include_tax: Decimal::ZERO,
        }
    }

    fn segment(number: u32, segment_type: SegmentType, length: usize, decimals: u32) -> MaskSegment {
        MaskSegment {
            segment_number: number,
            segment_type,
            length,
            decimals,
            fill_char: None,
        }
    }

    fn weight_mask() -> BarcodeMask {
        BarcodeMask {
            mask_id: "WEIGHT".to_string(),
            description: "Weighed produce".to_string(),
            mask: "21PPPPP$$$$$$".to_string(),
            prefix: 21,
            length: 13,
            // Deliberately out of order: resolver must sort by segment number.
            segments: vec![
                segment(2, SegmentType::Price, 6, 2),
                segment(1, SegmentType::Product, 5, 0),
            ],
        }
    }

    fn catalog_with(masks: Vec<BarcodeMask>, unit_price: &str) -> Catalog {
        Catalog::new(
            vec![
                product("MEAT01", "6280000000011", Some("12345"), "KG"),
                product("SODA01", "2112345003299", None, "EA"),
            ],
            vec![price("MEAT01", "KG", unit_price), price("SODA01", "EA", "1.50")],
            masks,
        )
    }

    #[test]
    fn test_embedded_amount_inserts_decimal_point() {
        assert_eq!(embedded_amount("003299", 2), Some(d("32.99")));
        assert_eq!(embedded_amount("5", 2), Some(d("0.05")));
        assert_eq!(embedded_amount("12", 2), Some(d("0.12")));
        assert_eq!(embedded_amount("1234", 0), Some(d("1234")));
        assert_eq!(embedded_amount("12a4", 2), None);
        assert_eq!(embedded_amount("", 2), None);
    }

    #[test]
    fn test_weight_barcode_derives_quantity() {
        let catalog = Catalog::new(
            vec![product("MEAT01", "6280000000011", Some("12345"), "KG")],
            vec![price("MEAT01", "KG", "10.997")],
            vec![weight_mask()],
        );
        let resolution = BarcodeResolver::new(&catalog).resolve("2112345003299").unwrap();

        assert_eq!(resolution.product.item_id, "MEAT01");
        assert_eq!(resolution.unit_id, "KG");
        assert_eq!(resolution.quantity.round_dp(3), d("3.000"));
        assert_eq!(
            resolution.source,
            MatchSource::Mask {
                mask_id: "WEIGHT".to_string(),
                plu: "12345".to_string()
            }
        );
    }

    #[test]
    fn test_direct_match_wins_over_mask() {
        let catalog = catalog_with(vec![weight_mask()], "10.997");
        let resolution = BarcodeResolver::new(&catalog).resolve("2112345003299").unwrap();

        assert_eq!(resolution.product.item_id, "SODA01");
        assert_eq!(resolution.quantity, Decimal::ONE);
        assert_eq!(resolution.source, MatchSource::Barcode);
    }

    #[test]
    fn test_item_id_direct_match() {
        let catalog = catalog_with(vec![], "10.997");
        let resolution = BarcodeResolver::new(&catalog).resolve(" MEAT01 ").unwrap();
        assert_eq!(resolution.source, MatchSource::ItemId);
        assert_eq!(resolution.quantity, Decimal::ONE);
    }

    #[test]
    fn test_zero_unit_price_falls_back_to_one() {
        let mut masks = vec![weight_mask()];
        masks[0].prefix = 22;
        let catalog = catalog_with(masks, "0");
        let resolution = BarcodeResolver::new(&catalog).resolve("2212345003299").unwrap();
        assert_eq!(resolution.quantity, Decimal::ONE);
    }

    #[test]
    fn test_unparsable_price_falls_back_to_one() {
        let mut masks = vec![weight_mask()];
        masks[0].prefix = 22;
        let catalog = catalog_with(masks, "10.997");
        let resolution = BarcodeResolver::new(&catalog).resolve("221234500X299").unwrap();
        assert_eq!(resolution.quantity, Decimal::ONE);
    }

    #[test]
    fn test_overflowing_quantity_falls_back_to_one() {
        let mask = BarcodeMask {
            mask_id: "LONGPRICE".to_string(),
            description: "Oversized price segment".to_string(),
            mask: format!("21PPPPP{}", "$".repeat(28)),
            prefix: 21,
            length: 35,
            segments: vec![
                segment(1, SegmentType::Product, 5, 0),
                segment(2, SegmentType::Price, 28, 0),
            ],
        };
        let catalog = Catalog::new(
            vec![product("MEAT01", "6280000000011", Some("12345"), "KG")],
            vec![price("MEAT01", "KG", "0.001")],
            vec![mask],
        );
        let code = format!("2112345{}", "9".repeat(28));

        let resolution = BarcodeResolver::new(&catalog).resolve(&code).unwrap();
        assert_eq!(resolution.product.item_id, "MEAT01");
        assert_eq!(resolution.quantity, Decimal::ONE);
    }

    #[test]
    fn test_mask_without_price_segment_is_one() {
        let mask = BarcodeMask {
            mask_id: "PLU".to_string(),
            description: "PLU only".to_string(),
            mask: "23PPPPP".to_string(),
            prefix: 23,
            length: 7,
            segments: vec![segment(1, SegmentType::Product, 5, 0)],
        };
        let catalog = catalog_with(vec![mask], "10.997");
        let resolution = BarcodeResolver::new(&catalog).resolve("2312345").unwrap();
        assert_eq!(resolution.product.item_id, "MEAT01");
        assert_eq!(resolution.quantity, Decimal::ONE);
    }

    #[test]
    fn test_mask_without_product_segment_is_invalid() {
        let mask = BarcodeMask {
            mask_id: "BROKEN".to_string(),
            description: "Price only".to_string(),
            mask: "24$$$$$".to_string(),
            prefix: 24,
            length: 7,
            segments: vec![segment(1, SegmentType::Price, 5, 2)],
        };
        let catalog = catalog_with(vec![mask], "10.997");
        let err = BarcodeResolver::new(&catalog).resolve("2412345").unwrap_err();
        assert!(matches!(err, CoreError::InvalidMask { mask_id } if mask_id == "BROKEN"));
    }

    #[test]
    fn test_unknown_code_and_unknown_plu_are_not_found() {
        let mut masks = vec![weight_mask()];
        masks[0].prefix = 22;
        let catalog = catalog_with(masks, "10.997");
        let resolver = BarcodeResolver::new(&catalog);

        assert!(matches!(
            resolver.resolve("999").unwrap_err(),
            CoreError::NotFound { .. }
        ));
        // Mask matches, PLU 99999 does not exist.
        assert!(matches!(
            resolver.resolve("2299999003299").unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }

    #[test]
    fn test_first_matching_mask_wins() {
        let mut first = weight_mask();
        first.mask_id = "FIRST".to_string();
        first.prefix = 25;
        let mut second = weight_mask();
        second.mask_id = "SECOND".to_string();
        second.prefix = 25;
        second.segments = vec![segment(1, SegmentType::Product, 5, 0)];

        let catalog = catalog_with(vec![first, second], "10.997");
        let resolution = BarcodeResolver::new(&catalog).resolve("2512345003299").unwrap();
        assert!(matches!(resolution.source, MatchSource::Mask { mask_id, .. } if mask_id == "FIRST"));
    }
}

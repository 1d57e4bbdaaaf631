//! # Catalog Repository
//!
//! Local copy of the ERP catalog: products, unit prices and barcode masks.
//!
//! ## Atomic Replace
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  replace_products(rows)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    DELETE FROM products                                                 │
//! │    INSERT × N                                                           │
//! │  COMMIT ──► readers see the new set                                     │
//! │       │                                                                 │
//! │       └── any error ──► ROLLBACK ──► readers keep the old set           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows keep their sync order (`position`), so first-wins lookups in the
//! in-memory [`Catalog`] behave the same after a reload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use d365pos_core::{BarcodeMask, Catalog, MaskSegment, Product, SegmentType, UnitPrice};

use super::{decimal_column, unsigned_column};
use crate::error::DbResult;

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    item_id: String,
    unit_id: String,
    barcode: String,
    description: String,
    description_ar: Option<String>,
    plu_code: Option<String>,
    tax_group: String,
    tax_factor: String,
}

impl ProductRow {
    fn into_product(self) -> DbResult<Product> {
        Ok(Product {
            tax_factor: decimal_column("tax_factor", &self.tax_factor)?,
            item_id: self.item_id,
            unit_id: self.unit_id,
            barcode: self.barcode,
            description: self.description,
            description_ar: self.description_ar,
            plu_code: self.plu_code,
            tax_group: self.tax_group,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UnitPriceRow {
    item_id: String,
    unit_id: String,
    unit_price: String,
    price_include_tax: String,
}

impl UnitPriceRow {
    fn into_unit_price(self) -> DbResult<UnitPrice> {
        Ok(UnitPrice {
            unit_price: decimal_column("unit_price", &self.unit_price)?,
            price_include_tax: decimal_column("price_include_tax", &self.price_include_tax)?,
            item_id: self.item_id,
            unit_id: self.unit_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MaskRow {
    mask_id: String,
    description: String,
    mask: String,
    prefix: i64,
    length: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SegmentRow {
    mask_id: String,
    segment_number: i64,
    segment_type: String,
    length: i64,
    decimals: i64,
    fill_char: Option<String>,
}

impl SegmentRow {
    fn into_segment(self) -> DbResult<MaskSegment> {
        Ok(MaskSegment {
            segment_number: unsigned_column("segment_number", self.segment_number)?,
            segment_type: SegmentType::from(self.segment_type),
            length: unsigned_column("length", self.length)?,
            decimals: unsigned_column("decimals", self.decimals)?,
            fill_char: self.fill_char,
        })
    }
}

/// Row counts of the local catalog tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCounts {
    pub products: i64,
    pub prices: i64,
    pub masks: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the catalog tables.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Replaces every product row in one transaction.
    ///
    /// ## Returns
    /// Number of rows inserted.
    pub async fn replace_products(&self, products: &[Product]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM products").execute(&mut *tx).await?;

        for product in products {
            sqlx::query(
                r#"
                INSERT INTO products (
                    item_id, unit_id, barcode, description, description_ar,
                    plu_code, tax_group, tax_factor
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&product.item_id)
            .bind(&product.unit_id)
            .bind(&product.barcode)
            .bind(&product.description)
            .bind(&product.description_ar)
            .bind(&product.plu_code)
            .bind(&product.tax_group)
            .bind(product.tax_factor.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(count = products.len(), "Products replaced");
        Ok(products.len())
    }

    /// Replaces every unit price row in one transaction.
    ///
    /// Duplicate (item, unit) pairs keep the last row received.
    pub async fn replace_prices(&self, prices: &[UnitPrice]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM unit_prices").execute(&mut *tx).await?;

        for price in prices {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO unit_prices (
                    item_id, unit_id, unit_price, price_include_tax
                ) VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&price.item_id)
            .bind(&price.unit_id)
            .bind(price.unit_price.to_string())
            .bind(price.price_include_tax.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(count = prices.len(), "Unit prices replaced");
        Ok(prices.len())
    }

    /// Replaces every barcode mask and its segments in one transaction.
    pub async fn replace_masks(&self, masks: &[BarcodeMask]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mask_segments").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM barcode_masks").execute(&mut *tx).await?;

        for mask in masks {
            sqlx::query(
                r#"
                INSERT INTO barcode_masks (mask_id, description, mask, prefix, length)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&mask.mask_id)
            .bind(&mask.description)
            .bind(&mask.mask)
            .bind(i64::from(mask.prefix))
            .bind(mask.length as i64)
            .execute(&mut *tx)
            .await?;

            for segment in &mask.segments {
                sqlx::query(
                    r#"
                    INSERT INTO mask_segments (
                        mask_id, segment_number, segment_type, length, decimals, fill_char
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(&mask.mask_id)
                .bind(i64::from(segment.segment_number))
                .bind(segment.segment_type.as_str())
                .bind(segment.length as i64)
                .bind(i64::from(segment.decimals))
                .bind(&segment.fill_char)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        info!(count = masks.len(), "Barcode masks replaced");
        Ok(masks.len())
    }

    /// All products in sync order.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT item_id, unit_id, barcode, description, description_ar,
                   plu_code, tax_group, tax_factor
            FROM products
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProductRow::into_product).collect()
    }

    pub async fn list_prices(&self) -> DbResult<Vec<UnitPrice>> {
        let rows: Vec<UnitPriceRow> = sqlx::query_as(
            r#"
            SELECT item_id, unit_id, unit_price, price_include_tax
            FROM unit_prices
            ORDER BY item_id, unit_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UnitPriceRow::into_unit_price).collect()
    }

    /// All masks in sync order, each with its segments.
    pub async fn list_masks(&self) -> DbResult<Vec<BarcodeMask>> {
        let mask_rows: Vec<MaskRow> = sqlx::query_as(
            r#"
            SELECT mask_id, description, mask, prefix, length
            FROM barcode_masks
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let segment_rows: Vec<SegmentRow> = sqlx::query_as(
            r#"
            SELECT mask_id, segment_number, segment_type, length, decimals, fill_char
            FROM mask_segments
            ORDER BY mask_id, segment_number
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut segments: HashMap<String, Vec<MaskSegment>> = HashMap::new();
        for row in segment_rows {
            let mask_id = row.mask_id.clone();
            segments.entry(mask_id).or_default().push(row.into_segment()?);
        }

        mask_rows
            .into_iter()
            .map(|row| {
                Ok(BarcodeMask {
                    segments: segments.remove(&row.mask_id).unwrap_or_default(),
                    prefix: unsigned_column("prefix", row.prefix)?,
                    length: unsigned_column("length", row.length)?,
                    mask_id: row.mask_id,
                    description: row.description,
                    mask: row.mask,
                })
            })
            .collect()
    }

    /// Loads the whole local catalog into an indexed snapshot.
    pub async fn load_catalog(&self) -> DbResult<Catalog> {
        let products = self.list_products().await?;
        let prices = self.list_prices().await?;
        let masks = self.list_masks().await?;

        debug!(
            products = products.len(),
            prices = prices.len(),
            masks = masks.len(),
            "Catalog loaded"
        );

        Ok(Catalog::new(products, prices, masks))
    }

    pub async fn counts(&self) -> DbResult<CatalogCounts> {
        let (products, prices, masks): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products),
                (SELECT COUNT(*) FROM unit_prices),
                (SELECT COUNT(*) FROM barcode_masks)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogCounts {
            products,
            prices,
            masks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use rust_decimal::Decimal;

    fn product(item_id: &str, barcode: &str, plu: Option<&str>) -> Product {
        Product {
            item_id: item_id.to_string(),
            unit_id: "EA".to_string(),
            barcode: barcode.to_string(),
            description: format!("Product {}", item_id),
            description_ar: Some("منتج".to_string()),
            plu_code: plu.map(str::to_string),
            tax_group: "VAT".to_string(),
            tax_factor: Decimal::new(5, 2),
        }
    }

    fn price(item_id: &str, unit_price: Decimal) -> UnitPrice {
        UnitPrice {
            item_id: item_id.to_string(),
            unit_id: "EA".to_string(),
            unit_price,
            price_include_tax: Decimal::ONE,
        }
    }

    fn weighed_mask() -> BarcodeMask {
        BarcodeMask {
            mask_id: "W21".to_string(),
            description: "Weighed items".to_string(),
            mask: "21PPPPPXXXXXX".to_string(),
            prefix: 21,
            length: 13,
            segments: vec![
                MaskSegment {
                    segment_number: 2,
                    segment_type: SegmentType::Price,
                    length: 6,
                    decimals: 2,
                    fill_char: None,
                },
                MaskSegment {
                    segment_number: 1,
                    segment_type: SegmentType::Product,
                    length: 5,
                    decimals: 0,
                    fill_char: Some("0".to_string()),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_replace_and_load_catalog() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        repo.replace_products(&[product("B", "222", None), product("A", "111", Some("12345"))])
            .await
            .unwrap();
        repo.replace_prices(&[price("A", Decimal::new(10_997, 3))])
            .await
            .unwrap();
        repo.replace_masks(&[weighed_mask()]).await.unwrap();

        let catalog = repo.load_catalog().await.unwrap();
        assert_eq!(catalog.product_count(), 2);
        // sync order is preserved
        assert_eq!(catalog.products()[0].item_id, "B");
        assert_eq!(catalog.by_plu("12345").unwrap().item_id, "A");
        assert_eq!(
            catalog.unit_price("A", "EA").unwrap().unit_price,
            Decimal::new(10_997, 3)
        );

        let mask = &catalog.masks()[0];
        assert_eq!(mask.prefix, 21);
        assert_eq!(mask.segments[0].segment_type, SegmentType::Product);
        assert_eq!(mask.segments[1].decimals, 2);
    }

    #[tokio::test]
    async fn test_replace_discards_previous_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        repo.replace_products(&[product("A", "111", None), product("B", "222", None)])
            .await
            .unwrap();
        repo.replace_products(&[product("C", "333", None)]).await.unwrap();

        let products = repo.list_products().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].item_id, "C");
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_masks() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        repo.replace_masks(&[weighed_mask()]).await.unwrap();

        // duplicate mask id violates UNIQUE inside the transaction
        let result = repo.replace_masks(&[weighed_mask(), weighed_mask()]).await;
        assert!(result.is_err());

        let masks = repo.list_masks().await.unwrap();
        assert_eq!(masks.len(), 1);
        assert_eq!(masks[0].segments.len(), 2);
    }

    #[tokio::test]
    async fn test_counts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        repo.replace_products(&[product("A", "111", None)]).await.unwrap();
        repo.replace_prices(&[price("A", Decimal::ONE), price("A", Decimal::TWO)])
            .await
            .unwrap();

        let counts = repo.counts().await.unwrap();
        assert_eq!(
            counts,
            CatalogCounts {
                products: 1,
                prices: 1,
                masks: 0
            }
        );
    }
}

//! # ERP Service Contracts
//!
//! Wire types for the POS operation service and the sign-in lookups, and
//! the traits the register calls through.
//!
//! ## Operations
//! ```text
//! ┌──────────────────────────┬──────────────────────┬───────────────────────┐
//! │ Operation                │ Request body         │ Response              │
//! ├──────────────────────────┼──────────────────────┼───────────────────────┤
//! │ recordSales              │ RecordSalesRequest   │ any 2xx = recorded    │
//! │ getActiveProducts        │ {company, storeId}   │ [ActiveProductDto]    │
//! │ getActiveProductPrices   │ {company, storeId}   │ [ActiveProductPrice…] │
//! │ getProductBarcodes       │ {company}            │ [BarcodeMaskDto]      │
//! ├──────────────────────────┼──────────────────────┼───────────────────────┤
//! │ getUser                  │ {_userId,            │ UserResponse          │
//! │                          │  _passwordHash}      │                       │
//! │ getStore                 │ {_userId, _company}  │ StoreResponse         │
//! └──────────────────────────┴──────────────────────┴───────────────────────┘
//! ```
//!
//! Requests are camelCase, except the sign-in bodies which use the
//! underscore-prefixed parameter names of the X++ services. Responses arrive
//! PascalCase; camelCase aliases are accepted as well.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockall::automock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use d365pos_core::amount::format_amount;
use d365pos_core::{
    BarcodeMask, FinalizedTransaction, LineAction, MaskSegment, Product, SegmentType, UnitPrice,
};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Traits
// =============================================================================

/// Submits finalized sales to the ERP.
#[automock]
#[async_trait]
pub trait SalesRecordingClient: Send + Sync {
    /// Records one sale. `Ok` only on a 2xx answer.
    async fn record_sales(&self, request: &RecordSalesRequest) -> SyncResult<()>;
}

/// Pulls the store catalog from the ERP.
#[automock]
#[async_trait]
pub trait CatalogSyncClient: Send + Sync {
    async fn active_products(&self, store_id: &str) -> SyncResult<Vec<ActiveProductDto>>;

    async fn active_prices(&self, store_id: &str) -> SyncResult<Vec<ActiveProductPriceDto>>;

    async fn barcode_masks(&self) -> SyncResult<Vec<BarcodeMaskDto>>;
}

/// Resolves an operator's company and store.
#[automock]
#[async_trait]
pub trait SignInClient: Send + Sync {
    async fn get_user(&self, user_id: &str, password: &str) -> SyncResult<UserResponse>;

    async fn get_store(&self, user_id: &str, company: &str) -> SyncResult<StoreResponse>;
}

// =============================================================================
// recordSales
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSalesRequest {
    pub company: String,
    pub sale_items: Vec<SaleItemDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemDto {
    pub store_id: String,
    pub trans_date: NaiveDate,
    pub terminal_id: String,
    pub staff_id: String,
    pub shift_id: String,
    pub receipt_id: String,
    pub payments: Vec<PaymentDto>,
    pub taxes: Vec<TaxDto>,
    pub items: Vec<ItemDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub payment_date_time: DateTime<Utc>,
    pub payment_method: String,
    pub payment_type: String,
    pub currency: String,
    /// 3-dp string.
    pub payment_amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxDto {
    pub tax_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_rate: Decimal,
    /// 3-dp string.
    pub tax_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDto {
    pub item_id: String,
    pub unit_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub qty: Decimal,
    /// Net line amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub line_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_amount: Decimal,
    /// 0 = sale, 1 = return, 2 = void.
    pub action: i32,
    pub action_date_time: DateTime<Utc>,
}

impl RecordSalesRequest {
    /// Builds the payload for one finalized transaction.
    pub fn from_transaction(company: &str, transaction: &FinalizedTransaction) -> Self {
        let header = &transaction.header;

        let payments = transaction
            .payment
            .iter()
            .map(|p| PaymentDto {
                payment_date_time: p.payment_date_time,
                payment_method: p.method.as_str().to_string(),
                payment_type: p.payment_type.as_str().to_string(),
                currency: p.currency.clone(),
                payment_amount: format_amount(p.amount),
            })
            .collect();

        let taxes = transaction
            .tax
            .iter()
            .map(|t| TaxDto {
                tax_name: t.tax_name.clone(),
                tax_rate: t.tax_rate,
                tax_value: format_amount(t.tax_amount),
            })
            .collect();

        let items = transaction
            .lines
            .iter()
            .map(|line| ItemDto {
                item_id: line.item_id.clone(),
                unit_id: line.unit_id.clone(),
                unit_price: line.unit_price,
                qty: line.quantity,
                line_amount: line.net_amount,
                tax_amount: line.tax_amount,
                action: LineAction::for_quantity(line.quantity).code(),
                action_date_time: header.created_at,
            })
            .collect();

        RecordSalesRequest {
            company: company.to_string(),
            sale_items: vec![SaleItemDto {
                store_id: header.store_id.clone(),
                trans_date: header.business_date,
                terminal_id: header.terminal_id.clone(),
                staff_id: header.staff_id.clone(),
                shift_id: header.shift_id.clone(),
                receipt_id: header.receipt_id.clone(),
                payments,
                taxes,
                items,
            }],
        }
    }
}

// =============================================================================
// Catalog Requests
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCatalogRequest<'a> {
    pub company: &'a str,
    pub store_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyRequest<'a> {
    pub company: &'a str,
}

// =============================================================================
// getActiveProducts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActiveProductDto {
    #[serde(rename = "ItemId", alias = "itemId")]
    pub item_id: String,

    #[serde(rename = "Description", alias = "description", default)]
    pub description: Option<String>,

    #[serde(rename = "DescriptionAr", alias = "descriptionAr", default)]
    pub description_ar: Option<String>,

    #[serde(rename = "UnitId", alias = "unitId", default)]
    pub unit_id: Option<String>,

    #[serde(rename = "PLUCode", alias = "pluCode", alias = "PluCode", default)]
    pub plu_code: Option<String>,

    #[serde(rename = "ItemBarcode", alias = "itemBarcode", default)]
    pub item_barcode: Option<String>,

    #[serde(rename = "SalesTaxGroup", alias = "salesTaxGroup", default)]
    pub sales_tax_group: Option<String>,

    #[serde(rename = "ItemSalesTaxGroup", alias = "itemSalesTaxGroup", default)]
    pub item_sales_tax_group: Option<String>,

    #[serde(
        rename = "TaxFactor",
        alias = "taxFactor",
        with = "rust_decimal::serde::float",
        default
    )]
    pub tax_factor: Decimal,
}

impl ActiveProductDto {
    /// Maps the ERP record onto a catalog product.
    ///
    /// The item sales tax group wins over the store sales tax group.
    pub fn into_product(self) -> SyncResult<Product> {
        let item_id = self.item_id.trim().to_string();
        if item_id.is_empty() {
            return Err(invalid("Product", "", "empty ItemId"));
        }
        if self.tax_factor < Decimal::ZERO {
            return Err(invalid("Product", &item_id, "negative TaxFactor"));
        }

        let tax_group = non_empty(self.item_sales_tax_group)
            .or_else(|| non_empty(self.sales_tax_group))
            .unwrap_or_default();

        Ok(Product {
            unit_id: non_empty(self.unit_id).unwrap_or_default(),
            barcode: non_empty(self.item_barcode).unwrap_or_default(),
            description: non_empty(self.description).unwrap_or_else(|| item_id.clone()),
            description_ar: non_empty(self.description_ar),
            plu_code: non_empty(self.plu_code),
            tax_group,
            tax_factor: self.tax_factor,
            item_id,
        })
    }
}

// =============================================================================
// getActiveProductPrices
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActiveProductPriceDto {
    #[serde(rename = "ItemId", alias = "itemId")]
    pub item_id: String,

    #[serde(rename = "UnitId", alias = "unitId", default)]
    pub unit_id: Option<String>,

    #[serde(
        rename = "UnitPrice",
        alias = "unitPrice",
        with = "rust_decimal::serde::float"
    )]
    pub unit_price: Decimal,

    #[serde(
        rename = "PriceIncludeTax",
        alias = "priceIncludeTax",
        with = "rust_decimal::serde::float",
        default
    )]
    pub price_include_tax: Decimal,
}

impl ActiveProductPriceDto {
    pub fn into_unit_price(self) -> SyncResult<UnitPrice> {
        let item_id = self.item_id.trim().to_string();
        if item_id.is_empty() {
            return Err(invalid("UnitPrice", "", "empty ItemId"));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(invalid("UnitPrice", &item_id, "negative UnitPrice"));
        }

        Ok(UnitPrice {
            unit_id: non_empty(self.unit_id).unwrap_or_default(),
            unit_price: self.unit_price,
            price_include_tax: self.price_include_tax,
            item_id,
        })
    }
}

// =============================================================================
// getProductBarcodes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BarcodeMaskDto {
    #[serde(rename = "MaskId", alias = "maskId")]
    pub mask_id: String,

    #[serde(rename = "Description", alias = "description", default)]
    pub description: Option<String>,

    #[serde(rename = "Mask", alias = "mask", default)]
    pub mask: Option<String>,

    #[serde(rename = "Prefix", alias = "prefix", default)]
    pub prefix: Option<String>,

    #[serde(rename = "Length", alias = "length", default)]
    pub length: i64,

    #[serde(rename = "barcodeSegments", alias = "BarcodeSegments", default)]
    pub barcode_segments: Vec<SegmentDto>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentDto {
    #[serde(rename = "SegmentNum", alias = "segmentNum")]
    pub segment_num: i64,

    #[serde(rename = "Type", alias = "type", default)]
    pub segment_type: Option<String>,

    #[serde(rename = "Length", alias = "length", default)]
    pub length: i64,

    #[serde(rename = "Char", alias = "char", default)]
    pub fill_char: Option<String>,

    #[serde(
        rename = "Decimals",
        alias = "decimals",
        with = "rust_decimal::serde::float",
        default
    )]
    pub decimals: Decimal,
}

impl BarcodeMaskDto {
    /// Maps the ERP record onto a barcode mask with sorted segments.
    ///
    /// The prefix must be numeric; lengths must be non-negative.
    pub fn into_mask(self) -> SyncResult<BarcodeMask> {
        let mask_id = self.mask_id.trim().to_string();
        if mask_id.is_empty() {
            return Err(invalid("BarcodeMask", "", "empty MaskId"));
        }

        let prefix_text = non_empty(self.prefix).unwrap_or_default();
        let prefix = prefix_text.parse::<u32>().map_err(|_| {
            invalid(
                "BarcodeMask",
                &mask_id,
                &format!("prefix '{}' is not a number", prefix_text),
            )
        })?;

        let length = usize::try_from(self.length)
            .map_err(|_| invalid("BarcodeMask", &mask_id, "negative Length"))?;

        let segments = self
            .barcode_segments
            .into_iter()
            .map(|segment| segment.into_segment(&mask_id))
            .collect::<SyncResult<Vec<_>>>()?;

        let mut mask = BarcodeMask {
            description: non_empty(self.description).unwrap_or_default(),
            mask: non_empty(self.mask).unwrap_or_default(),
            prefix,
            length,
            segments,
            mask_id,
        };
        mask.sort_segments();
        Ok(mask)
    }
}

impl SegmentDto {
    fn into_segment(self, mask_id: &str) -> SyncResult<MaskSegment> {
        let segment_number = u32::try_from(self.segment_num)
            .map_err(|_| invalid("BarcodeMask", mask_id, "negative SegmentNum"))?;
        let length = usize::try_from(self.length)
            .map_err(|_| invalid("BarcodeMask", mask_id, "negative segment Length"))?;
        let decimals = self
            .decimals
            .trunc()
            .to_u32()
            .ok_or_else(|| invalid("BarcodeMask", mask_id, "invalid segment Decimals"))?;

        Ok(MaskSegment {
            segment_number,
            segment_type: SegmentType::from(self.segment_type.unwrap_or_default()),
            length,
            decimals,
            fill_char: non_empty(self.fill_char),
        })
    }
}

// =============================================================================
// getUser / getStore
// =============================================================================

/// `getUser` body. The service compares the password as typed.
///
/// `Debug` redacts the password.
#[derive(Clone, Serialize)]
pub struct GetUserRequest<'a> {
    #[serde(rename = "_userId")]
    pub user_id: &'a str,
    #[serde(rename = "_passwordHash")]
    pub password: &'a str,
}

impl fmt::Debug for GetUserRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetUserRequest")
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetStoreRequest<'a> {
    #[serde(rename = "_userId")]
    pub user_id: &'a str,
    #[serde(rename = "_company")]
    pub company: &'a str,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UserResponse {
    #[serde(rename = "Status", alias = "status", default)]
    pub status: Option<String>,
    #[serde(rename = "Message", alias = "message", default)]
    pub message: Option<String>,
    /// Legal entities the user may sign in to.
    #[serde(rename = "CompanyList", alias = "companyList", default)]
    pub company_list: Option<Vec<String>>,
}

impl UserResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status.as_deref())
    }

    /// First non-blank company.
    pub fn first_company(&self) -> Option<String> {
        first_non_blank(self.company_list.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StoreResponse {
    #[serde(rename = "Status", alias = "status", default)]
    pub status: Option<String>,
    #[serde(rename = "Message", alias = "message", default)]
    pub message: Option<String>,
    /// Warehouses (stores) assigned to the user in the company.
    #[serde(rename = "Warehouse", alias = "warehouse", default)]
    pub warehouse: Option<Vec<String>>,
}

impl StoreResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status.as_deref())
    }

    /// First non-blank warehouse.
    pub fn first_store(&self) -> Option<String> {
        first_non_blank(self.warehouse.as_deref())
    }
}

fn is_success(status: Option<&str>) -> bool {
    status.is_some_and(|s| s.trim().eq_ignore_ascii_case("success"))
}

fn first_non_blank(values: Option<&[String]>) -> Option<String> {
    values?
        .iter()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Helpers
// =============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid(entity: &str, id: &str, reason: &str) -> SyncError {
    SyncError::InvalidRecord {
        entity: entity.to_string(),
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use d365pos_core::{
        PaymentMethod, PaymentType, TransactionHeader, TransactionLine, TransactionPayment,
        TransactionTax, TransactionType,
    };
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(line_num: u32, qty: &str, price: &str, net: &str, tax: &str) -> TransactionLine {
        TransactionLine {
            line_num,
            item_id: format!("ITEM{}", line_num),
            description: "Item".into(),
            unit_id: "EA".into(),
            quantity: dec(qty),
            unit_price: dec(price),
            net_amount: dec(net),
            tax_amount: dec(tax),
            gross_amount: dec(net) + dec(tax),
            disc_amount: Decimal::ZERO,
            disc_amount_without_tax: Decimal::ZERO,
        }
    }

    fn transaction() -> FinalizedTransaction {
        let created_at = DateTime::parse_from_rfc3339("2026-10-16T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        FinalizedTransaction {
            header: TransactionHeader {
                transaction_id: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
                store_id: "S001".into(),
                terminal_id: "T01".into(),
                shift_id: "SH1".into(),
                staff_id: "000160".into(),
                receipt_id: "T01-20261016-0001".into(),
                business_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
                currency: "AED".into(),
                total: dec("41.000"),
                transaction_type: TransactionType::Exchange,
                created_at,
            },
            lines: vec![
                line(1, "2", "20.5", "41.000", "2.050"),
                line(2, "-1", "2.05", "-1.952", "-0.098"),
            ],
            payment: Some(TransactionPayment {
                payment_date_time: created_at,
                method: PaymentMethod::Cash,
                payment_type: PaymentType::Payment,
                currency: "AED".into(),
                amount: dec("41"),
                tendered: dec("50"),
                change: dec("9"),
            }),
            tax: Some(TransactionTax {
                tax_name: "VAT".into(),
                tax_rate: dec("5"),
                tax_amount: dec("1.952"),
            }),
        }
    }

    #[test]
    fn test_record_sales_payload_shape() {
        let request = RecordSalesRequest::from_transaction("usmf", &transaction());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["company"], "usmf");
        let sale = &json["saleItems"][0];
        assert_eq!(sale["storeId"], "S001");
        assert_eq!(sale["transDate"], "2026-10-16");
        assert_eq!(sale["receiptId"], "T01-20261016-0001");

        let payment = &sale["payments"][0];
        assert_eq!(payment["paymentMethod"], "Cash");
        assert_eq!(payment["paymentType"], "Payment");
        assert_eq!(payment["paymentAmount"], "41.000");

        let tax = &sale["taxes"][0];
        assert_eq!(tax["taxName"], "VAT");
        assert_eq!(tax["taxRate"], 5.0);
        assert_eq!(tax["taxValue"], "1.952");

        let items = sale["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["qty"], 2.0);
        assert_eq!(items[0]["lineAmount"], 41.0);
        assert_eq!(items[0]["action"], 0);
        assert_eq!(items[1]["action"], 1);
        let tax_amount = items[1]["taxAmount"].as_f64().unwrap();
        assert!((tax_amount + 0.098).abs() < 1e-9);
    }

    #[test]
    fn test_product_mapping() {
        let dto: ActiveProductDto = serde_json::from_str(
            r#"{
                "ItemId": " A100 ",
                "Description": "Arabic Coffee",
                "DescriptionAr": "",
                "UnitId": "EA",
                "PLUCode": "00123",
                "ItemBarcode": "6281000000017",
                "SalesTaxGroup": "STORE",
                "ItemSalesTaxGroup": "VAT5",
                "TaxFactor": 0.05
            }"#,
        )
        .unwrap();

        let product = dto.into_product().unwrap();
        assert_eq!(product.item_id, "A100");
        assert_eq!(product.tax_group, "VAT5");
        assert_eq!(product.tax_factor, dec("0.05"));
        assert_eq!(product.plu_code.as_deref(), Some("00123"));
        assert!(product.description_ar.is_none());
    }

    #[test]
    fn test_camel_case_aliases() {
        let dto: ActiveProductPriceDto = serde_json::from_str(
            r#"{"itemId":"A100","unitId":"EA","unitPrice":10.997,"priceIncludeTax":1}"#,
        )
        .unwrap();
        let price = dto.into_unit_price().unwrap();
        assert_eq!(price.unit_price, dec("10.997"));
        assert!(price.includes_tax());
    }

    #[test]
    fn test_mask_mapping() {
        let dto: BarcodeMaskDto = serde_json::from_str(
            r#"{
                "MaskId": "WEIGHT",
                "Description": "Scale labels",
                "Mask": "21XXXXXPPPPPP",
                "Prefix": "21",
                "Length": 13,
                "barcodeSegments": [
                    {"SegmentNum": 2, "Type": "Price", "Length": 6, "Char": "P", "Decimals": 2},
                    {"SegmentNum": 1, "Type": "Product", "Length": 5, "Char": "X", "Decimals": 0}
                ]
            }"#,
        )
        .unwrap();

        let mask = dto.into_mask().unwrap();
        assert_eq!(mask.prefix, 21);
        assert_eq!(mask.length, 13);
        assert_eq!(mask.segments[0].segment_type, SegmentType::Product);
        assert_eq!(mask.segments[1].decimals, 2);
        assert!(mask.matches("2112345003299"));
    }

    #[test]
    fn test_mask_with_bad_prefix_is_rejected() {
        let dto: BarcodeMaskDto =
            serde_json::from_str(r#"{"MaskId":"M1","Prefix":"AB","Length":13}"#).unwrap();
        assert!(matches!(
            dto.into_mask(),
            Err(SyncError::InvalidRecord { ref id, .. }) if id == "M1"
        ));
    }

    #[test]
    fn test_sign_in_request_bodies() {
        let user = GetUserRequest {
            user_id: "000160",
            password: "pa55",
        };
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            serde_json::json!({"_userId": "000160", "_passwordHash": "pa55"})
        );
        assert!(!format!("{:?}", user).contains("pa55"));

        let store = GetStoreRequest {
            user_id: "000160",
            company: "usmf",
        };
        assert_eq!(
            serde_json::to_value(&store).unwrap(),
            serde_json::json!({"_userId": "000160", "_company": "usmf"})
        );
    }

    #[test]
    fn test_user_response_status_and_company() {
        let ok: UserResponse = serde_json::from_str(
            r#"{"Status": "SUCCESS", "Message": "", "CompanyList": ["  ", "usmf", "dat"]}"#,
        )
        .unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.first_company().as_deref(), Some("usmf"));

        let failed: UserResponse =
            serde_json::from_str(r#"{"status": "Failed", "message": "Invalid password", "companyList": null}"#)
                .unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.message.as_deref(), Some("Invalid password"));
        assert_eq!(failed.first_company(), None);
    }

    #[test]
    fn test_store_response_without_status_is_not_success() {
        let response: StoreResponse = serde_json::from_str(r#"{"Warehouse": ["S001"]}"#).unwrap();
        assert!(!response.is_success());
        assert_eq!(response.first_store().as_deref(), Some("S001"));
    }
}

//! Fixtures shared by the register tests.

use rust_decimal::Decimal;

use d365pos_core::{Catalog, Product, UnitPrice};

use crate::state::{AppConfig, StoreSettings};

pub(crate) fn d(text: &str) -> Decimal {
    text.parse().unwrap()
}

fn product(item_id: &str, barcode: &str, description: &str, factor: &str) -> Product {
    Product {
        item_id: item_id.to_string(),
        unit_id: "PCS".to_string(),
        barcode: barcode.to_string(),
        description: description.to_string(),
        description_ar: None,
        plu_code: None,
        tax_group: "VAT5".to_string(),
        tax_factor: d(factor),
    }
}

fn price(item_id: &str, amount: &str, includes_tax: bool) -> UnitPrice {
    UnitPrice {
        item_id: item_id.to_string(),
        unit_id: "PCS".to_string(),
        unit_price: d(amount),
        price_include_tax: if includes_tax { Decimal::ONE } else { Decimal::ZERO },
    }
}

/// Milk 10.500 tax-inclusive, rice 20.000 tax-exclusive, both 5%.
pub(crate) fn sample_catalog() -> Catalog {
    Catalog::new(
        vec![
            product("MILK1L", "6291041500213", "Fresh Milk 1L", "0.05"),
            product("RICE5KG", "6291041500999", "Basmati Rice 5kg", "0.05"),
        ],
        vec![price("MILK1L", "10.500", true), price("RICE5KG", "20.000", false)],
        vec![],
    )
}

pub(crate) fn sample_config() -> AppConfig {
    let mut config = AppConfig {
        store: StoreSettings {
            store_id: "S001".into(),
            terminal_id: "T01".into(),
            staff_id: "000160".into(),
            ..StoreSettings::default()
        },
        ..AppConfig::default()
    };
    config.erp.company = "usmf".into();
    config.receipt.header = vec!["Contoso Market".into()];
    config
}

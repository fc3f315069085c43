//! Catalog records returned by the product/stock service.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::ProductId;
use super::price::Price;

/// A product as described by the catalog service.
///
/// Only `id` is required. Every other field is kept verbatim in `fields` and
/// written back out unchanged, so the persisted cart carries the full record
/// whatever shape the service gives it. The display fields the cart uses are
/// read through [`title`](Self::title), [`image`](Self::image) and
/// [`price`](Self::price), which return `None` when the field is missing or
/// not usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Product {
    /// A product with no metadata.
    #[must_use]
    pub fn new(id: ProductId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    /// Set a metadata field. `id` is not a metadata field and is ignored.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != "id" {
            self.fields.insert(key.to_string(), value.into());
        }
        self
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.fields.get("image").and_then(Value::as_str)
    }

    /// Unit price, from a JSON number or a numeric string.
    #[must_use]
    pub fn price(&self) -> Option<Decimal> {
        match self.fields.get("price")? {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s.trim()),
            _ => None,
        }
    }

    /// Unit price in the storefront currency.
    #[must_use]
    pub fn unit_price(&self) -> Option<Price> {
        self.price().map(Price::new)
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// On-hand stock for a product.
///
/// A live snapshot; the cart never caches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: ProductId,
    pub amount: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_product_keeps_unknown_fields() {
        let json = r#"{"id":3,"title":"Tênis Adidas","price":219.9,"image":"a.jpg","brand":"adidas"}"#;
        let product: Product = serde_json::from_str(json).unwrap();

        assert_eq!(product.id, ProductId::new(3));
        assert_eq!(product.title(), Some("Tênis Adidas"));
        assert_eq!(product.price(), Some(Decimal::new(2199, 1)));
        assert_eq!(product.fields.get("brand"), Some(&Value::from("adidas")));

        let out = serde_json::to_value(&product).unwrap();
        assert_eq!(out, serde_json::from_str::<Value>(json).unwrap());
    }

    #[test]
    fn test_product_needs_only_id() {
        let product: Product = serde_json::from_str(r#"{"id":12}"#).unwrap();

        assert_eq!(product, Product::new(ProductId::new(12)));
        assert_eq!(product.title(), None);
        assert_eq!(product.image(), None);
        assert_eq!(product.unit_price(), None);

        assert!(serde_json::from_str::<Product>(r#"{"title":"no id"}"#).is_err());
    }

    #[test]
    fn test_unusable_display_fields_read_as_none() {
        let product: Product = serde_json::from_value(json!({
            "id": 4,
            "title": null,
            "image": 17,
            "price": "call us",
        }))
        .unwrap();

        assert_eq!(product.title(), None);
        assert_eq!(product.image(), None);
        assert_eq!(product.price(), None);
        // still carried verbatim
        assert_eq!(product.fields["price"], "call us");
    }

    #[test]
    fn test_price_accepts_numbers_and_numeric_strings() {
        let price = |value: Value| Product::new(ProductId::new(1)).with("price", value).price();

        assert_eq!(price(json!(179.9)), Some(Decimal::new(1799, 1)));
        assert_eq!(price(json!(5)), Some(Decimal::new(5, 0)));
        assert_eq!(price(json!(" 139.90 ")), Some(Decimal::new(13990, 2)));
        assert_eq!(price(json!(1.5e2)), Some(Decimal::new(150, 0)));
        assert_eq!(price(json!(null)), None);
    }

    #[test]
    fn test_with_ignores_id() {
        let product = Product::new(ProductId::new(1)).with("id", 99).with("title", "A");
        assert_eq!(product.id, ProductId::new(1));
        assert!(!product.fields.contains_key("id"));
    }

    #[test]
    fn test_stock_rejects_negative_amount() {
        assert!(serde_json::from_str::<Stock>(r#"{"id":1,"amount":-1}"#).is_err());

        let stock: Stock = serde_json::from_str(r#"{"id":1,"amount":3}"#).unwrap();
        assert_eq!(stock.amount, 3);
    }
}

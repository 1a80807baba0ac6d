// Entity access module - typed accessors for each table
//
// Category 1-N Product (products.category_id, nullable, ON DELETE SET NULL)
// Product  N-N Tag     (product_tags join rows, ON DELETE CASCADE both ways)
//
// Functions take `&Connection` so callers can pass a `Transaction` (it derefs)
// and decide where the atomic boundary is.

pub mod category;
pub mod product;
pub mod product_tag;
pub mod tag;

pub use category::{Category, CategoryChanges, CategoryProduct, CategoryWithProducts, NewCategory};
pub use product::{NewProduct, ProductChanges, ProductDetail};
pub use product_tag::{LinkSide, ProductTag};
pub use tag::{NewTag, Tag, TagChanges, TagDetail, TaggedProduct};

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::reconcile::LinkOutcome;

/// What an update endpoint did: attribute rows touched plus link changes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub rows_updated: usize,
    pub links: LinkOutcome,
}

/// Parse a decimal stored as TEXT in column `idx`
pub(crate) fn decimal_from_sql(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse decimal text without rounding; more digits than a `Decimal` holds is an error
pub(crate) fn parse_exact_decimal(text: &str) -> std::result::Result<Decimal, String> {
    let text = text.trim();
    Decimal::from_str_exact(text)
        .map_err(|e| format!("{:?} is not an exact decimal: {}", text, e))
}

/// Exact price from a JSON string or number (numbers keep their source text
/// under serde_json's arbitrary_precision)
pub(crate) fn exact_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    decimal_from_json(&raw).map_err(de::Error::custom)
}

/// `exact_decimal` for optional fields; pair with `#[serde(default)]`
pub(crate) fn exact_decimal_opt<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(raw) => decimal_from_json(&raw).map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

fn decimal_from_json(raw: &serde_json::Value) -> std::result::Result<Decimal, String> {
    match raw {
        serde_json::Value::String(text) => parse_exact_decimal(text),
        serde_json::Value::Number(number) => parse_exact_decimal(&number.to_string()),
        other => Err(format!("expected a decimal string or number, got {}", other)),
    }
}

/// Distinguishes an omitted field (`None`) from an explicit `null` (`Some(None)`).
/// Pair with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn require_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub(crate) fn require_non_negative_stock(stock: i64) -> Result<()> {
    if stock < 0 {
        return Err(Error::Validation(format!(
            "stock must not be negative, got {}",
            stock
        )));
    }
    Ok(())
}

pub(crate) fn require_non_negative_price(price: &Decimal) -> Result<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(Error::Validation(format!(
            "price must not be negative, got {}",
            price
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "double_option")]
        category_id: Option<Option<i64>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_missing() {
        let missing: Body = serde_json::from_str("{}").unwrap();
        let null: Body = serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        let set: Body = serde_json::from_str(r#"{"category_id": 3}"#).unwrap();

        assert_eq!(missing.category_id, None);
        assert_eq!(null.category_id, Some(None));
        assert_eq!(set.category_id, Some(Some(3)));
    }

    #[derive(Debug, Deserialize)]
    struct Priced {
        #[serde(deserialize_with = "exact_decimal")]
        price: Decimal,
        #[serde(default, deserialize_with = "exact_decimal_opt")]
        sale_price: Option<Decimal>,
    }

    #[test]
    fn test_exact_decimal_keeps_source_digits() {
        let from_number: Priced = serde_json::from_str(r#"{"price": 4.10}"#).unwrap();
        let from_string: Priced = serde_json::from_str(r#"{"price": "14.990"}"#).unwrap();

        assert_eq!(from_number.price.to_string(), "4.10");
        assert_eq!(from_string.price.to_string(), "14.990");
        assert_eq!(from_number.sale_price, None);
    }

    #[test]
    fn test_exact_decimal_rejects_digits_it_cannot_hold() {
        let long = "0.123456789012345678901234567891";

        assert!(serde_json::from_str::<Priced>(&format!(r#"{{"price": "{}"}}"#, long)).is_err());
        assert!(serde_json::from_str::<Priced>(&format!(r#"{{"price": {}}}"#, long)).is_err());
        assert!(serde_json::from_str::<Priced>(
            &format!(r#"{{"price": "1.00", "sale_price": {}}}"#, long)
        )
        .is_err());
        assert!(serde_json::from_str::<Priced>(r#"{"price": true}"#).is_err());
    }

    #[test]
    fn test_optional_exact_decimal_accepts_null() {
        let priced: Priced = serde_json::from_str(r#"{"price": "1", "sale_price": null}"#).unwrap();
        assert_eq!(priced.sale_price, None);
    }

    #[test]
    fn test_decimal_from_sql_is_exact() {
        let price = decimal_from_sql(2, "14.990").unwrap();
        assert_eq!(price.to_string(), "14.990");

        assert!(decimal_from_sql(2, "cheap").is_err());
    }

    #[test]
    fn test_field_checks() {
        assert!(require_name("tag_name", "  ").is_err());
        assert!(require_name("tag_name", "blue").is_ok());
        assert!(require_non_negative_stock(-1).is_err());
        assert!(require_non_negative_stock(0).is_ok());
        assert!(require_non_negative_price(&Decimal::new(-1, 2)).is_err());
        assert!(require_non_negative_price(&Decimal::ZERO).is_ok());
    }
}

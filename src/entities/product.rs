// 📦 Product - priced, stocked item; optional Category, any number of Tags
//
// price is an exact decimal end to end: TEXT in SQLite, rust_decimal in
// memory, a JSON string on the way out.

use rusqlite::{params, params_from_iter, types::Value, Connection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use super::category::Category;
use super::product_tag::{self, LinkSide, LINKED_EVENT};
use super::tag::Tag;
use super::{
    decimal_from_sql, double_option, exact_decimal, exact_decimal_opt, require_name,
    require_non_negative_price, require_non_negative_stock, UpdateOutcome,
};
use crate::db::{placeholders, row_exists};
use crate::error::{Error, Result};
use crate::reconcile::reconcile_links;

// ============================================================================
// TYPES
// ============================================================================

/// Product with its Category and Tags eagerly attached (category_id hidden)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetail {
    pub id: i64,
    pub product_name: String,
    pub price: Decimal,
    pub stock: i64,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
}

/// Create payload. `tagIds` links the new product to existing tags.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub product_name: String,
    #[serde(deserialize_with = "exact_decimal")]
    pub price: Decimal,
    pub stock: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default, rename = "tagIds")]
    pub tag_ids: Vec<i64>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<()> {
        require_name("product_name", &self.product_name)?;
        require_non_negative_price(&self.price)?;
        require_non_negative_stock(self.stock)
    }
}

/// Partial update payload.
///
/// `category_id: null` clears the category, an omitted `category_id` keeps it.
/// `tagIds` omitted or empty leaves the product's tags untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "exact_decimal_opt")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, rename = "tagIds")]
    pub tag_ids: Option<Vec<i64>>,
}

impl ProductChanges {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.product_name {
            require_name("product_name", name)?;
        }
        if let Some(price) = &self.price {
            require_non_negative_price(price)?;
        }
        if let Some(stock) = self.stock {
            require_non_negative_stock(stock)?;
        }
        Ok(())
    }

    fn assignments(&self) -> Vec<(&'static str, Value)> {
        let mut assignments = Vec::new();

        if let Some(name) = &self.product_name {
            assignments.push(("product_name", Value::Text(name.clone())));
        }
        if let Some(price) = &self.price {
            assignments.push(("price", Value::Text(price.to_string())));
        }
        if let Some(stock) = self.stock {
            assignments.push(("stock", Value::Integer(stock)));
        }
        if let Some(category_id) = self.category_id {
            let value = category_id.map(Value::Integer).unwrap_or(Value::Null);
            assignments.push(("category_id", value));
        }

        assignments
    }
}

// ============================================================================
// QUERIES
// ============================================================================

const SELECT_DETAIL: &str = "
    SELECT p.id, p.product_name, p.price, p.stock,
           c.id, c.category_name,
           t.id, t.tag_name
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN product_tags pt ON pt.product_id = p.id
    LEFT JOIN tags t ON t.id = pt.tag_id
    WHERE (?1 IS NULL OR p.id = ?1)
    ORDER BY p.id ASC, t.id ASC";

/// All products ordered by id, each with its tags ordered by id
pub fn find_all(conn: &Connection) -> rusqlite::Result<Vec<ProductDetail>> {
    load_details(conn, None)
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<ProductDetail>> {
    Ok(load_details(conn, Some(id))?.into_iter().next())
}

fn load_details(conn: &Connection, id: Option<i64>) -> rusqlite::Result<Vec<ProductDetail>> {
    let mut stmt = conn.prepare(SELECT_DETAIL)?;
    let mut rows = stmt.query(params![id])?;

    let mut products: Vec<ProductDetail> = Vec::new();

    while let Some(row) = rows.next()? {
        let product_id: i64 = row.get(0)?;
        if products.last().map(|p| p.id) != Some(product_id) {
            let raw_price: String = row.get(2)?;
            let category = match row.get::<_, Option<i64>>(4)? {
                Some(category_id) => Some(Category {
                    id: category_id,
                    category_name: row.get(5)?,
                }),
                None => None,
            };

            products.push(ProductDetail {
                id: product_id,
                product_name: row.get(1)?,
                price: decimal_from_sql(2, &raw_price)?,
                stock: row.get(3)?,
                category,
                tags: Vec::new(),
            });
        }

        if let Some(tag_id) = row.get::<_, Option<i64>>(6)? {
            if let Some(product) = products.last_mut() {
                product.tags.push(Tag {
                    id: tag_id,
                    tag_name: row.get(7)?,
                });
            }
        }
    }

    Ok(products)
}

/// Which of `ids` name existing products (in request order, deduplicated)
pub fn existing_ids(conn: &Connection, ids: &[i64]) -> rusqlite::Result<Vec<i64>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT id FROM products WHERE id IN ({})",
        placeholders(ids.len(), 0)
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map(params_from_iter(ids.iter()), |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<HashSet<i64>>>()?;

    let mut seen = HashSet::new();
    Ok(ids
        .iter()
        .copied()
        .filter(|id| found.contains(id) && seen.insert(*id))
        .collect())
}

/// IDs of every product whose name is in `names`, ascending
pub fn ids_by_name(conn: &Connection, names: &[String]) -> rusqlite::Result<Vec<i64>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT id FROM products WHERE product_name IN ({}) ORDER BY id ASC",
        placeholders(names.len(), 0)
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(names.iter()), |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    Ok(ids)
}

/// Insert the product row and link it to every `tagIds` entry.
///
/// There is no prior link state for a new product, so the tags are inserted
/// directly. An unknown tag id fails with a constraint error; run inside a
/// transaction so the product row goes away with it.
pub fn create(conn: &Connection, new: &NewProduct) -> Result<i64> {
    new.validate()?;

    conn.execute(
        "INSERT INTO products (product_name, price, stock, category_id) VALUES (?1, ?2, ?3, ?4)",
        params![
            new.product_name,
            new.price.to_string(),
            new.stock,
            new.category_id
        ],
    )?;
    let id = conn.last_insert_rowid();

    let mut seen = HashSet::new();
    let pairs: Vec<_> = new
        .tag_ids
        .iter()
        .copied()
        .filter(|tag_id| seen.insert(*tag_id))
        .map(|tag_id| LinkSide::Product.pair(id, tag_id))
        .collect();

    if !pairs.is_empty() {
        product_tag::bulk_create(conn, &pairs)?;
        let linked: Vec<i64> = pairs.iter().map(|p| p.tag_id).collect();
        product_tag::record_link_change(conn, LinkSide::Product, id, LINKED_EVENT, &linked)?;
    }

    info!(product_id = id, tags = pairs.len(), "product created");
    Ok(id)
}

/// Apply attribute changes and, when `tagIds` is supplied, reconcile the
/// product's tags against it. Run inside one transaction.
pub fn update(conn: &Connection, id: i64, changes: &ProductChanges) -> Result<UpdateOutcome> {
    changes.validate()?;

    if !row_exists(conn, "products", id)? {
        return Err(Error::not_found("product", id));
    }

    let assignments = changes.assignments();
    let rows_updated = if assignments.is_empty() {
        0
    } else {
        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE products SET {} WHERE id = ?{}",
            set_clause,
            assignments.len() + 1
        );
        let values = assignments
            .into_iter()
            .map(|(_, value)| value)
            .chain(std::iter::once(Value::Integer(id)));

        conn.execute(&sql, params_from_iter(values))?
    };

    let links = reconcile_links(conn, LinkSide::Product, id, changes.tag_ids.as_deref())?;

    Ok(UpdateOutcome {
        rows_updated,
        links,
    })
}

pub fn destroy(conn: &Connection, id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM products WHERE id = ?1", [id])
}

// 🗂️ Category - owns zero or more Products through products.category_id
//
// Deleting a category does not delete its products; the foreign key is
// ON DELETE SET NULL so they simply become uncategorized.

use rusqlite::{params, params_from_iter, types::Value, Connection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::tag::Tag;
use super::{decimal_from_sql, require_name};
use crate::error::Result;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub category_name: String,
}

/// Category with its products eagerly attached (each with its tags)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryWithProducts {
    pub id: i64,
    pub category_name: String,
    pub products: Vec<CategoryProduct>,
}

/// Product as nested under a category (no category_id, tags attached)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryProduct {
    pub id: i64,
    pub product_name: String,
    pub price: Decimal,
    pub stock: i64,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub category_name: String,
}

impl NewCategory {
    pub fn validate(&self) -> Result<()> {
        require_name("category_name", &self.category_name)
    }
}

/// Partial update; omitted fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryChanges {
    #[serde(default)]
    pub category_name: Option<String>,
}

impl CategoryChanges {
    pub fn validate(&self) -> Result<()> {
        match &self.category_name {
            Some(name) => require_name("category_name", name),
            None => Ok(()),
        }
    }
}

// ============================================================================
// QUERIES
// ============================================================================

const SELECT_WITH_PRODUCTS: &str = "
    SELECT c.id, c.category_name,
           p.id, p.product_name, p.price, p.stock,
           t.id, t.tag_name
    FROM categories c
    LEFT JOIN products p ON p.category_id = c.id
    LEFT JOIN product_tags pt ON pt.product_id = p.id
    LEFT JOIN tags t ON t.id = pt.tag_id
    WHERE (?1 IS NULL OR c.id = ?1)
    ORDER BY c.id ASC, p.id ASC, t.id ASC";

/// All categories ordered by id, products by id, tags by id
pub fn find_all(conn: &Connection) -> rusqlite::Result<Vec<CategoryWithProducts>> {
    load_with_products(conn, None)
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<CategoryWithProducts>> {
    Ok(load_with_products(conn, Some(id))?.into_iter().next())
}

fn load_with_products(
    conn: &Connection,
    id: Option<i64>,
) -> rusqlite::Result<Vec<CategoryWithProducts>> {
    let mut stmt = conn.prepare(SELECT_WITH_PRODUCTS)?;
    let mut rows = stmt.query(params![id])?;

    // Rows arrive sorted, so each level only ever appends to its last entry
    let mut categories: Vec<CategoryWithProducts> = Vec::new();

    while let Some(row) = rows.next()? {
        let category_id: i64 = row.get(0)?;
        if categories.last().map(|c| c.id) != Some(category_id) {
            categories.push(CategoryWithProducts {
                id: category_id,
                category_name: row.get(1)?,
                products: Vec::new(),
            });
        }
        let Some(category) = categories.last_mut() else {
            continue;
        };

        let Some(product_id) = row.get::<_, Option<i64>>(2)? else {
            continue;
        };
        if category.products.last().map(|p| p.id) != Some(product_id) {
            let raw_price: String = row.get(4)?;
            category.products.push(CategoryProduct {
                id: product_id,
                product_name: row.get(3)?,
                price: decimal_from_sql(4, &raw_price)?,
                stock: row.get(5)?,
                tags: Vec::new(),
            });
        }

        if let Some(tag_id) = row.get::<_, Option<i64>>(6)? {
            if let Some(product) = category.products.last_mut() {
                product.tags.push(Tag {
                    id: tag_id,
                    tag_name: row.get(7)?,
                });
            }
        }
    }

    Ok(categories)
}

pub fn create(conn: &Connection, new: &NewCategory) -> Result<Category> {
    new.validate()?;

    conn.execute(
        "INSERT INTO categories (category_name) VALUES (?1)",
        [&new.category_name],
    )?;

    Ok(Category {
        id: conn.last_insert_rowid(),
        category_name: new.category_name.clone(),
    })
}

/// Apply the supplied attributes; returns affected row count (0 when nothing matched)
pub fn update(conn: &Connection, id: i64, changes: &CategoryChanges) -> Result<usize> {
    changes.validate()?;

    let mut assignments: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(name) = &changes.category_name {
        assignments.push("category_name");
        values.push(Value::Text(name.clone()));
    }

    if assignments.is_empty() {
        return Ok(0);
    }

    let set_clause = assignments
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ?{}", column, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE categories SET {} WHERE id = ?{}",
        set_clause,
        values.len() + 1
    );
    values.push(Value::Integer(id));

    Ok(conn.execute(&sql, params_from_iter(values))?)
}

pub fn destroy(conn: &Connection, id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM categories WHERE id = ?1", [id])
}

// 🏷️ Tag - labels attached to any number of Products through product_tags

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use super::category::Category;
use super::product::{existing_ids, ids_by_name};
use super::product_tag::{self, LinkSide, LINKED_EVENT};
use super::{require_name, UpdateOutcome};
use crate::error::{Error, Result};
use crate::reconcile::reconcile_links;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub tag_name: String,
}

/// Tag with its products eagerly attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagDetail {
    pub id: i64,
    pub tag_name: String,
    pub products: Vec<TaggedProduct>,
}

/// Product as nested under a tag: id, name and its category only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedProduct {
    pub id: i64,
    pub product_name: String,
    pub category: Option<Category>,
}

/// Create payload.
///
/// `productIds` links by id (ids naming no product are skipped),
/// `taggedProducts` links by product name. Both may be given; the union is linked.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub tag_name: String,
    #[serde(default, rename = "productIds")]
    pub product_ids: Vec<i64>,
    #[serde(default, rename = "taggedProducts")]
    pub tagged_products: Vec<String>,
}

impl NewTag {
    pub fn validate(&self) -> Result<()> {
        require_name("tag_name", &self.tag_name)
    }
}

/// Partial update payload; `productIds` omitted or empty leaves links untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagChanges {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default, rename = "productIds")]
    pub product_ids: Option<Vec<i64>>,
}

impl TagChanges {
    pub fn validate(&self) -> Result<()> {
        match &self.tag_name {
            Some(name) => require_name("tag_name", name),
            None => Ok(()),
        }
    }
}

/// Order of the products nested under each tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductOrder {
    Ascending,
    Descending,
}

impl ProductOrder {
    fn as_sql(self) -> &'static str {
        match self {
            ProductOrder::Ascending => "ASC",
            ProductOrder::Descending => "DESC",
        }
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// All tags by id; nested products newest id first (the list endpoint's
/// historical ordering, kept for client compatibility)
pub fn find_all(conn: &Connection) -> rusqlite::Result<Vec<TagDetail>> {
    load_details(conn, None, ProductOrder::Descending)
}

/// One tag; nested products by ascending id
pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<TagDetail>> {
    Ok(load_details(conn, Some(id), ProductOrder::Ascending)?
        .into_iter()
        .next())
}

fn load_details(
    conn: &Connection,
    id: Option<i64>,
    order: ProductOrder,
) -> rusqlite::Result<Vec<TagDetail>> {
    let sql = format!(
        "SELECT t.id, t.tag_name,
                p.id, p.product_name,
                c.id, c.category_name
         FROM tags t
         LEFT JOIN product_tags pt ON pt.tag_id = t.id
         LEFT JOIN products p ON p.id = pt.product_id
         LEFT JOIN categories c ON c.id = p.category_id
         WHERE (?1 IS NULL OR t.id = ?1)
         ORDER BY t.id ASC, p.id {}",
        order.as_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id])?;

    let mut tags: Vec<TagDetail> = Vec::new();

    while let Some(row) = rows.next()? {
        let tag_id: i64 = row.get(0)?;
        if tags.last().map(|t| t.id) != Some(tag_id) {
            tags.push(TagDetail {
                id: tag_id,
                tag_name: row.get(1)?,
                products: Vec::new(),
            });
        }

        let Some(product_id) = row.get::<_, Option<i64>>(2)? else {
            continue;
        };
        let category = match row.get::<_, Option<i64>>(4)? {
            Some(category_id) => Some(Category {
                id: category_id,
                category_name: row.get(5)?,
            }),
            None => None,
        };

        if let Some(tag) = tags.last_mut() {
            tag.products.push(TaggedProduct {
                id: product_id,
                product_name: row.get(3)?,
                category,
            });
        }
    }

    Ok(tags)
}

pub fn find_row(conn: &Connection, id: i64) -> rusqlite::Result<Option<Tag>> {
    conn.query_row("SELECT id, tag_name FROM tags WHERE id = ?1", [id], |row| {
        Ok(Tag {
            id: row.get(0)?,
            tag_name: row.get(1)?,
        })
    })
    .optional()
}

/// Insert the tag and link it to the requested products. Run inside a transaction.
pub fn create(conn: &Connection, new: &NewTag) -> Result<i64> {
    new.validate()?;

    conn.execute("INSERT INTO tags (tag_name) VALUES (?1)", [&new.tag_name])?;
    let id = conn.last_insert_rowid();

    // ids first (request order), then name matches not already covered
    let mut seen = HashSet::new();
    let product_ids: Vec<i64> = existing_ids(conn, &new.product_ids)?
        .into_iter()
        .chain(ids_by_name(conn, &new.tagged_products)?)
        .filter(|product_id| seen.insert(*product_id))
        .collect();

    if !product_ids.is_empty() {
        let pairs: Vec<_> = product_ids
            .iter()
            .map(|product_id| LinkSide::Tag.pair(id, *product_id))
            .collect();
        product_tag::bulk_create(conn, &pairs)?;
        product_tag::record_link_change(conn, LinkSide::Tag, id, LINKED_EVENT, &product_ids)?;
    }

    info!(tag_id = id, products = product_ids.len(), "tag created");
    Ok(id)
}

/// Apply attribute changes and, when `productIds` is supplied, reconcile the
/// tag's products against it. Run inside one transaction.
pub fn update(conn: &Connection, id: i64, changes: &TagChanges) -> Result<UpdateOutcome> {
    changes.validate()?;

    if find_row(conn, id)?.is_none() {
        return Err(Error::not_found("tag", id));
    }

    let rows_updated = match &changes.tag_name {
        Some(name) => conn.execute(
            "UPDATE tags SET tag_name = ?1 WHERE id = ?2",
            params![name, id],
        )?,
        None => 0,
    };

    let links = reconcile_links(conn, LinkSide::Tag, id, changes.product_ids.as_deref())?;

    Ok(UpdateOutcome {
        rows_updated,
        links,
    })
}

pub fn destroy(conn: &Connection, id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM tags WHERE id = ?1", [id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;

    impl TagDetail {
        fn product_ids(&self) -> Vec<i64> {
            self.products.iter().map(|p| p.id).collect()
        }
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO categories (category_name) VALUES ('Shirts');
             INSERT INTO products (product_name, price, stock, category_id) VALUES
                ('Plain T-Shirt', '14.99', 14, 1),
                ('Running Sneakers', '90.00', 25, NULL),
                ('Branded Baseball Hat', '22.99', 12, NULL);",
        )
        .unwrap();
        conn
    }

    fn new_tag(name: &str, product_ids: Vec<i64>, tagged_products: Vec<&str>) -> NewTag {
        NewTag {
            tag_name: name.to_string(),
            product_ids,
            tagged_products: tagged_products.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_create_by_ids_skips_unknown_products() {
        let conn = test_conn();

        let id = create(&conn, &new_tag("gold", vec![3, 99, 1], vec![])).unwrap();
        let tag = find_by_id(&conn, id).unwrap().unwrap();

        assert_eq!(tag.product_ids(), vec![1, 3]);
        assert_eq!(
            tag.products[0].category.as_ref().map(|c| c.category_name.as_str()),
            Some("Shirts")
        );
        assert_eq!(tag.products[1].category, None);
    }

    #[test]
    fn test_create_by_ids_and_names_is_additive() {
        let conn = test_conn();

        let id = create(
            &conn,
            &new_tag("white", vec![1], vec!["Plain T-Shirt", "Running Sneakers", "Nope"]),
        )
        .unwrap();

        assert_eq!(find_by_id(&conn, id).unwrap().unwrap().product_ids(), vec![1, 2]);
    }

    #[test]
    fn test_list_orders_products_descending_get_ascending() {
        let conn = test_conn();
        create(&conn, &new_tag("red", vec![1, 2, 3], vec![])).unwrap();
        create(&conn, &new_tag("empty", vec![], vec![])).unwrap();

        let all = find_all(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].product_ids(), vec![3, 2, 1]);
        assert!(all[1].products.is_empty());

        assert_eq!(find_by_id(&conn, 1).unwrap().unwrap().product_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_update_reconciles_products() {
        let conn = test_conn();
        let id = create(&conn, &new_tag("blue", vec![1, 2], vec![])).unwrap();

        let changes = TagChanges {
            tag_name: Some("navy".to_string()),
            product_ids: Some(vec![2, 3]),
        };
        let outcome = update(&conn, id, &changes).unwrap();

        assert_eq!(outcome.rows_updated, 1);
        assert_eq!(outcome.links.deleted, 1);
        assert_eq!(outcome.links.created, Some(vec![LinkSide::Tag.pair(id, 3)]));

        let tag = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(tag.tag_name, "navy");
        assert_eq!(tag.product_ids(), vec![2, 3]);
    }

    #[test]
    fn test_update_with_empty_product_ids_is_noop() {
        let conn = test_conn();
        let id = create(&conn, &new_tag("blue", vec![1, 2], vec![])).unwrap();

        let changes = TagChanges {
            tag_name: None,
            product_ids: Some(vec![]),
        };
        let outcome = update(&conn, id, &changes).unwrap();

        assert_eq!(outcome, UpdateOutcome::default());
        assert_eq!(find_by_id(&conn, id).unwrap().unwrap().product_ids(), vec![1, 2]);
    }

    #[test]
    fn test_update_missing_tag() {
        let conn = test_conn();
        let err = update(&conn, 5, &TagChanges::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_destroy() {
        let conn = test_conn();
        let id = create(&conn, &new_tag("gold", vec![1], vec![])).unwrap();

        assert_eq!(destroy(&conn, id).unwrap(), 1);
        assert!(find_row(&conn, id).unwrap().is_none());
        assert_eq!(destroy(&conn, id).unwrap(), 0);
    }
}

// 🔗 ProductTag - join rows of the Product N-N Tag relation
//
// Identity is the (product_id, tag_id) pair; the primary key keeps each pair
// unique. Rows are only written as a side effect of linking/unlinking and are
// never addressed directly by a client.

use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::db::{insert_event, placeholders, Event};
use crate::error::Result;

pub const LINKED_EVENT: &str = "product_tags_linked";
pub const UNLINKED_EVENT: &str = "product_tags_unlinked";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductTag {
    pub product_id: i64,
    pub tag_id: i64,
}

// ============================================================================
// LINK SIDE
// ============================================================================

/// Which end of the relation is held fixed while the other end is edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    /// Editing one product's tags
    Product,

    /// Editing one tag's products
    Tag,
}

impl LinkSide {
    pub fn fixed_column(self) -> &'static str {
        match self {
            LinkSide::Product => "product_id",
            LinkSide::Tag => "tag_id",
        }
    }

    pub fn linked_column(self) -> &'static str {
        match self {
            LinkSide::Product => "tag_id",
            LinkSide::Tag => "product_id",
        }
    }

    /// Audit trail entity type for the fixed side
    pub fn entity_type(self) -> &'static str {
        match self {
            LinkSide::Product => "product",
            LinkSide::Tag => "tag",
        }
    }

    pub fn pair(self, fixed_id: i64, linked_id: i64) -> ProductTag {
        match self {
            LinkSide::Product => ProductTag {
                product_id: fixed_id,
                tag_id: linked_id,
            },
            LinkSide::Tag => ProductTag {
                product_id: linked_id,
                tag_id: fixed_id,
            },
        }
    }

    /// The id on the linked (non-fixed) side of a join row
    pub fn linked_id(self, pair: &ProductTag) -> i64 {
        match self {
            LinkSide::Product => pair.tag_id,
            LinkSide::Tag => pair.product_id,
        }
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// IDs currently linked to `fixed_id` on the opposite side
pub fn linked_ids(conn: &Connection, side: LinkSide, fixed_id: i64) -> rusqlite::Result<BTreeSet<i64>> {
    let sql = format!(
        "SELECT {} FROM product_tags WHERE {} = ?1",
        side.linked_column(),
        side.fixed_column()
    );
    let mut stmt = conn.prepare(&sql)?;

    let ids = stmt
        .query_map([fixed_id], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<i64>>>()?;

    Ok(ids)
}

/// Insert every pair, in order; returns the rows created
pub fn bulk_create(conn: &Connection, pairs: &[ProductTag]) -> rusqlite::Result<Vec<ProductTag>> {
    let mut stmt = conn.prepare("INSERT INTO product_tags (product_id, tag_id) VALUES (?1, ?2)")?;

    for pair in pairs {
        stmt.execute(params![pair.product_id, pair.tag_id])?;
    }

    debug!(count = pairs.len(), "join rows inserted");
    Ok(pairs.to_vec())
}

/// Delete the links between `fixed_id` and each of `linked`; returns rows removed
pub fn destroy_links(
    conn: &Connection,
    side: LinkSide,
    fixed_id: i64,
    linked: &BTreeSet<i64>,
) -> rusqlite::Result<usize> {
    if linked.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "DELETE FROM product_tags WHERE {} = ?1 AND {} IN ({})",
        side.fixed_column(),
        side.linked_column(),
        placeholders(linked.len(), 1)
    );

    let values = std::iter::once(fixed_id).chain(linked.iter().copied());
    let deleted = conn.execute(&sql, params_from_iter(values))?;

    debug!(deleted, "join rows deleted");
    Ok(deleted)
}

/// Write one audit event for a batch of link changes
pub fn record_link_change(
    conn: &Connection,
    side: LinkSide,
    fixed_id: i64,
    event_type: &str,
    linked: &[i64],
) -> Result<()> {
    if linked.is_empty() {
        return Ok(());
    }

    let event = Event::new(
        event_type,
        side.entity_type(),
        &fixed_id.to_string(),
        serde_json::json!({ side.linked_column(): linked }),
        "api",
    );
    insert_event(conn, &event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_events_for_entity, setup_database};

    fn seeded_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO products (product_name, price, stock) VALUES ('Hat', '22.99', 12);
             INSERT INTO products (product_name, price, stock) VALUES ('Shorts', '29.99', 22);
             INSERT INTO tags (tag_name) VALUES ('red');
             INSERT INTO tags (tag_name) VALUES ('blue');
             INSERT INTO tags (tag_name) VALUES ('green');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_pair_orientation() {
        assert_eq!(
            LinkSide::Product.pair(1, 9),
            ProductTag { product_id: 1, tag_id: 9 }
        );
        assert_eq!(
            LinkSide::Tag.pair(1, 9),
            ProductTag { product_id: 9, tag_id: 1 }
        );
        assert_eq!(LinkSide::Tag.linked_id(&ProductTag { product_id: 9, tag_id: 1 }), 9);
    }

    #[test]
    fn test_bulk_create_and_linked_ids_from_both_sides() {
        let conn = seeded_conn();

        bulk_create(
            &conn,
            &[
                ProductTag { product_id: 1, tag_id: 1 },
                ProductTag { product_id: 1, tag_id: 3 },
                ProductTag { product_id: 2, tag_id: 3 },
            ],
        )
        .unwrap();

        let tags_of_hat = linked_ids(&conn, LinkSide::Product, 1).unwrap();
        let products_of_green = linked_ids(&conn, LinkSide::Tag, 3).unwrap();

        assert_eq!(tags_of_hat.into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(products_of_green.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let conn = seeded_conn();
        let pair = ProductTag { product_id: 1, tag_id: 2 };
        bulk_create(&conn, &[pair]).unwrap();

        let err = bulk_create(&conn, &[pair]).unwrap_err();
        assert!(matches!(
            crate::error::Error::from(err),
            crate::error::Error::Constraint(_)
        ));
    }

    #[test]
    fn test_destroy_links_only_touches_fixed_side() {
        let conn = seeded_conn();
        bulk_create(
            &conn,
            &[
                ProductTag { product_id: 1, tag_id: 1 },
                ProductTag { product_id: 1, tag_id: 2 },
                ProductTag { product_id: 2, tag_id: 1 },
            ],
        )
        .unwrap();

        let deleted =
            destroy_links(&conn, LinkSide::Product, 1, &BTreeSet::from([1, 2, 3])).unwrap();

        assert_eq!(deleted, 2);
        assert!(linked_ids(&conn, LinkSide::Product, 1).unwrap().is_empty());
        assert_eq!(linked_ids(&conn, LinkSide::Tag, 1).unwrap(), BTreeSet::from([2]));
        assert_eq!(
            destroy_links(&conn, LinkSide::Product, 1, &BTreeSet::new()).unwrap(),
            0
        );
    }

    #[test]
    fn test_record_link_change() {
        let conn = seeded_conn();

        record_link_change(&conn, LinkSide::Tag, 2, LINKED_EVENT, &[1, 2]).unwrap();
        record_link_change(&conn, LinkSide::Tag, 2, UNLINKED_EVENT, &[]).unwrap();

        let events = get_events_for_entity(&conn, "tag", "2").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data["product_id"], serde_json::json!([1, 2]));
    }
}

// ⚖️ Association Reconciler - sync one parent's links with a requested set
//
// Given the ids currently linked to a fixed product (or tag) and the full
// set the caller wants linked:
//
//   to_insert = desired - current   (paired with the fixed id)
//   to_delete = current - desired
//
// Pairs already linked and still wanted are never touched. The two sets are
// disjoint by construction, so the delete and the insert have no ordering
// requirement between them.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

use crate::entities::product_tag::{self, LinkSide, ProductTag, LINKED_EVENT, UNLINKED_EVENT};
use crate::error::Result;

// ============================================================================
// PLAN
// ============================================================================

/// The minimal set of join-row writes that turns `current` into `desired`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlan {
    pub side: LinkSide,
    pub fixed_id: i64,

    /// New join rows, in the order the caller listed them
    pub to_insert: Vec<ProductTag>,

    /// Linked-side ids whose join rows go away
    pub to_delete: BTreeSet<i64>,
}

impl LinkPlan {
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }
}

/// Pure set difference; no I/O
pub fn plan_links(
    side: LinkSide,
    fixed_id: i64,
    current: &BTreeSet<i64>,
    desired: &[i64],
) -> LinkPlan {
    let wanted: HashSet<i64> = desired.iter().copied().collect();

    let mut queued = HashSet::new();
    let to_insert = desired
        .iter()
        .copied()
        .filter(|id| !current.contains(id) && queued.insert(*id))
        .map(|id| side.pair(fixed_id, id))
        .collect();

    let to_delete = current
        .iter()
        .copied()
        .filter(|id| !wanted.contains(id))
        .collect();

    LinkPlan {
        side,
        fixed_id,
        to_insert,
        to_delete,
    }
}

// ============================================================================
// APPLY
// ============================================================================

/// What a reconciliation wrote
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkOutcome {
    /// Join rows removed
    pub deleted: usize,

    /// Join rows created; `None` when no writes were attempted
    pub created: Option<Vec<ProductTag>>,
}

/// Reconcile the links of `fixed_id` against `desired`.
///
/// `desired` absent or empty skips reconciliation entirely and leaves every
/// existing link in place; an empty list does not mean "unlink everything".
///
/// Current links are read through `conn`, so call this on the same
/// transaction that will commit the writes: the read and both writes then
/// succeed or roll back together.
pub fn reconcile_links(
    conn: &Connection,
    side: LinkSide,
    fixed_id: i64,
    desired: Option<&[i64]>,
) -> Result<LinkOutcome> {
    let desired = match desired {
        Some(ids) if !ids.is_empty() => ids,
        _ => {
            debug!(?side, fixed_id, "no links requested, skipping reconciliation");
            return Ok(LinkOutcome::default());
        }
    };

    let current = product_tag::linked_ids(conn, side, fixed_id)?;
    let plan = plan_links(side, fixed_id, &current, desired);

    if plan.is_noop() {
        debug!(?side, fixed_id, "links already match");
        return Ok(LinkOutcome::default());
    }

    let deleted = product_tag::destroy_links(conn, side, fixed_id, &plan.to_delete)?;
    let created = product_tag::bulk_create(conn, &plan.to_insert)?;

    let unlinked: Vec<i64> = plan.to_delete.iter().copied().collect();
    let linked: Vec<i64> = created.iter().map(|pair| side.linked_id(pair)).collect();
    product_tag::record_link_change(conn, side, fixed_id, UNLINKED_EVENT, &unlinked)?;
    product_tag::record_link_change(conn, side, fixed_id, LINKED_EVENT, &linked)?;

    info!(
        ?side,
        fixed_id,
        deleted,
        inserted = created.len(),
        "links reconciled"
    );

    Ok(LinkOutcome {
        deleted,
        created: Some(created),
    })
}

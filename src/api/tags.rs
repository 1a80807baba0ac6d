// /api/tags handlers - mirror of products for the other side of the relation

use axum::{extract::State, Json};
use rusqlite::TransactionBehavior;
use serde::Serialize;
use tracing::info;

use super::{ApiJson, ApiPath, AppState};
use crate::entities::{tag, NewTag, ProductTag, TagChanges, TagDetail};
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagUpdateResponse {
    pub is_tag_updated: usize,
    pub deleted_product_tags_count: usize,
    pub new_product_tags: Option<Vec<ProductTag>>,
}

/// GET /api/tags - products nested in descending id order
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagDetail>>> {
    let tags = state.db.call(|conn| Ok(tag::find_all(conn)?)).await?;
    Ok(Json(tags))
}

/// GET /api/tags/:id - products nested in ascending id order
pub async fn get_tag(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<TagDetail>> {
    let found = state
        .db
        .call(move |conn| Ok(tag::find_by_id(conn, id)?))
        .await?;

    found.map(Json).ok_or_else(|| Error::not_found("tag", id))
}

/// POST /api/tags - links `productIds` and `taggedProducts` in the same transaction
pub async fn create_tag(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewTag>,
) -> Result<Json<TagDetail>> {
    let created = state
        .db
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id = tag::create(&tx, &body)?;
            tx.commit()?;

            tag::find_by_id(conn, id)?.ok_or_else(|| Error::not_found("tag", id))
        })
        .await?;

    Ok(Json(created))
}

/// PUT /api/tags/:id
pub async fn update_tag(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<TagChanges>,
) -> Result<Json<TagUpdateResponse>> {
    let outcome = state
        .db
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let outcome = tag::update(&tx, id, &body)?;
            tx.commit()?;
            Ok(outcome)
        })
        .await?;

    info!(
        tag_id = id,
        rows_updated = outcome.rows_updated,
        links_deleted = outcome.links.deleted,
        "tag updated"
    );

    Ok(Json(TagUpdateResponse {
        is_tag_updated: outcome.rows_updated,
        deleted_product_tags_count: outcome.links.deleted,
        new_product_tags: outcome.links.created,
    }))
}

/// DELETE /api/tags/:id
pub async fn delete_tag(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<usize>> {
    let deleted = state
        .db
        .call(move |conn| Ok(tag::destroy(conn, id)?))
        .await?;

    if deleted == 0 {
        return Err(Error::not_found("tag", id));
    }

    info!(tag_id = id, "tag deleted");
    Ok(Json(deleted))
}

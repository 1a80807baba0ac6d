// /api/products handlers

use axum::{extract::State, Json};
use rusqlite::TransactionBehavior;
use serde::Serialize;
use tracing::info;

use super::{ApiJson, ApiPath, AppState};
use crate::entities::{product, NewProduct, ProductChanges, ProductDetail, ProductTag};
use crate::error::{Error, Result};

/// PUT response: attribute rows changed plus what the tag reconciliation wrote
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdateResponse {
    pub is_product_updated: usize,
    pub deleted_product_tags_count: usize,
    pub new_product_tags: Option<Vec<ProductTag>>,
}

/// GET /api/products - every product with its category and tags
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<ProductDetail>>> {
    let products = state
        .db
        .call(|conn| Ok(product::find_all(conn)?))
        .await?;

    Ok(Json(products))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ProductDetail>> {
    let found = state
        .db
        .call(move |conn| Ok(product::find_by_id(conn, id)?))
        .await?;

    found.map(Json).ok_or_else(|| Error::not_found("product", id))
}

/// POST /api/products - creates the row and its tag links atomically, then
/// responds with the re-fetched product
pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<Json<ProductDetail>> {
    let created = state
        .db
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id = product::create(&tx, &body)?;
            tx.commit()?;

            product::find_by_id(conn, id)?.ok_or_else(|| Error::not_found("product", id))
        })
        .await?;

    Ok(Json(created))
}

/// PUT /api/products/:id - attribute changes and tag reconciliation commit together
pub async fn update_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ProductChanges>,
) -> Result<Json<ProductUpdateResponse>> {
    let outcome = state
        .db
        .call(move |conn| {
            // IMMEDIATE takes the write lock before the current links are read
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let outcome = product::update(&tx, id, &body)?;
            tx.commit()?;
            Ok(outcome)
        })
        .await?;

    info!(
        product_id = id,
        rows_updated = outcome.rows_updated,
        links_deleted = outcome.links.deleted,
        "product updated"
    );

    Ok(Json(ProductUpdateResponse {
        is_product_updated: outcome.rows_updated,
        deleted_product_tags_count: outcome.links.deleted,
        new_product_tags: outcome.links.created,
    }))
}

/// DELETE /api/products/:id - join rows go with it (ON DELETE CASCADE)
pub async fn delete_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<usize>> {
    let deleted = state
        .db
        .call(move |conn| Ok(product::destroy(conn, id)?))
        .await?;

    if deleted == 0 {
        return Err(Error::not_found("product", id));
    }

    info!(product_id = id, "product deleted");
    Ok(Json(deleted))
}

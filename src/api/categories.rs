// /api/categories handlers

use axum::{extract::State, Json};
use tracing::info;

use super::{ApiJson, ApiPath, AppState};
use crate::entities::{category, Category, CategoryChanges, CategoryWithProducts, NewCategory};
use crate::error::{Error, Result};

/// GET /api/categories - every category with its products and their tags
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryWithProducts>>> {
    let categories = state
        .db
        .call(|conn| Ok(category::find_all(conn)?))
        .await?;

    Ok(Json(categories))
}

/// GET /api/categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<CategoryWithProducts>> {
    let found = state
        .db
        .call(move |conn| Ok(category::find_by_id(conn, id)?))
        .await?;

    found
        .map(Json)
        .ok_or_else(|| Error::not_found("category", id))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewCategory>,
) -> Result<Json<Category>> {
    let created = state
        .db
        .call(move |conn| category::create(conn, &body))
        .await?;

    info!(category_id = created.id, "category created");
    Ok(Json(created))
}

/// PUT /api/categories/:id - responds `[affectedRowCount]`
pub async fn update_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CategoryChanges>,
) -> Result<Json<[usize; 1]>> {
    let affected = state
        .db
        .call(move |conn| category::update(conn, id, &body))
        .await?;

    Ok(Json([affected]))
}

/// DELETE /api/categories/:id - responds with the affected row count
pub async fn delete_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<usize>> {
    let deleted = state
        .db
        .call(move |conn| Ok(category::destroy(conn, id)?))
        .await?;

    if deleted == 0 {
        return Err(Error::not_found("category", id));
    }

    info!(category_id = id, "category deleted");
    Ok(Json(deleted))
}

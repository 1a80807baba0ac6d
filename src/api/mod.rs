//! REST API over the catalog.
//!
//! GET/POST        /api/categories      GET/PUT/DELETE /api/categories/:id
//! GET/POST        /api/products        GET/PUT/DELETE /api/products/:id
//! GET/POST        /api/tags            GET/PUT/DELETE /api/tags/:id
//! GET             /api/health

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::db::Database;
use crate::error::Error;

pub mod categories;
pub mod products;
pub mod tags;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// JSON body extractor whose rejections (bad JSON, missing or mistyped
/// fields, wrong content type) come back as 400 with a `message`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

/// Path extractor; an unparsable id is a 400 with a `message` like any other
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct ApiPath<T>(pub T);

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::Constraint(_) => StatusCode::BAD_REQUEST,
            Error::Database(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // driver internals stay in the log, never in the response
        let message = if self.is_client_error() {
            warn!(status = status.as_u16(), error = %self, "request rejected");
            self.to_string()
        } else {
            error!(error = ?self, "request failed");
            "Internal server error".to_string()
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": crate::VERSION }))
}

/// Build the full router around an already-open database
pub fn router(db: Database) -> Router {
    let state = AppState { db };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route(
            "/tags/:id",
            get(tags::get_tag)
                .put(tags::update_tag)
                .delete(tags::delete_tag),
        )
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

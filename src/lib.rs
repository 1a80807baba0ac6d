// Shop Catalog - Core Library
// Categories, products and tags over SQLite, shared by the CLI, the API server and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod reconcile;
pub mod seed;

#[cfg(feature = "server")]
pub mod api;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use config::{Config, DbLocation};
pub use db::{
    clear_all, get_events_for_entity, insert_event, open_connection, setup_database, Database,
    Event,
};
pub use entities::{
    Category, CategoryChanges, CategoryWithProducts, LinkSide, NewCategory, NewProduct, NewTag,
    ProductChanges, ProductDetail, ProductTag, Tag, TagChanges, TagDetail, UpdateOutcome,
};
pub use error::{Error, Result};
pub use reconcile::{plan_links, reconcile_links, LinkOutcome, LinkPlan};
pub use seed::{load_seeds, SeedSummary};

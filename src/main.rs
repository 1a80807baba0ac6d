// Shop Catalog CLI
//
//   shop-catalog schema       create the tables in the configured database
//   shop-catalog seed [DIR]   replace the catalog with the CSV seed set (default: seeds/)

use anyhow::Result;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use shop_catalog::seed::DEFAULT_SEED_DIR;
use shop_catalog::{load_seeds, open_connection, Config, DbLocation};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shop_catalog=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("schema") => run_schema(),
        Some("seed") => {
            let dir = args
                .get(2)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SEED_DIR));
            run_seed(dir)
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn run_schema() -> Result<()> {
    let config = Config::from_env()?;
    open_connection(&config.db)?;
    println!("✓ Schema ready in {}", describe(&config.db));
    Ok(())
}

fn run_seed(dir: PathBuf) -> Result<()> {
    let config = Config::from_env()?;
    if config.db == DbLocation::Memory {
        eprintln!("⚠️  DB_NAME=:memory: - seeded rows vanish when this process exits");
    }

    let mut conn = open_connection(&config.db)?;
    let summary = load_seeds(&mut conn, &dir)?;

    println!("🌱 Seeded {}", describe(&config.db));
    println!("   {} categories", summary.categories);
    println!("   {} products", summary.products);
    println!("   {} tags", summary.tags);
    println!("   {} product tags", summary.product_tags);

    Ok(())
}

fn describe(location: &DbLocation) -> String {
    match location {
        DbLocation::File(path) => path.display().to_string(),
        DbLocation::Memory => "in-memory database".to_string(),
    }
}

fn print_usage() {
    println!("Shop Catalog {}", shop_catalog::VERSION);
    println!();
    println!("Usage:");
    println!("  shop-catalog schema       Create tables in the configured database");
    println!("  shop-catalog seed [DIR]   Reset the catalog from CSV seeds (default: {})", DEFAULT_SEED_DIR);
    println!();
    println!("Environment: DB_NAME, DB_DIR (see .env.example)");
    println!("Run the API with: cargo run --bin shop-server");
}

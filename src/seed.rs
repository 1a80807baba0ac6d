// 🌱 Seed loader - demo catalog from CSV files
//
// DIR/categories.csv    category_name
// DIR/products.csv      product_name,price,stock,category_id
// DIR/tags.csv          tag_name
// DIR/product_tags.csv  product_id,tag_id
//
// Ids are assigned in file order starting at 1, so product_tags.csv and the
// category_id column can refer to rows by line position.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::db::clear_all;
use crate::entities::{
    category, parse_exact_decimal, product, product_tag, tag, NewCategory, NewProduct, NewTag,
    ProductTag,
};

pub const DEFAULT_SEED_DIR: &str = "seeds";

#[derive(Debug, Deserialize)]
struct ProductSeed {
    product_name: String,
    // read as text: csv would otherwise infer an f64 for "14.99"
    price: String,
    stock: i64,
    category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TagSeed {
    tag_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub tags: usize,
    pub product_tags: usize,
}

fn load_csv<T>(path: &Path) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open seed file {}", path.display()))?;

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let row: T = result.with_context(|| {
            format!("Failed to parse {} record {}", path.display(), line + 1)
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Replace the whole catalog with the seed files in `dir` (one transaction)
pub fn load_seeds(conn: &mut Connection, dir: &Path) -> Result<SeedSummary> {
    let categories: Vec<NewCategory> = load_csv(&dir.join("categories.csv"))?;
    let products: Vec<ProductSeed> = load_csv(&dir.join("products.csv"))?;
    let tags: Vec<TagSeed> = load_csv(&dir.join("tags.csv"))?;
    let links: Vec<ProductTag> = load_csv(&dir.join("product_tags.csv"))?;

    let tx = conn.transaction()?;
    clear_all(&tx)?;

    for new in &categories {
        category::create(&tx, new)?;
    }

    for seed in &products {
        let price = parse_exact_decimal(&seed.price)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid price for {}", seed.product_name))?;
        let new = NewProduct {
            product_name: seed.product_name.clone(),
            price,
            stock: seed.stock,
            category_id: seed.category_id,
            tag_ids: Vec::new(),
        };
        product::create(&tx, &new)?;
    }

    for seed in &tags {
        let new = NewTag {
            tag_name: seed.tag_name.clone(),
            product_ids: Vec::new(),
            tagged_products: Vec::new(),
        };
        tag::create(&tx, &new)?;
    }

    product_tag::bulk_create(&tx, &links).context("Failed to link seeded products and tags")?;

    tx.commit()?;

    let summary = SeedSummary {
        categories: categories.len(),
        products: products.len(),
        tags: tags.len(),
        product_tags: links.len(),
    };
    info!(?summary, dir = %dir.display(), "catalog seeded");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use std::fs;

    fn write_fixture(dir: &Path) {
        fs::write(dir.join("categories.csv"), "category_name\nShirts\nShoes\n").unwrap();
        fs::write(
            dir.join("products.csv"),
            "product_name,price,stock,category_id\n\
             Plain T-Shirt,14.99,14,1\n\
             Running Sneakers,90.00,25,2\n\
             Mystery Box,5.50,3,\n",
        )
        .unwrap();
        fs::write(dir.join("tags.csv"), "tag_name\nred\nblue\n").unwrap();
        fs::write(
            dir.join("product_tags.csv"),
            "product_id,tag_id\n1,1\n1,2\n2,2\n",
        )
        .unwrap();
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_load_seeds() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let mut conn = test_conn();

        let summary = load_seeds(&mut conn, dir.path()).unwrap();

        assert_eq!(
            summary,
            SeedSummary {
                categories: 2,
                products: 3,
                tags: 2,
                product_tags: 3,
            }
        );

        let tee = product::find_by_id(&conn, 1).unwrap().unwrap();
        assert_eq!(tee.price.to_string(), "14.99");
        assert_eq!(tee.tag_ids(), vec![1, 2]);

        let sneakers = product::find_by_id(&conn, 2).unwrap().unwrap();
        assert_eq!(sneakers.price.to_string(), "90.00");

        let mystery = product::find_by_id(&conn, 3).unwrap().unwrap();
        assert_eq!(mystery.category, None);
    }

    #[test]
    fn test_reseeding_replaces_catalog() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let mut conn = test_conn();

        load_seeds(&mut conn, dir.path()).unwrap();
        load_seeds(&mut conn, dir.path()).unwrap();

        assert_eq!(category::find_all(&conn).unwrap().len(), 2);
        assert_eq!(product::find_all(&conn).unwrap().len(), 3);
        assert_eq!(tag::find_all(&conn).unwrap()[0].id, 1);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = test_conn();

        let err = load_seeds(&mut conn, dir.path()).unwrap_err();
        assert!(err.to_string().contains("categories.csv"));
    }

    #[test]
    fn test_bad_link_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(dir.path().join("product_tags.csv"), "product_id,tag_id\n1,9\n").unwrap();
        let mut conn = test_conn();

        assert!(load_seeds(&mut conn, dir.path()).is_err());
        assert!(category::find_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_price_with_too_many_digits_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(
            dir.path().join("products.csv"),
            "product_name,price,stock,category_id\n\
             Plain T-Shirt,0.123456789012345678901234567891,14,1\n",
        )
        .unwrap();
        fs::write(dir.path().join("product_tags.csv"), "product_id,tag_id\n").unwrap();
        let mut conn = test_conn();

        let err = load_seeds(&mut conn, dir.path()).unwrap_err();

        assert!(err.to_string().contains("Plain T-Shirt"));
        assert!(product::find_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_shipped_seed_set_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_SEED_DIR);
        let mut conn = test_conn();

        let summary = load_seeds(&mut conn, &dir).unwrap();

        assert_eq!(summary.categories, 5);
        assert_eq!(summary.tags, 8);
        assert!(summary.product_tags > 0);
    }
}

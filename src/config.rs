// Process configuration read from the environment (.env is loaded by the binaries)

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_DB_NAME: &str = "ecommerce_db";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;

/// Where the SQLite database lives
#[derive(Debug, Clone, PartialEq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbLocation,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Read `DB_NAME`, `DB_DIR`, `HOST`, `PORT` from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (tests pass a closure over a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_name = non_empty("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
        let db = if db_name == ":memory:" {
            DbLocation::Memory
        } else {
            let dir = non_empty("DB_DIR").unwrap_or_else(|| ".".to_string());
            DbLocation::File(PathBuf::from(dir).join(format!("{}.sqlite3", db_name)))
        };

        let host = non_empty("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {:?}", raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Config { db, host, port })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

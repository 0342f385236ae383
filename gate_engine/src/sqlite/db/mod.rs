//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite queries behind [`crate::SqliteDatabase`].
//!
//! Each query is a plain function that accepts a `&mut SqliteConnection`. Callers can obtain a connection from the
//! pool, or open a transaction when several statements must apply atomically, and call through without any other
//! changes.
//!
//! Identifiers are stored as text. A stored value that no longer parses is reported as
//! [`StoreError::InconsistentData`] rather than skipped.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

use crate::errors::StoreError;

pub mod credentials;
pub mod policies;
pub mod roles;
pub mod two_factor;

const SQLITE_DB_URL: &str = "sqlite://data/gatekeeper.db";

pub fn db_url() -> String {
    let result = env::var("GATE_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ GATE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| StoreError::InconsistentData(format!("{column} = '{value}': {e}")))
}

//! SQLite backend for the gatekeeper lookup stores.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;

//! Helpers for tests in this crate and in crates that depend on it (enable the `test_utils` feature).
mod memory_store;
#[cfg(feature = "sqlite")]
pub mod prepare_env;

pub use memory_store::MemoryStore;

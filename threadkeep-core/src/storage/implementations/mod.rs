//! Storage implementations
//!
//! This module contains concrete implementations of the storage traits.
//!
//! ## Available Implementations
//!
//! - `sqlite/` - SQLite-backed `DataLayer` (requires `sqlite` feature)
//! - `fs/` - Filesystem-based storage client for element payloads
//! - `memory/` - In-memory storage client for testing

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod fs;
pub mod memory;

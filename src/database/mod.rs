//! Database module for PostgreSQL interactions
pub mod client;
pub mod enrich;
pub mod error;

// Re-export most commonly used types
pub use client::Database;
pub use enrich::{ActionEnrichment, PgEnrichment};
pub use error::Error;

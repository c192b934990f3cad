//! Sleuth - investigation record search service
//!
//! Sleuth provides the search layer of an incident investigation platform:
//! callers supply a sparse set of optional filters and receive fully hydrated
//! action, command, agent, or investigator records from PostgreSQL.

pub mod config;
pub mod core;
pub mod database;
pub mod search;

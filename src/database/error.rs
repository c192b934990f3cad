/// Search-layer error taxonomy.
///
/// Every failure surfaces synchronously to the caller; nothing in this layer
/// retries or suppresses. An `Err` result means the returned collection must
/// not be trusted, even if rows were produced before the failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A supplied identifier filter is not a valid number. Raised before any
    /// query is built.
    #[error("invalid {field} filter {value:?}: expected a numeric identifier")]
    InvalidFilter { field: &'static str, value: String },

    #[error("failed to acquire database connection: {0}")]
    Acquire(#[source] sqlx::Error),

    /// The assembled query text was rejected at preparation. Carries the
    /// query text for diagnosis of builder defects and schema drift.
    #[error("error while preparing search statement: '{source}' in '{query}'")]
    Prepare {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    /// The store rejected or failed the prepared query.
    #[error("error while executing search query: {0}")]
    Query(#[source] sqlx::Error),

    /// A result row's column layout did not match the expected scan targets.
    #[error("failed to scan result row: {0}")]
    Scan(#[source] sqlx::Error),

    /// An embedded sub-document column was not valid JSON for its type.
    #[error("failed to decode {column}: {source}")]
    Decode {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A secondary counters/investigators lookup failed.
    #[error("failed to enrich action {action_id}: {source}")]
    Enrich {
        action_id: i64,
        #[source]
        source: sqlx::Error,
    },

    #[error("Connection error: {0}")]
    Connection(String),
}

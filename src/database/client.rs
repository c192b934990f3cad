use crate::{config::DatabaseConfig, database::error::Error};
use sqlx::postgres::PgConnectOptions;
use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use std::{fmt, time::Duration};

pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    /// Creates a new Database instance using the provided configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self, Error> {
        let options: PgConnectOptions =
            config.url.parse().map_err(|e: sqlx::Error| Error::Connection(e.to_string()))?;

        let pool = PgPoolOptions::new()
            .min_connections(2)
            .max_connections(config.max_connections)
            .test_before_acquire(true)
            .idle_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(1800))
            .acquire_timeout(Duration::from_secs(config.timeout_seconds))
            .connect_lazy_with(options);

        // Validate pool on startup
        let db = Database { pool };
        if !db.check_connection().await? {
            return Err(Error::Connection("Failed initial connection check".into()));
        }

        Ok(db)
    }

    // Tests the database connection
    pub async fn check_connection(&self) -> Result<bool, Error> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Database connection check failed: {}", e);
                Ok(false)
            },
        }
    }

    /// Gets safe connection details for logging or display.
    /// This method masks sensitive information like passwords in the database URL.
    pub fn get_connection_info(&self) -> Result<DatabaseConnectionInfo, Error> {
        let opts = self.pool.connect_options();
        DatabaseConnectionInfo::from_options(&opts)
    }

    /// Logs information about the database connection.
    /// This is safe to use in production as it masks sensitive information.
    pub fn log_connection_info(&self) {
        match self.get_connection_info() {
            Ok(info) => {
                tracing::info!("Connected to database: {}", info);
            },
            Err(e) => {
                tracing::warn!("Unable to get database connection info: {}", e);
            },
        }
    }
}

/// A struct containing safe-to-display database connection information.
/// Sensitive details like passwords are masked.
#[derive(Debug, Clone)]
pub struct DatabaseConnectionInfo {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub user: String,
}

impl DatabaseConnectionInfo {
    /// Create a new DatabaseConnectionInfo from PgConnectOptions
    fn from_options(options: &PgConnectOptions) -> Result<Self, Error> {
        Ok(Self {
            host: options.get_host().to_string(),
            port: options.get_port(),
            database_name: options.get_database().unwrap_or("unknown").to_string(),
            user: options.get_username().to_string(),
        })
    }
}

impl fmt::Display for DatabaseConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "postgresql://{}@{}:{}/{}", self.user, self.host, self.port, self.database_name)
    }
}

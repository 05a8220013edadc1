//! CLI command implementations.

pub mod legacy;
pub mod migrate;
pub mod reset;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Password hashing or other account setup failed.
    #[error("Account setup error: {0}")]
    Auth(#[from] marketstall_api::services::auth::AuthError),

    /// Export file could not be read.
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Export file is not the expected JSON.
    #[error("Invalid export {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    /// `legacy import` was run with nothing to import.
    #[error("Nothing to import: pass --vendors and/or --buyers")]
    NothingToImport,
}

/// Connect using `MARKETSTALL_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("MARKETSTALL_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("MARKETSTALL_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = marketstall_api::db::create_pool(&database_url).await?;
    Ok(pool)
}

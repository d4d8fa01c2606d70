//! CLI command implementations.

pub mod migrate;
pub mod user;

use picmaker_core::EmailError;
use picmaker_server::db::RepositoryError;
use picmaker_server::services::auth::AuthError;
use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("No account with email: {0}")]
    UserNotFound(String),
}

/// Connect using the same database variables as the server.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("PICS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CliError::MissingEnvVar("PICS_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = picmaker_server::db::create_pool(&SecretString::from(database_url)).await?;
    Ok(pool)
}

//! Account management commands.
//!
//! The active flag is the only way to disable an account; there is no HTTP
//! endpoint for it.

use picmaker_core::{Email, UserId};
use picmaker_server::db::{PgUserRepository, UserStore};
use picmaker_server::services::auth::register_user;

use super::{CliError, connect};

/// Create an account with the same rules as the registration endpoint.
pub async fn create(email: &str, name: &str, password: &str) -> Result<UserId, CliError> {
    let users = PgUserRepository::new(connect().await?);

    let user = register_user(&users, name, email, password).await?;

    tracing::info!(
        "Account created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}

/// Set the active flag on an existing account.
pub async fn set_active(email: &str, active: bool) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let users = PgUserRepository::new(connect().await?);

    if !users.set_active(&email, active).await? {
        return Err(CliError::UserNotFound(email.to_string()));
    }

    tracing::info!(%email, active, "Account updated");
    Ok(())
}

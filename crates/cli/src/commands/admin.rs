//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin with a password (promotes the account if it exists)
//! drape-cli admin create -n "Asha Rao" -e asha@drape.store -p 'long-password'
//!
//! # Promote an existing customer
//! drape-cli admin promote -i asha@drape.store
//! ```

use drape_api::db::UserRepository;
use drape_api::models::{Identifier, User};
use drape_api::services::auth::{AuthError, AuthService};
use thiserror::Error;

use crate::ConnectError;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("{0}")]
    InvalidIdentifier(String),

    #[error("No user found for {0}")]
    UserNotFound(String),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Repository(#[from] drape_api::db::RepositoryError),
}

/// Create an admin with a password, or promote the existing account.
///
/// # Errors
///
/// Returns `AdminError` for invalid input or database failures.
pub async fn create(
    name: &str,
    email: Option<&str>,
    mobile: Option<&str>,
    password: &str,
) -> Result<User, AdminError> {
    let identifier = Identifier::from_parts(email, mobile).map_err(AdminError::InvalidIdentifier)?;
    let pool = crate::connect().await?;
    let users = UserRepository::new(&pool);

    let user = match users.get_by_identifier(&identifier).await? {
        Some(existing) => {
            tracing::warn!(
                user_id = %existing.id,
                "Account already exists; promoting it without changing its password"
            );
            existing
        }
        None => {
            AuthService::new(&pool)
                .register_with_password(name, email, mobile, password)
                .await?
        }
    };

    let admin = users.set_admin(user.id, true).await?;
    tracing::info!(
        "Admin ready! ID: {}, Identifier: {}",
        admin.id,
        admin.primary_identifier()
    );
    Ok(admin)
}

/// Promote an existing user to admin.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if no account matches.
pub async fn promote(identifier: &str) -> Result<User, AdminError> {
    let parsed = Identifier::parse(identifier).map_err(AdminError::InvalidIdentifier)?;
    let pool = crate::connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_identifier(&parsed)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(identifier.to_owned()))?;

    if user.is_admin {
        tracing::info!(user_id = %user.id, "User is already an admin");
        return Ok(user);
    }

    let admin = users.set_admin(user.id, true).await?;
    tracing::info!(user_id = %admin.id, "User promoted to admin");
    Ok(admin)
}

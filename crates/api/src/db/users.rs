//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use drape_core::{Email, Mobile, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{Identifier, User};

const USER_COLUMNS: &str = "id, name, email, mobile, password_hash IS NOT NULL AS has_password, \
     google_id IS NOT NULL AS google_linked, is_admin, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: Option<String>,
    mobile: Option<String>,
    has_password: bool,
    google_linked: bool,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = r
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;
        let mobile = r
            .mobile
            .as_deref()
            .map(Mobile::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid mobile in database: {e}"))
            })?;

        Ok(Self {
            id: r.id,
            name: r.name,
            email,
            mobile,
            has_password: r.has_password,
            google_linked: r.google_linked,
            is_admin: r.is_admin,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Stored one-time password state for a user.
#[derive(Debug, Clone)]
pub struct OtpState {
    pub user: User,
    pub code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct OtpRow {
    #[sqlx(flatten)]
    user: UserRow,
    otp_code: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct PasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

/// Fields accepted by a profile update; `None` leaves the column unchanged.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub mobile: Option<Mobile>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by email or mobile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {} = $1",
            identifier_column(identifier)
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(identifier.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their linked Google account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_google_id(&self, google_id: &str) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = $1"))
                .bind(google_id)
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Store an OTP for the identifier, creating the user if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_otp(
        &self,
        identifier: &Identifier,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        let column = identifier_column(identifier);
        let sql = format!(
            r"
            INSERT INTO users ({column}, otp_code, otp_expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT ({column}) DO UPDATE
                SET otp_code = EXCLUDED.otp_code,
                    otp_expires_at = EXCLUDED.otp_expires_at,
                    updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(identifier.as_str())
            .bind(code)
            .bind(expires_at)
            .fetch_one(self.pool)
            .await?;

        User::try_from(row)
    }

    /// Get the stored OTP for the identifier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_otp(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<OtpState>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, otp_code, otp_expires_at FROM users WHERE {} = $1",
            identifier_column(identifier)
        );
        let row: Option<OtpRow> = sqlx::query_as(&sql)
            .bind(identifier.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(|r| {
            Ok(OtpState {
                user: User::try_from(r.user)?,
                code: r.otp_code,
                expires_at: r.otp_expires_at,
            })
        })
        .transpose()
    }

    /// Clear a consumed OTP.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_otp(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE users SET otp_code = NULL, otp_expires_at = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Create a new user with a password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or mobile already exists.
    pub async fn create_with_password(
        &self,
        name: &str,
        email: Option<&Email>,
        mobile: Option<&Mobile>,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO users (name, email, mobile, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(name)
        .bind(email.map(Email::as_str))
        .bind(mobile.map(Mobile::as_str))
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "an account with this email or mobile"))?;

        User::try_from(row)
    }

    /// Get a user together with their password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<(User, Option<String>)>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE {} = $1",
            identifier_column(identifier)
        );
        let row: Option<PasswordRow> = sqlx::query_as(&sql)
            .bind(identifier.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Set or replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Link a Google account to an existing user, filling in a missing name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the Google account is linked elsewhere.
    pub async fn link_google(
        &self,
        id: UserId,
        google_id: &str,
        name: &str,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users
            SET google_id = $2,
                name = CASE WHEN name = '' THEN $3 ELSE name END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(google_id)
        .bind(name)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "google account link"))?;

        row.map(User::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Create a user from a verified Google identity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create_from_google(
        &self,
        name: &str,
        email: &Email,
        google_id: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO users (name, email, google_id)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(name)
        .bind(email.as_str())
        .bind(google_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "an account with this email"))?;

        User::try_from(row)
    }

    /// Update name, email and/or mobile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new email or mobile is taken.
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                mobile = COALESCE($4, mobile),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.email.as_ref().map(Email::as_str))
        .bind(update.mobile.as_ref().map(Mobile::as_str))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "an account with this email or mobile"))?;

        row.map(User::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Grant or revoke admin access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(is_admin)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Whether any admin account exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn admin_exists(&self) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE is_admin)")
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }
}

const fn identifier_column(identifier: &Identifier) -> &'static str {
    match identifier {
        Identifier::Email(_) => "email",
        Identifier::Mobile(_) => "mobile",
    }
}

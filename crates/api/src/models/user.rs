//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use drape_core::{Email, Mobile, UserId};

/// A storefront customer or administrator.
///
/// At least one of `email` / `mobile` is always present.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name (may be empty for OTP-created accounts).
    pub name: String,
    /// Email address, if known.
    pub email: Option<Email>,
    /// Mobile number in E.164 form, if known.
    pub mobile: Option<Mobile>,
    /// Whether a password has been set.
    pub has_password: bool,
    /// Whether the account is linked to Google Sign-In.
    pub google_linked: bool,
    /// Whether the user may use the admin surface.
    pub is_admin: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Email if present, else mobile. Used for logs and invoices.
    #[must_use]
    pub fn primary_identifier(&self) -> &str {
        self.email
            .as_ref()
            .map(Email::as_str)
            .or_else(|| self.mobile.as_ref().map(Mobile::as_str))
            .unwrap_or_default()
    }
}

/// How a user identifies themselves at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(Email),
    Mobile(Mobile),
}

impl Identifier {
    /// Parse free text as an email when it contains `@`, otherwise as a mobile number.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message when the value is neither.
    pub fn parse(value: &str) -> Result<Self, String> {
        if value.contains('@') {
            Email::parse(value)
                .map(Self::Email)
                .map_err(|e| format!("Invalid email: {e}"))
        } else {
            Mobile::parse(value)
                .map(Self::Mobile)
                .map_err(|e| format!("Invalid mobile number: {e}"))
        }
    }

    /// Build from the optional `email` / `mobile` request fields, email first.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message when neither is given or the value is invalid.
    pub fn from_parts(email: Option<&str>, mobile: Option<&str>) -> Result<Self, String> {
        let email = email.map(str::trim).filter(|s| !s.is_empty());
        let mobile = mobile.map(str::trim).filter(|s| !s.is_empty());
        match (email, mobile) {
            (Some(e), _) => Email::parse(e)
                .map(Self::Email)
                .map_err(|e| format!("Invalid email: {e}")),
            (None, Some(m)) => Mobile::parse(m)
                .map(Self::Mobile)
                .map_err(|e| format!("Invalid mobile number: {e}")),
            (None, None) => Err("Email or mobile number is required".to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(e) => e.as_str(),
            Self::Mobile(m) => m.as_str(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parse() {
        assert!(matches!(
            Identifier::parse("Meera@Drape.in").unwrap(),
            Identifier::Email(e) if e.as_str() == "meera@drape.in"
        ));
        assert!(matches!(
            Identifier::parse("98765 43210").unwrap(),
            Identifier::Mobile(m) if m.as_str() == "+919876543210"
        ));
        assert!(Identifier::parse("not a thing").is_err());
    }

    #[test]
    fn test_identifier_from_parts() {
        assert!(matches!(
            Identifier::from_parts(Some(" "), Some("9876543210")).unwrap(),
            Identifier::Mobile(_)
        ));
        assert_eq!(
            Identifier::from_parts(None, None).unwrap_err(),
            "Email or mobile number is required"
        );
    }
}

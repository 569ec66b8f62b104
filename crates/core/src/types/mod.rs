//! Core types for Drape.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod mobile;
pub mod money;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use mobile::{Mobile, MobileError};
pub use money::{CURRENCY_CODE, percent_of, round_money, to_paise};
pub use slug::slugify;
pub use status::*;

//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password, OTP and Google sign-in; JWT issuing
//! - `google` - Google ID token verification
//! - `pricing` - Coupon validation and checkout totals
//! - `orders` - Checkout and the order lifecycle
//! - `home` - Cached homepage aggregate
//! - `email` / `sms` - OTP and order notifications
//! - `razorpay` / `upi` - Payment collection
//! - `invoice` - PDF invoices
//! - `uploads` - Image storage

pub mod auth;
pub mod email;
pub mod google;
pub mod home;
pub mod invoice;
pub mod orders;
pub mod pricing;
pub mod razorpay;
pub mod sms;
pub mod uploads;
pub mod upi;

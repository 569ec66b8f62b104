//! Domain models for the Drape API.
//!
//! These are validated domain objects, separate from the row types in `db`.
//! All of them serialize straight into API responses.

pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod home;
pub mod order;
pub mod settings;
pub mod user;

pub use cart::{Cart, CartLine};
pub use catalog::{Category, Collection, ColorVariant, Product};
pub use coupon::Coupon;
pub use home::HomeSection;
pub use order::{Order, OrderItem, ShippingAddress};
pub use settings::StoreSettings;
pub use user::{Identifier, User};

//! Domain models for the storefront.
//!
//! - Table-storage entities: [`Product`], [`Order`], [`Customer`]
//! - Relational rows: [`User`], [`CartItem`]
//! - Queue payloads: [`OrderNotification`], [`StockUpdate`]
//! - Session state: [`CurrentUser`], [`Flash`]

mod cart;
mod customer;
mod messages;
mod order;
mod product;
pub mod session;
mod user;

pub use cart::{CartItem, CartLine};
pub use customer::Customer;
pub use messages::{OrderNotification, StockUpdate};
pub use order::Order;
pub use product::Product;
pub use session::{CurrentUser, Flash, FlashKind, keys as session_keys};
pub use user::User;

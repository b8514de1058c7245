//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Username/password accounts in `PostgreSQL`
//! - `cart` - Per-user cart rows joined with table-storage products
//! - `customers` - Customer profiles with fallback to registered users
//! - `orders` - Order placement, maintenance and dashboard figures
//! - `products` - Catalog maintenance and product images

pub mod auth;
pub mod cart;
pub mod customers;
pub mod orders;
pub mod products;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use customers::{CustomerError, CustomerInput, CustomerService};
pub use orders::{NewOrder, OrderEdit, OrderError, OrderService};
pub use products::{ProductError, ProductInput, ProductService};

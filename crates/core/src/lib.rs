//! CloudMart Core - Shared types library.
//!
//! This crate provides the domain types used across all CloudMart components:
//! - `storefront` - Web application (catalog, cart, orders, admin pages)
//! - `cli` - Command-line tools for migrations, provisioning and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, usernames, emails, roles and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

//! Registered user row.

use chrono::{DateTime, Utc};

use cloudmart_core::{Role, UserId};

/// A registered user (relational store).
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

//! Customer profile entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::TableEntity;

use super::User;

/// A customer profile in the `Customers` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Customer {
    pub partition_key: String,
    pub row_key: String,
    #[serde(skip_serializing)]
    pub timestamp: Option<DateTime<Utc>>,
    pub username: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub shipping_address: String,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub etag: Option<String>,
}

impl Customer {
    /// A blank profile with a fresh row key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partition_key: Self::KIND.to_owned(),
            row_key: uuid::Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    /// Minimal profile for a registered user, keyed by username.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            partition_key: Self::KIND.to_owned(),
            row_key: user.username.clone(),
            username: user.username.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.row_key
    }

    /// "Name Surname", falling back to the username when both are blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.name.trim(), self.surname.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }
}

impl TableEntity for Customer {
    const KIND: &'static str = "Customer";
    const DATE_PROPERTIES: &'static [&'static str] = &["UpdatedAt"];

    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use cloudmart_core::{Role, UserId};

    use super::*;

    #[test]
    fn test_from_user_keys_by_username() {
        let user = User {
            id: UserId::new(7),
            username: "maya".to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
        };
        let customer = Customer::from_user(&user);
        assert_eq!(customer.row_key, "maya");
        assert_eq!(customer.partition_key, "Customer");
        assert!(customer.email.is_empty());
        assert_eq!(customer.display_name(), "maya");
    }

    #[test]
    fn test_display_name() {
        let customer = Customer {
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            ..Customer::default()
        };
        assert_eq!(customer.display_name(), "Ada Lovelace");
    }
}

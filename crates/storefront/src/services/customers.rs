//! Customer profiles.
//!
//! Profiles live in the `Customers` table. Registered users that never had
//! a profile written still show up: the list falls back to the user table
//! when no profiles exist, and opening a user's profile creates it.

use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use cloudmart_core::{Email, EmailError, Username, UsernameError};

use crate::db::{RepositoryError, UserRepository};
use crate::models::{Customer, User};
use crate::storage::{StorageError, StorageService, TableEntity};

#[derive(Debug, Error)]
pub enum CustomerError {
    #[error("customer not found")]
    NotFound,

    #[error("{0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("{0}")]
    InvalidEmail(#[from] EmailError),

    /// A profile with this key already exists.
    #[error("customer already exists")]
    AlreadyExists,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Editable profile fields, as posted by the customer form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerInput {
    pub username: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub shipping_address: String,
}

impl CustomerInput {
    /// Copy validated fields onto `customer`. A blank email is allowed.
    fn apply_to(&self, customer: &mut Customer) -> Result<(), CustomerError> {
        let username = Username::parse(&self.username)?;
        let email = if self.email.trim().is_empty() {
            String::new()
        } else {
            Email::parse(&self.email)?.into_inner()
        };

        customer.username = username.into_inner();
        customer.name = self.name.trim().to_owned();
        customer.surname = self.surname.trim().to_owned();
        customer.email = email;
        customer.shipping_address = self.shipping_address.trim().to_owned();
        customer.updated_at = Some(Utc::now());
        Ok(())
    }
}

impl From<&Customer> for CustomerInput {
    fn from(customer: &Customer) -> Self {
        Self {
            username: customer.username.clone(),
            name: customer.name.clone(),
            surname: customer.surname.clone(),
            email: customer.email.clone(),
            shipping_address: customer.shipping_address.clone(),
        }
    }
}

pub struct CustomerService<'a> {
    storage: &'a StorageService,
    users: UserRepository<'a>,
}

impl<'a> CustomerService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, storage: &'a StorageService) -> Self {
        Self {
            storage,
            users: UserRepository::new(pool),
        }
    }

    /// Stored profiles, or one blank profile per registered user when the
    /// table is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if either store fails.
    pub async fn list(&self) -> Result<Vec<Customer>, CustomerError> {
        let customers = self.storage.get_all_entities::<Customer>().await?;
        if !customers.is_empty() {
            return Ok(customers);
        }
        let users = self.users.list_all().await?;
        Ok(users.iter().map(Customer::from_user).collect())
    }

    /// Look up a profile by row key, then by scanning for a matching row
    /// key or username.
    ///
    /// # Errors
    ///
    /// Returns `CustomerError::Storage` if a table query fails.
    pub async fn find(&self, id: &str) -> Result<Option<Customer>, CustomerError> {
        if let Some(customer) = self
            .storage
            .get_entity::<Customer>(Customer::KIND, id)
            .await?
        {
            return Ok(Some(customer));
        }
        let all = self.storage.get_all_entities::<Customer>().await?;
        Ok(all
            .into_iter()
            .find(|c| c.row_key == id || c.username == id))
    }

    /// [`Self::find`], then create a profile for the registered user named `id`.
    ///
    /// # Errors
    ///
    /// Returns `CustomerError::NotFound` when there is neither a profile nor
    /// a user.
    #[instrument(skip(self))]
    pub async fn find_or_provision(&self, id: &str) -> Result<Customer, CustomerError> {
        if let Some(customer) = self.find(id).await? {
            return Ok(customer);
        }
        let Ok(username) = Username::parse(id) else {
            return Err(CustomerError::NotFound);
        };
        let user = self
            .users
            .get_by_username(&username)
            .await?
            .ok_or(CustomerError::NotFound)?;
        self.provision_from_user(&user).await
    }

    /// Write a blank profile keyed by the user's username.
    ///
    /// # Errors
    ///
    /// Returns `CustomerError::Storage` if the insert fails.
    pub async fn provision_from_user(&self, user: &User) -> Result<Customer, CustomerError> {
        let mut customer = Customer::from_user(user);
        customer.updated_at = Some(Utc::now());
        self.storage.add_entity(&customer).await?;
        info!(username = %user.username, "Customer profile created from user");
        Ok(customer)
    }

    /// # Errors
    ///
    /// Returns a validation error for a bad username or email, or
    /// `CustomerError::AlreadyExists` on a key collision.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create(&self, input: &CustomerInput) -> Result<Customer, CustomerError> {
        let mut customer = Customer::new();
        input.apply_to(&mut customer)?;
        self.storage
            .add_entity(&customer)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(_) => CustomerError::AlreadyExists,
                other => CustomerError::Storage(other),
            })?;
        info!(customer_id = %customer.id(), "Customer created");
        Ok(customer)
    }

    /// Replace a profile's fields, keeping its ETag.
    ///
    /// # Errors
    ///
    /// Returns `CustomerError::NotFound` if the profile does not exist.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: &CustomerInput) -> Result<Customer, CustomerError> {
        let mut customer = self
            .storage
            .get_entity::<Customer>(Customer::KIND, id)
            .await?
            .ok_or(CustomerError::NotFound)?;
        input.apply_to(&mut customer)?;
        self.storage.update_entity(&customer).await?;
        info!(customer_id = id, "Customer updated");
        Ok(customer)
    }

    /// # Errors
    ///
    /// Returns `CustomerError::NotFound` if the profile does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), CustomerError> {
        self.storage
            .delete_entity::<Customer>(Customer::KIND, id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => CustomerError::NotFound,
                other => CustomerError::Storage(other),
            })?;
        info!(customer_id = id, "Customer deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_validates_email() {
        let mut customer = Customer::new();
        let input = CustomerInput {
            username: "ada".to_string(),
            email: "not-an-email".to_string(),
            ..CustomerInput::default()
        };
        assert!(matches!(
            input.apply_to(&mut customer),
            Err(CustomerError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_apply_trims_and_stamps() {
        let mut customer = Customer::new();
        let input = CustomerInput {
            username: " ada ".to_string(),
            name: " Ada ".to_string(),
            surname: "Lovelace".to_string(),
            email: String::new(),
            shipping_address: "12 St James's Square".to_string(),
        };
        input.apply_to(&mut customer).unwrap();
        assert_eq!(customer.username, "ada");
        assert_eq!(customer.name, "Ada");
        assert!(customer.email.is_empty());
        assert!(customer.updated_at.is_some());
    }

    #[test]
    fn test_blank_username_rejected() {
        let mut customer = Customer::new();
        assert!(matches!(
            CustomerInput::default().apply_to(&mut customer),
            Err(CustomerError::InvalidUsername(_))
        ));
    }
}

//! crates/vidmart_core/src/addresses.rs
//!
//! Address book rules on top of the address repository.

use tracing::info;
use uuid::Uuid;

use crate::domain::{Address, AddressFields};
use crate::ports::{AddressRepository, PortError};

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid address: {0}")]
    Validation(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

pub struct AddressBook<'a, R: AddressRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: AddressRepository + ?Sized> AddressBook<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Adds an address. The first address a user saves becomes the default.
    pub async fn add(&self, user_id: Uuid, fields: AddressFields) -> Result<Address, AddressError> {
        let fields = validate(fields)?;
        let is_first = self.repo.list_addresses(user_id).await?.is_empty();
        let address = self.repo.create_address(user_id, fields, is_first).await?;
        info!(address_id = %address.id, %user_id, is_default = is_first, "address added");
        Ok(address)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        fields: AddressFields,
    ) -> Result<Address, AddressError> {
        let fields = validate(fields)?;
        Ok(self.repo.update_address(user_id, address_id, fields).await?)
    }

    pub async fn make_default(&self, user_id: Uuid, address_id: Uuid) -> Result<(), AddressError> {
        self.repo.set_default_address(user_id, address_id).await?;
        info!(%address_id, %user_id, "default address changed");
        Ok(())
    }

    /// Deletes an address. If it was the default, the newest remaining
    /// address takes its place.
    pub async fn remove(&self, user_id: Uuid, address_id: Uuid) -> Result<(), AddressError> {
        let was_default = self
            .repo
            .default_address(user_id)
            .await?
            .is_some_and(|address| address.id == address_id);
        self.repo.delete_address(user_id, address_id).await?;

        if was_default {
            let remaining = self.repo.list_addresses(user_id).await?;
            if let Some(next) = remaining.iter().max_by_key(|address| address.created_at) {
                self.repo.set_default_address(user_id, next.id).await?;
            }
        }
        Ok(())
    }
}

/// Trims every field, turns blank optional fields into `None` and rejects
/// missing required ones.
fn validate(fields: AddressFields) -> Result<AddressFields, AddressError> {
    let required = |value: String, name: &str| {
        let value = value.trim().to_string();
        if value.is_empty() {
            Err(AddressError::Validation(format!("{name} is required")))
        } else {
            Ok(value)
        }
    };
    let optional = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let pin_code = required(fields.pin_code, "pin code")?;
    if pin_code.len() != 6 || !pin_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AddressError::Validation(
            "pin code must be 6 digits".to_string(),
        ));
    }

    Ok(AddressFields {
        name: required(fields.name, "name")?,
        phone: required(fields.phone, "phone")?,
        address_line1: required(fields.address_line1, "address line 1")?,
        address_line2: optional(fields.address_line2),
        landmark: optional(fields.landmark),
        pin_code,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use mockall::predicate::eq;
    use testresult::TestResult;

    use super::*;
    use crate::ports::MockAddressRepository;

    fn fields() -> AddressFields {
        AddressFields {
            name: " Asha ".into(),
            phone: "9999999999".into(),
            address_line1: "12 MG Road".into(),
            address_line2: Some("   ".into()),
            landmark: None,
            pin_code: "560001".into(),
        }
    }

    fn stored(user_id: Uuid, fields: AddressFields, is_default: bool) -> Address {
        Address {
            id: Uuid::new_v4(),
            user_id,
            name: fields.name,
            phone: fields.phone,
            address_line1: fields.address_line1,
            address_line2: fields.address_line2,
            landmark: fields.landmark,
            pin_code: fields.pin_code,
            is_default,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_address_becomes_default() -> TestResult {
        let mut repo = MockAddressRepository::new();
        repo.expect_list_addresses().returning(|_| Ok(Vec::new()));
        repo.expect_create_address()
            .withf(|_, fields, is_default| {
                *is_default && fields.name == "Asha" && fields.address_line2.is_none()
            })
            .times(1)
            .returning(|user_id, fields, is_default| Ok(stored(user_id, fields, is_default)));

        let address = AddressBook::new(&repo).add(Uuid::new_v4(), fields()).await?;

        assert!(address.is_default);
        Ok(())
    }

    #[tokio::test]
    async fn later_addresses_are_not_default() -> TestResult {
        let user_id = Uuid::new_v4();
        let mut repo = MockAddressRepository::new();
        repo.expect_list_addresses()
            .returning(|user_id| Ok(vec![stored(user_id, fields(), true)]));
        repo.expect_create_address()
            .returning(|user_id, fields, is_default| Ok(stored(user_id, fields, is_default)));

        let address = AddressBook::new(&repo).add(user_id, fields()).await?;

        assert!(!address.is_default);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_pin_code_is_rejected() {
        let repo = MockAddressRepository::new();
        let result = AddressBook::new(&repo)
            .add(
                Uuid::new_v4(),
                AddressFields {
                    pin_code: "56A01".into(),
                    ..fields()
                },
            )
            .await;

        assert!(matches!(result, Err(AddressError::Validation(_))));
    }

    #[tokio::test]
    async fn removing_the_default_promotes_the_newest_remaining() -> TestResult {
        let user_id = Uuid::new_v4();
        let current = stored(user_id, fields(), true);
        let current_id = current.id;
        let older = Address {
            created_at: Utc::now() - Duration::days(2),
            ..stored(user_id, fields(), false)
        };
        let newer = stored(user_id, fields(), false);
        let newer_id = newer.id;

        let mut repo = MockAddressRepository::new();
        repo.expect_default_address()
            .returning(move |_| Ok(Some(current.clone())));
        repo.expect_delete_address()
            .with(eq(user_id), eq(current_id))
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_list_addresses()
            .returning(move |_| Ok(vec![older.clone(), newer.clone()]));
        repo.expect_set_default_address()
            .with(eq(user_id), eq(newer_id))
            .times(1)
            .returning(|_, _| Ok(()));

        AddressBook::new(&repo).remove(user_id, current_id).await?;
        Ok(())
    }
}

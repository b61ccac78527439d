//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of every backend repository. Used by the
//! router tests and for running the service without a database.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use vidmart_core::domain::{
    Address, AddressFields, CoinAccount, CoinTransaction, NewCoinTransaction, NewOrder, Order,
    OrderAmendment, Product, Profile, ProfileUpdate,
};
use vidmart_core::ports::{
    AddressRepository, CoinAccountRepository, CoinTransactionRepository, OrderRepository,
    PortError, PortResult, ProductRepository, ProfileRepository,
};

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    orders: Vec<Order>,
    addresses: Vec<Address>,
    profiles: Vec<Profile>,
    coins: Vec<CoinAccount>,
    coin_transactions: Vec<CoinTransaction>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    tables: RwLock<Tables>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.tables.write().await.products.push(product);
    }

    /// Inserts an order as-is, keeping its id and timestamp.
    pub async fn insert_order(&self, order: Order) {
        self.tables.write().await.orders.push(order);
    }
}

#[async_trait]
impl ProductRepository for InMemoryBackend {
    async fn list_products(&self) -> PortResult<Vec<Product>> {
        let mut products = self.tables.read().await.products.clone();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn list_products_by_category(&self, category: &str) -> PortResult<Vec<Product>> {
        let mut products = self.list_products().await?;
        products.retain(|p| p.category == category);
        Ok(products)
    }

    async fn get_product(&self, product_id: Uuid) -> PortResult<Product> {
        self.tables
            .read()
            .await
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }
}

#[async_trait]
impl OrderRepository for InMemoryBackend {
    async fn create_order(&self, order: NewOrder) -> PortResult<Order> {
        let order = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            items: order.items,
            total: order.total,
            payment_method: order.payment_method,
            shipping_address: order.shipping_address,
            created_at: Utc::now(),
        };
        self.tables.write().await.orders.push(order.clone());
        Ok(order)
    }

    async fn find_order(&self, order_id: Uuid) -> PortResult<Option<Order>> {
        Ok(self
            .tables
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn amend_order(&self, order_id: Uuid, amendment: OrderAmendment) -> PortResult<Order> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?;
        order.items = amendment.items;
        order.total = amendment.total;
        order.payment_method = amendment.payment_method;
        order.shipping_address = amendment.shipping_address;
        Ok(order.clone())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> PortResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .tables
            .read()
            .await
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl AddressRepository for InMemoryBackend {
    async fn list_addresses(&self, user_id: Uuid) -> PortResult<Vec<Address>> {
        let mut addresses: Vec<Address> = self
            .tables
            .read()
            .await
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(addresses)
    }

    async fn default_address(&self, user_id: Uuid) -> PortResult<Option<Address>> {
        Ok(self
            .tables
            .read()
            .await
            .addresses
            .iter()
            .find(|a| a.user_id == user_id && a.is_default)
            .cloned())
    }

    async fn create_address(
        &self,
        user_id: Uuid,
        fields: AddressFields,
        is_default: bool,
    ) -> PortResult<Address> {
        let mut tables = self.tables.write().await;
        if is_default {
            for existing in tables.addresses.iter_mut().filter(|a| a.user_id == user_id) {
                existing.is_default = false;
            }
        }
        let address = Address {
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
        };
        tables.addresses.push(address.clone());
        Ok(address)
    }

    async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        fields: AddressFields,
    ) -> PortResult<Address> {
        let mut tables = self.tables.write().await;
        let address = tables
            .addresses
            .iter_mut()
            .find(|a| a.id == address_id && a.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Address {} not found", address_id)))?;
        address.name = fields.name;
        address.phone = fields.phone;
        address.address_line1 = fields.address_line1;
        address.address_line2 = fields.address_line2;
        address.landmark = fields.landmark;
        address.pin_code = fields.pin_code;
        Ok(address.clone())
    }

    async fn set_default_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if !tables
            .addresses
            .iter()
            .any(|a| a.id == address_id && a.user_id == user_id)
        {
            return Err(PortError::NotFound(format!("Address {} not found", address_id)));
        }
        for address in tables.addresses.iter_mut().filter(|a| a.user_id == user_id) {
            address.is_default = address.id == address_id;
        }
        Ok(())
    }

    async fn delete_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.addresses.len();
        tables
            .addresses
            .retain(|a| !(a.id == address_id && a.user_id == user_id));
        if tables.addresses.len() == before {
            return Err(PortError::NotFound(format!("Address {} not found", address_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn find_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        Ok(self
            .tables
            .read()
            .await
            .profiles
            .iter()
            .find(|p| p.id == user_id)
            .cloned())
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile> {
        let profile = Profile {
            id: user_id,
            name: update.name,
            phone: update.phone,
            address: update.address,
        };
        let mut tables = self.tables.write().await;
        tables.profiles.retain(|p| p.id != user_id);
        tables.profiles.push(profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl CoinAccountRepository for InMemoryBackend {
    async fn find_coin_account(&self, user_id: Uuid) -> PortResult<Option<CoinAccount>> {
        Ok(self
            .tables
            .read()
            .await
            .coins
            .iter()
            .find(|c| c.user_id == user_id)
            .copied())
    }

    async fn set_coin_balance(&self, user_id: Uuid, balance: i64) -> PortResult<CoinAccount> {
        if balance < 0 {
            return Err(PortError::Unexpected(format!(
                "coin balance for {} would become negative",
                user_id
            )));
        }
        let account = CoinAccount { user_id, balance };
        let mut tables = self.tables.write().await;
        tables.coins.retain(|c| c.user_id != user_id);
        tables.coins.push(account);
        Ok(account)
    }
}

#[async_trait]
impl CoinTransactionRepository for InMemoryBackend {
    async fn append_coin_transaction(
        &self,
        transaction: NewCoinTransaction,
    ) -> PortResult<CoinTransaction> {
        let transaction = CoinTransaction {
            id: Uuid::new_v4(),
            user_id: transaction.user_id,
            amount: transaction.amount,
            kind: transaction.kind,
            description: transaction.description,
            order_id: transaction.order_id,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .coin_transactions
            .push(transaction.clone());
        Ok(transaction)
    }

    async fn list_coin_transactions(&self, user_id: Uuid) -> PortResult<Vec<CoinTransaction>> {
        let mut transactions: Vec<CoinTransaction> = self
            .tables
            .read()
            .await
            .coin_transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps, so reverse
        // first to put later inserts ahead.
        transactions.reverse();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    fn fields(line1: &str) -> AddressFields {
        AddressFields {
            name: "Asha".to_string(),
            phone: "9876543210".to_string(),
            address_line1: line1.to_string(),
            address_line2: None,
            landmark: None,
            pin_code: "560001".to_string(),
        }
    }

    #[tokio::test]
    async fn only_one_address_stays_default() -> TestResult {
        let backend = InMemoryBackend::new();
        let user = Uuid::new_v4();
        let home = backend.create_address(user, fields("Home"), true).await?;
        let office = backend.create_address(user, fields("Office"), false).await?;

        backend.set_default_address(user, office.id).await?;

        let addresses = backend.list_addresses(user).await?;
        assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);
        assert_eq!(addresses[0].id, office.id);
        assert_eq!(backend.default_address(user).await?.map(|a| a.id), Some(office.id));
        assert!(addresses.iter().any(|a| a.id == home.id && !a.is_default));
        Ok(())
    }

    #[tokio::test]
    async fn addresses_of_other_users_are_not_found() -> TestResult {
        let backend = InMemoryBackend::new();
        let owner = Uuid::new_v4();
        let address = backend.create_address(owner, fields("Home"), true).await?;

        let result = backend.delete_address(Uuid::new_v4(), address.id).await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
        assert_eq!(backend.list_addresses(owner).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn coin_balance_never_goes_negative() -> TestResult {
        let backend = InMemoryBackend::new();
        let user = Uuid::new_v4();
        backend.set_coin_balance(user, 4).await?;

        let result = backend.set_coin_balance(user, -1).await;
        assert!(matches!(result, Err(PortError::Unexpected(_))));
        assert_eq!(backend.find_coin_account(user).await?.map(|c| c.balance), Some(4));
        Ok(())
    }
}

//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the backend gateway repositories from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vidmart_core::domain::{
    Address, AddressFields, CoinAccount, CoinTransaction, NewCoinTransaction, NewOrder, Order,
    OrderAmendment, OrderLine, Product, Profile, ProfileUpdate,
};
use vidmart_core::ports::{
    AddressRepository, CoinAccountRepository, CoinTransactionRepository, OrderRepository,
    PortError, PortResult, ProductRepository, ProfileRepository,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every backend gateway repository.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProductRecord {
    id: Uuid,
    name: String,
    category: String,
    price: Decimal,
    image_url: String,
}
impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            id: self.id,
            name: self.name,
            category: self.category,
            price: self.price,
            image_url: self.image_url,
        }
    }
}

/// One element of the `orders.items` JSON array.
#[derive(Serialize, Deserialize)]
struct OrderLineRecord {
    product_id: Uuid,
    name: String,
    unit_price: Decimal,
    #[serde(default)]
    image_url: String,
    quantity: u32,
}
impl From<&OrderLine> for OrderLineRecord {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name.clone(),
            unit_price: line.unit_price,
            image_url: line.image_url.clone(),
            quantity: line.quantity,
        }
    }
}

fn lines_to_json(lines: &[OrderLine]) -> Json<Vec<OrderLineRecord>> {
    Json(lines.iter().map(OrderLineRecord::from).collect())
}

#[derive(FromRow)]
struct OrderRecord {
    id: Uuid,
    user_id: Uuid,
    items: Json<Vec<OrderLineRecord>>,
    total: Decimal,
    payment_method: String,
    shipping_address: String,
    created_at: DateTime<Utc>,
}
impl OrderRecord {
    fn to_domain(self) -> PortResult<Order> {
        let payment_method = self.payment_method.parse().map_err(PortError::Unexpected)?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items: self
                .items
                .0
                .into_iter()
                .map(|line| OrderLine {
                    product_id: line.product_id,
                    name: line.name,
                    unit_price: line.unit_price,
                    image_url: line.image_url,
                    quantity: line.quantity,
                })
                .collect(),
            total: self.total,
            payment_method,
            shipping_address: self.shipping_address,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AddressRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    phone: String,
    address_line1: String,
    address_line2: Option<String>,
    landmark: Option<String>,
    pin_code: String,
    is_default: bool,
    created_at: DateTime<Utc>,
}
impl AddressRecord {
    fn to_domain(self) -> Address {
        Address {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            phone: self.phone,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            landmark: self.landmark,
            pin_code: self.pin_code,
            is_default: self.is_default,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    name: Option<String>,
    phone: Option<String>,
    address: Option<String>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            name: self.name,
            phone: self.phone,
            address: self.address,
        }
    }
}

#[derive(FromRow)]
struct CoinAccountRecord {
    user_id: Uuid,
    balance: i64,
}
impl CoinAccountRecord {
    fn to_domain(self) -> CoinAccount {
        CoinAccount {
            user_id: self.user_id,
            balance: self.balance,
        }
    }
}

#[derive(FromRow)]
struct CoinTransactionRecord {
    id: Uuid,
    user_id: Uuid,
    amount: i64,
    transaction_type: String,
    description: String,
    order_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}
impl CoinTransactionRecord {
    fn to_domain(self) -> PortResult<CoinTransaction> {
        Ok(CoinTransaction {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            kind: self.transaction_type.parse().map_err(PortError::Unexpected)?,
            description: self.description,
            order_id: self.order_id,
            created_at: self.created_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, category, price, image_url";
const ORDER_COLUMNS: &str =
    "id, user_id, items, total, payment_method, shipping_address, created_at";
const ADDRESS_COLUMNS: &str = "id, user_id, name, phone, address_line1, address_line2, landmark, pin_code, is_default, created_at";
const COIN_TRANSACTION_COLUMNS: &str =
    "id, user_id, amount, transaction_type, description, order_id, created_at";

//=========================================================================================
// Repository Trait Implementations
//=========================================================================================

#[async_trait]
impl ProductRepository for DbAdapter {
    async fn list_products(&self) -> PortResult<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_products_by_category(&self, category: &str) -> PortResult<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category = $1 ORDER BY name ASC"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_product(&self, product_id: Uuid) -> PortResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Product {} not found", product_id)))?;

        Ok(record.to_domain())
    }
}

#[async_trait]
impl OrderRepository for DbAdapter {
    async fn create_order(&self, order: NewOrder) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "INSERT INTO orders (user_id, items, total, payment_method, shipping_address) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id)
        .bind(lines_to_json(&order.items))
        .bind(order.total)
        .bind(order.payment_method.as_str())
        .bind(order.shipping_address)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    async fn find_order(&self, order_id: Uuid) -> PortResult<Option<Order>> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(OrderRecord::to_domain).transpose()
    }

    async fn amend_order(&self, order_id: Uuid, amendment: OrderAmendment) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "UPDATE orders SET items = $1, total = $2, payment_method = $3, shipping_address = $4 \
             WHERE id = $5 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(lines_to_json(&amendment.items))
        .bind(amendment.total)
        .bind(amendment.payment_method.as_str())
        .bind(amendment.shipping_address)
        .bind(order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Order {} not found", order_id)))?;

        record.to_domain()
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> PortResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(OrderRecord::to_domain).collect()
    }
}

#[async_trait]
impl AddressRepository for DbAdapter {
    async fn list_addresses(&self, user_id: Uuid) -> PortResult<Vec<Address>> {
        let records = sqlx::query_as::<_, AddressRecord>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn default_address(&self, user_id: Uuid) -> PortResult<Option<Address>> {
        let record = sqlx::query_as::<_, AddressRecord>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 AND is_default LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn create_address(
        &self,
        user_id: Uuid,
        fields: AddressFields,
        is_default: bool,
    ) -> PortResult<Address> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        if is_default {
            sqlx::query("UPDATE addresses SET is_default = false WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }

        let record = sqlx::query_as::<_, AddressRecord>(&format!(
            "INSERT INTO addresses \
             (user_id, name, phone, address_line1, address_line2, landmark, pin_code, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(fields.name)
        .bind(fields.phone)
        .bind(fields.address_line1)
        .bind(fields.address_line2)
        .bind(fields.landmark)
        .bind(fields.pin_code)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        fields: AddressFields,
    ) -> PortResult<Address> {
        let record = sqlx::query_as::<_, AddressRecord>(&format!(
            "UPDATE addresses SET name = $1, phone = $2, address_line1 = $3, address_line2 = $4, \
             landmark = $5, pin_code = $6 WHERE id = $7 AND user_id = $8 RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(fields.name)
        .bind(fields.phone)
        .bind(fields.address_line1)
        .bind(fields.address_line2)
        .bind(fields.landmark)
        .bind(fields.pin_code)
        .bind(address_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Address {} not found", address_id)))?;

        Ok(record.to_domain())
    }

    async fn set_default_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let exists = sqlx::query("SELECT 1 FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(address_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        if exists.is_none() {
            return Err(PortError::NotFound(format!("Address {} not found", address_id)));
        }

        // Clear first so the partial unique index never sees two defaults.
        sqlx::query("UPDATE addresses SET is_default = false WHERE user_id = $1 AND is_default")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("UPDATE addresses SET is_default = true WHERE id = $1 AND user_id = $2")
            .bind(address_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn delete_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(address_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Address {} not found", address_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for DbAdapter {
    async fn find_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, name, phone, address FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "INSERT INTO profiles (id, name, phone, address) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, phone = EXCLUDED.phone, \
             address = EXCLUDED.address, updated_at = now() \
             RETURNING id, name, phone, address",
        )
        .bind(user_id)
        .bind(update.name)
        .bind(update.phone)
        .bind(update.address)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }
}

#[async_trait]
impl CoinAccountRepository for DbAdapter {
    async fn find_coin_account(&self, user_id: Uuid) -> PortResult<Option<CoinAccount>> {
        let record = sqlx::query_as::<_, CoinAccountRecord>(
            "SELECT user_id, balance FROM user_coins WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn set_coin_balance(&self, user_id: Uuid, balance: i64) -> PortResult<CoinAccount> {
        let record = sqlx::query_as::<_, CoinAccountRecord>(
            "INSERT INTO user_coins (user_id, balance) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET balance = EXCLUDED.balance, updated_at = now() \
             RETURNING user_id, balance",
        )
        .bind(user_id)
        .bind(balance)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }
}

#[async_trait]
impl CoinTransactionRepository for DbAdapter {
    async fn append_coin_transaction(
        &self,
        transaction: NewCoinTransaction,
    ) -> PortResult<CoinTransaction> {
        let record = sqlx::query_as::<_, CoinTransactionRecord>(&format!(
            "INSERT INTO coin_transactions (user_id, amount, transaction_type, description, order_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COIN_TRANSACTION_COLUMNS}"
        ))
        .bind(transaction.user_id)
        .bind(transaction.amount)
        .bind(transaction.kind.as_str())
        .bind(transaction.description)
        .bind(transaction.order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    async fn list_coin_transactions(&self, user_id: Uuid) -> PortResult<Vec<CoinTransaction>> {
        let records = sqlx::query_as::<_, CoinTransactionRecord>(&format!(
            "SELECT {COIN_TRANSACTION_COLUMNS} FROM coin_transactions WHERE user_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records
            .into_iter()
            .map(CoinTransactionRecord::to_domain)
            .collect()
    }
}

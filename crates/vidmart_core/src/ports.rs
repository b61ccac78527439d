//! crates/vidmart_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the managed backend and the blockchain gateway.

use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    Address, AddressFields, CoinAccount, CoinTransaction, NewCoinTransaction, NewOrder,
    OptInOutcome, Order, OrderAmendment, Product, Profile, ProfileUpdate, RewardReceipt,
    WalletBalance,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The blockchain gateway answered with a declared error.
    #[error("Gateway error: {0}")]
    Gateway(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Backend Gateway: one repository per collection
//=========================================================================================

#[automock]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// All products, ordered by name.
    async fn list_products(&self) -> PortResult<Vec<Product>>;

    async fn list_products_by_category(&self, category: &str) -> PortResult<Vec<Product>>;

    async fn get_product(&self, product_id: Uuid) -> PortResult<Product>;
}

#[automock]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: NewOrder) -> PortResult<Order>;

    /// Returns `Ok(None)` when the order does not exist.
    async fn find_order(&self, order_id: Uuid) -> PortResult<Option<Order>>;

    async fn amend_order(&self, order_id: Uuid, amendment: OrderAmendment) -> PortResult<Order>;

    /// Orders of one user, newest first.
    async fn list_orders_for_user(&self, user_id: Uuid) -> PortResult<Vec<Order>>;
}

#[automock]
#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// Addresses of one user, default first and then newest first.
    async fn list_addresses(&self, user_id: Uuid) -> PortResult<Vec<Address>>;

    async fn default_address(&self, user_id: Uuid) -> PortResult<Option<Address>>;

    async fn create_address(
        &self,
        user_id: Uuid,
        fields: AddressFields,
        is_default: bool,
    ) -> PortResult<Address>;

    async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        fields: AddressFields,
    ) -> PortResult<Address>;

    /// Marks one address as the default and clears the flag on all others.
    async fn set_default_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()>;

    async fn delete_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()>;
}

#[automock]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile>;
}

#[automock]
#[async_trait]
pub trait CoinAccountRepository: Send + Sync {
    async fn find_coin_account(&self, user_id: Uuid) -> PortResult<Option<CoinAccount>>;

    async fn set_coin_balance(&self, user_id: Uuid, balance: i64) -> PortResult<CoinAccount>;
}

#[automock]
#[async_trait]
pub trait CoinTransactionRepository: Send + Sync {
    async fn append_coin_transaction(
        &self,
        transaction: NewCoinTransaction,
    ) -> PortResult<CoinTransaction>;

    /// Ledger of one user, newest first.
    async fn list_coin_transactions(&self, user_id: Uuid) -> PortResult<Vec<CoinTransaction>>;
}

/// The whole managed backend: every collection repository behind one handle.
pub trait BackendGateway:
    ProductRepository
    + OrderRepository
    + AddressRepository
    + ProfileRepository
    + CoinAccountRepository
    + CoinTransactionRepository
{
}

impl<T> BackendGateway for T where
    T: ProductRepository
        + OrderRepository
        + AddressRepository
        + ProfileRepository
        + CoinAccountRepository
        + CoinTransactionRepository
{
}

//=========================================================================================
// Blockchain Gateway
//=========================================================================================

#[automock]
#[async_trait]
pub trait BlockchainGateway: Send + Sync {
    /// Looks up the coin and native balance of a wallet, and its opt-in status.
    async fn wallet_balance(&self, address: &str) -> PortResult<WalletBalance>;

    /// Prepares an unsigned opt-in transaction for the wallet owner to sign.
    async fn prepare_opt_in(&self, address: &str) -> PortResult<OptInOutcome>;

    /// Transfers coins from the custodial account to `recipient`.
    async fn reward_coins(
        &self,
        recipient: &str,
        amount: u32,
        note: Option<String>,
    ) -> PortResult<RewardReceipt>;
}

//! crates/vidmart_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format; adapters map
//! their own record types onto them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Catalogue
//=========================================================================================

/// A product in the grocery catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub image_url: String,
}

//=========================================================================================
// Cart and Orders
//=========================================================================================

/// A single product selection in the session cart. `id` is the product id.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: String,
    pub quantity: u32,
}

impl CartItem {
    /// Line value: unit price times quantity.
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<&Product> for CartItem {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            image_url: product.image_url.clone(),
            quantity: 1,
        }
    }
}

/// A line item of a placed order, with the unit price captured at order time.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: String,
    pub quantity: u32,
}

impl OrderLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.id,
            name: item.name.clone(),
            unit_price: item.unit_price,
            image_url: item.image_url.clone(),
            quantity: item.quantity,
        }
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentMethod {
    #[default]
    Card,
    Upi,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Upi => "upi",
            Self::CashOnDelivery => "cod",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "upi" => Ok(Self::Upi),
            "cod" => Ok(Self::CashOnDelivery),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}

/// A persisted order. While its countdown is running or paused it may be
/// amended in place instead of a new order being created.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

/// The data needed to insert a new order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
}

/// The fields rewritten when an order is amended.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAmendment {
    pub items: Vec<OrderLine>,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
}

/// What the tracking page shows once the amend window has closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTracking {
    pub order_id: Uuid,
    pub reference: String,
    pub status: &'static str,
    pub eta_minutes: u32,
}

impl OrderTracking {
    pub fn for_order(order_id: Uuid) -> Self {
        let reference = order_id.simple().to_string().chars().take(8).collect();
        Self {
            order_id,
            reference,
            status: "confirmed",
            eta_minutes: 15,
        }
    }
}

//=========================================================================================
// Addresses and Profiles
//=========================================================================================

/// A delivery address. At most one address per user is the default.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub landmark: Option<String>,
    pub pin_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// Formats the address the way it is stamped onto an order.
    pub fn shipping_label(&self) -> String {
        let mut label = self.address_line1.trim().to_string();
        let line2 = non_blank(&self.address_line2);
        let landmark = non_blank(&self.landmark);
        if line2.is_some() || landmark.is_some() {
            label.push(',');
            if let Some(line2) = line2 {
                label.push(' ');
                label.push_str(line2);
            }
            if let Some(landmark) = landmark {
                label.push_str(" Near ");
                label.push_str(landmark);
            }
        }
        label.push_str(", PIN: ");
        label.push_str(self.pin_code.trim());
        label
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// User-supplied address fields, used for both insert and update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddressFields {
    pub name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub landmark: Option<String>,
    pub pin_code: String,
}

/// A user's profile. `address` is a free-text fallback shipping address.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Profile {
    pub id: Uuid,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

//=========================================================================================
// Loyalty Coins
//=========================================================================================

/// A user's loyalty coin balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinAccount {
    pub user_id: Uuid,
    pub balance: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinTransactionKind {
    Earned,
    Spent,
}

impl CoinTransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Spent => "spent",
        }
    }
}

impl FromStr for CoinTransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earned" => Ok(Self::Earned),
            "spent" => Ok(Self::Spent),
            other => Err(format!("unknown coin transaction type '{other}'")),
        }
    }
}

/// An append-only ledger entry. `amount` is negative for spent coins.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: CoinTransactionKind,
    pub description: String,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCoinTransaction {
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: CoinTransactionKind,
    pub description: String,
    pub order_id: Option<Uuid>,
}

impl NewCoinTransaction {
    /// Ledger entry for coins redeemed at checkout.
    pub fn spent(user_id: Uuid, coins: u32, order_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            amount: -i64::from(coins),
            kind: CoinTransactionKind::Spent,
            description: format!("Used {coins} coins for order payment"),
            order_id,
        }
    }

    /// Ledger entry for coins credited by a reward transfer.
    pub fn earned(user_id: Uuid, coins: u32, order_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            amount: i64::from(coins),
            kind: CoinTransactionKind::Earned,
            description: format!("Rewarded {coins} coins"),
            order_id,
        }
    }
}

//=========================================================================================
// Blockchain Gateway Responses
//=========================================================================================

/// Balance of a wallet on the testnet, as reported by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletBalance {
    pub address: String,
    /// Coin balance in display units.
    pub balance: Decimal,
    /// Native balance in micro-units.
    pub algo_balance: u64,
    pub is_opted_in: bool,
    pub explorer_url: String,
    pub asset_id: u64,
}

/// Result of asking the gateway to prepare an asset opt-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptInOutcome {
    AlreadyOptedIn,
    /// Base64 encoded unsigned transaction the wallet owner must sign.
    Prepared { transaction: String },
}

/// Confirmation of a reward transfer from the custodial account.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardReceipt {
    pub transaction_id: String,
    pub confirmed_round: u64,
    pub amount: Decimal,
    pub recipient: String,
    pub explorer_url: String,
}

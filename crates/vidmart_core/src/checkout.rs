//! crates/vidmart_core/src/checkout.rs
//!
//! Turns the session cart into an order: either a new one, or an amendment of
//! the active order while its countdown is still open.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cart::Cart;
use crate::countdown::{self, SessionFlags};
use crate::domain::{
    NewCoinTransaction, NewOrder, Order, OrderAmendment, OrderLine, PaymentMethod,
};
use crate::order_merge;
use crate::ports::{BackendGateway, PortError};
use crate::pricing::{self, PriceBreakdown};

/// Used when the user has neither a default address nor a profile address.
pub const NO_ADDRESS: &str = "No address provided";

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The request was rejected before anything was written.
    #[error("Invalid checkout: {0}")]
    Validation(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub coins_to_use: u32,
}

/// What the checkout page shows before the order is placed.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutQuote {
    pub breakdown: PriceBreakdown,
    pub coin_balance: i64,
    pub max_redeemable: u32,
    /// The order that will be amended instead of creating a new one.
    pub amending_order: Option<Uuid>,
    pub shipping_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub breakdown: PriceBreakdown,
    pub amended: bool,
}

/// Orchestrates pricing, merging and the backend writes of a checkout.
pub struct CheckoutService<'a, B: BackendGateway + ?Sized> {
    backend: &'a B,
}

impl<'a, B: BackendGateway + ?Sized> CheckoutService<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Prices the cart for display. Reads only.
    pub async fn quote(
        &self,
        user_id: Uuid,
        cart: &Cart,
        flags: &SessionFlags,
        coins_to_use: u32,
        now: DateTime<Utc>,
    ) -> Result<CheckoutQuote, CheckoutError> {
        let coin_balance = self.coin_balance(user_id).await?;
        let max_redeemable = pricing::redeemable_coins(coin_balance);
        validate_coins(coins_to_use, max_redeemable)?;

        let amending = self.amendable_order(user_id, flags, now).await?;
        let breakdown = match &amending {
            Some(order) => order_merge::merge_into_order(order, cart.items(), coins_to_use).breakdown,
            None => pricing::compute(cart.total(), coins_to_use),
        };

        Ok(CheckoutQuote {
            breakdown,
            coin_balance,
            max_redeemable,
            amending_order: amending.map(|order| order.id),
            shipping_address: self.shipping_address(user_id).await?,
        })
    }

    /// Places the order. On success the cart is cleared; the countdown flags
    /// are left for the timer to resume.
    pub async fn place_order(
        &self,
        user_id: Uuid,
        cart: &mut Cart,
        flags: &mut SessionFlags,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::Validation("the cart is empty".to_string()));
        }

        let coin_balance = self.coin_balance(user_id).await?;
        validate_coins(request.coins_to_use, pricing::redeemable_coins(coin_balance))?;

        let shipping_address = self.shipping_address(user_id).await?;
        let amending = self.amendable_order(user_id, flags, now).await?;

        // Debited before the order write, refunded if that write fails.
        let coins = request.coins_to_use;
        if coins > 0 {
            self.backend
                .set_coin_balance(user_id, coin_balance - i64::from(coins))
                .await?;
        }

        let written = match amending {
            Some(existing) => {
                let merged = order_merge::merge_into_order(&existing, cart.items(), coins);
                self.backend
                    .amend_order(
                        existing.id,
                        OrderAmendment {
                            items: merged.items,
                            total: merged.breakdown.grand_total,
                            payment_method: request.payment_method,
                            shipping_address,
                        },
                    )
                    .await
                    .map(|order| (order, merged.breakdown, true))
            }
            None => {
                let breakdown = pricing::compute(cart.total(), coins);
                self.backend
                    .create_order(NewOrder {
                        user_id,
                        items: cart.items().iter().map(OrderLine::from).collect(),
                        total: breakdown.grand_total,
                        payment_method: request.payment_method,
                        shipping_address,
                    })
                    .await
                    .map(|order| (order, breakdown, false))
            }
        };

        let (order, breakdown, amended) = match written {
            Ok(written) => written,
            Err(e) => {
                if coins > 0 {
                    self.refund(user_id, coin_balance).await;
                }
                return Err(e.into());
            }
        };

        if amended {
            info!(order_id = %order.id, %user_id, "amended active order");
        } else {
            if let Some(stale) = flags.active_order() {
                info!(order_id = %stale, "active order no longer amendable, placed a new one");
                flags.clear_active_order();
            }
            info!(order_id = %order.id, %user_id, total = %order.total, "placed new order");
        }

        // The order exists from here on; ledger failures are logged, not returned.
        if coins > 0 {
            if let Err(e) = self
                .backend
                .append_coin_transaction(NewCoinTransaction::spent(user_id, coins, Some(order.id)))
                .await
            {
                error!(order_id = %order.id, %user_id, coins, "failed to record coin spend: {}", e);
            }
        }

        cart.clear();

        Ok(CheckoutOutcome {
            order,
            breakdown,
            amended,
        })
    }

    /// Puts the balance back after a failed order write.
    async fn refund(&self, user_id: Uuid, balance: i64) {
        if let Err(e) = self.backend.set_coin_balance(user_id, balance).await {
            error!(%user_id, balance, "failed to restore coin balance: {}", e);
        }
    }

    async fn coin_balance(&self, user_id: Uuid) -> Result<i64, CheckoutError> {
        Ok(self
            .backend
            .find_coin_account(user_id)
            .await?
            .map_or(0, |account| account.balance))
    }

    /// The active order, if it belongs to the user and is still inside its
    /// amend window.
    async fn amendable_order(
        &self,
        user_id: Uuid,
        flags: &SessionFlags,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, CheckoutError> {
        let Some(order_id) = flags.active_order() else {
            return Ok(None);
        };
        let Some(order) = self.backend.find_order(order_id).await? else {
            warn!(%order_id, "active order not found");
            return Ok(None);
        };
        if order.user_id != user_id {
            warn!(%order_id, %user_id, "active order belongs to another user");
            return Ok(None);
        }
        if countdown::inspect(order.id, order.created_at, flags, now).is_expired() {
            return Ok(None);
        }
        Ok(Some(order))
    }

    /// Default address, then the profile's free-text address, then a placeholder.
    pub async fn shipping_address(&self, user_id: Uuid) -> Result<String, CheckoutError> {
        if let Some(address) = self.backend.default_address(user_id).await? {
            return Ok(address.shipping_label());
        }
        let profile_address = self
            .backend
            .find_profile(user_id)
            .await?
            .and_then(|profile| profile.address)
            .filter(|address| !address.trim().is_empty());
        Ok(profile_address.unwrap_or_else(|| NO_ADDRESS.to_string()))
    }
}

fn validate_coins(requested: u32, max_redeemable: u32) -> Result<(), CheckoutError> {
    if requested > max_redeemable {
        return Err(CheckoutError::Validation(format!(
            "cannot redeem {requested} coins, at most {max_redeemable} allowed"
        )));
    }
    Ok(())
}

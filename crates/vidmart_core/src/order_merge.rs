//! crates/vidmart_core/src/order_merge.rs
//!
//! Folds newly added cart items into an order that is still inside its
//! amend window.
//!
//! Lines already on the order keep the unit price captured when the order was
//! placed; only lines that did not exist yet take the cart's current price. If
//! the catalogue price moved in between, one order can therefore carry two
//! price levels for different lines. That is the observed behaviour and is
//! kept as is.

use rust_decimal::Decimal;

use crate::domain::{CartItem, Order, OrderLine};
use crate::pricing::{self, PriceBreakdown};

/// The recomputed contents of an amended order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedOrder {
    pub items: Vec<OrderLine>,
    pub breakdown: PriceBreakdown,
}

/// Adds `incoming` quantities onto `existing` lines by product id, appending
/// lines for products the order did not contain. A line never exceeds
/// `u32::MAX` units.
pub fn merge_lines(existing: &[OrderLine], incoming: &[CartItem]) -> Vec<OrderLine> {
    let mut merged = existing.to_vec();

    for item in incoming {
        match merged.iter_mut().find(|line| line.product_id == item.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => merged.push(OrderLine::from(item)),
        }
    }

    merged
}

/// Sum of captured unit price times quantity.
pub fn subtotal(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(OrderLine::line_total).sum()
}

/// Merges `incoming` into `order` and reprices the result.
pub fn merge_into_order(order: &Order, incoming: &[CartItem], coins_to_redeem: u32) -> MergedOrder {
    let items = merge_lines(&order.items, incoming);
    let breakdown = pricing::compute(subtotal(&items), coins_to_redeem);
    MergedOrder { items, breakdown }
}

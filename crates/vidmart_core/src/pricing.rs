//! crates/vidmart_core/src/pricing.rs
//!
//! Checkout price breakdown: GST, handling fee and loyalty coin discount.

use rust_decimal::{Decimal, RoundingStrategy};

/// 18% goods and services tax.
pub const GST_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);
/// 1% handling fee.
pub const HANDLING_FEE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
/// Value of one loyalty coin in rupees.
pub const COIN_VALUE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
/// Coins that may be redeemed on a single order.
pub const MAX_COINS_PER_ORDER: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub gst: Decimal,
    pub handling_fee: Decimal,
    pub coins_redeemed: u32,
    pub coin_discount: Decimal,
    pub grand_total: Decimal,
}

/// Computes the breakdown for a subtotal and an already clamped number of coins.
pub fn compute(subtotal: Decimal, coins_to_redeem: u32) -> PriceBreakdown {
    let gst = subtotal * GST_RATE;
    let handling_fee = subtotal * HANDLING_FEE_RATE;
    let coin_discount = coin_value(i64::from(coins_to_redeem));
    let grand_total = (subtotal + gst + handling_fee - coin_discount).max(Decimal::ZERO);

    PriceBreakdown {
        subtotal: money(subtotal),
        gst: money(gst),
        handling_fee: money(handling_fee),
        coins_redeemed: coins_to_redeem,
        coin_discount: money(coin_discount),
        grand_total: money(grand_total),
    }
}

/// Rupee value of a coin balance.
pub fn coin_value(coins: i64) -> Decimal {
    Decimal::from(coins) * COIN_VALUE
}

/// The most coins a user with `balance` may redeem on one order.
pub fn redeemable_coins(balance: i64) -> u32 {
    let balance = u32::try_from(balance.max(0)).unwrap_or(u32::MAX);
    balance.min(MAX_COINS_PER_ORDER)
}

/// Clamps a requested redemption into `0..=redeemable_coins(balance)`.
pub fn clamp_coins(requested: i64, balance: i64) -> u32 {
    let cap = redeemable_coins(balance);
    u32::try_from(requested.max(0)).unwrap_or(u32::MAX).min(cap)
}

fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn thousand_rupees_with_ten_coins() {
        let breakdown = compute(dec("1000.00"), 10);

        assert_eq!(breakdown.gst, dec("180.00"));
        assert_eq!(breakdown.handling_fee, dec("10.00"));
        assert_eq!(breakdown.coin_discount, dec("1.00"));
        assert_eq!(breakdown.grand_total, dec("1189.00"));
    }

    #[test]
    fn compute_is_deterministic() {
        assert_eq!(compute(dec("432.10"), 3), compute(dec("432.10"), 3));
    }

    #[test]
    fn grand_total_never_negative() {
        for subtotal in ["0", "0.01", "0.50", "0.84", "1", "12.34"] {
            for coins in 0..=MAX_COINS_PER_ORDER {
                let breakdown = compute(dec(subtotal), coins);
                assert!(
                    breakdown.grand_total >= Decimal::ZERO,
                    "negative total for {subtotal} with {coins} coins"
                );
            }
        }
        assert_eq!(compute(Decimal::ZERO, 10).grand_total, Decimal::ZERO);
    }

    #[test]
    fn amounts_are_rounded_to_paise() {
        let breakdown = compute(dec("33.33"), 0);

        assert_eq!(breakdown.gst, dec("6.00"));
        assert_eq!(breakdown.handling_fee, dec("0.33"));
        assert_eq!(breakdown.grand_total, dec("39.66"));
    }

    #[test]
    fn redemption_is_capped_by_order_limit_and_balance() {
        assert_eq!(redeemable_coins(250), 10);
        assert_eq!(redeemable_coins(4), 4);
        assert_eq!(redeemable_coins(-3), 0);

        assert_eq!(clamp_coins(25, 250), 10);
        assert_eq!(clamp_coins(6, 4), 4);
        assert_eq!(clamp_coins(-2, 40), 0);
    }

    #[test]
    fn coin_value_is_ten_paise_per_coin() {
        assert_eq!(coin_value(125), dec("12.50"));
    }
}

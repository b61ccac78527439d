//! crates/vidmart_core/src/cart.rs
//!
//! The session cart. Totals are always derived from the current items.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::CartItem;

/// An in-memory cart keyed by product id.
///
/// Invariants: no two items share an id and every quantity is at least 1.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Vec<CartItem>,
    /// Items removed by a zero quantity update, kept so a later update can
    /// bring them back.
    removed: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Adds one unit of `item`. An existing line is incremented; a new one
    /// starts at quantity 1 whatever quantity `item` carries.
    pub fn add_to_cart(&mut self, item: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            existing.quantity = existing.quantity.saturating_add(1);
            return;
        }
        self.removed.retain(|i| i.id != item.id);
        self.items.push(CartItem { quantity: 1, ..item });
    }

    /// Sets the quantity of a line, removing it when `quantity <= 0`.
    ///
    /// Unknown ids are ignored, except ids removed earlier from this cart,
    /// which are re-created with the new quantity.
    pub fn update_quantity(&mut self, id: Uuid, quantity: i64) {
        let position = self.items.iter().position(|item| item.id == id);

        if quantity <= 0 {
            if let Some(index) = position {
                let item = self.items.remove(index);
                self.removed.retain(|i| i.id != id);
                self.removed.push(item);
            }
            return;
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match position {
            Some(index) => {
                if let Some(item) = self.items.get_mut(index) {
                    item.quantity = quantity;
                }
            }
            None => {
                if let Some(index) = self.removed.iter().position(|i| i.id == id) {
                    let item = self.removed.remove(index);
                    self.items.push(CartItem { quantity, ..item });
                }
            }
        }
    }

    /// Empties the cart after a successful order.
    pub fn clear(&mut self) {
        self.items.clear();
        self.removed.clear();
    }

    /// Sum of quantities. Widened so that several lines near `u32::MAX`
    /// still add up exactly.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of unit price times quantity.
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, name: &str) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unit_price: Decimal::from(price),
            image_url: String::new(),
            quantity: 1,
        }
    }

    #[test]
    fn adding_same_item_increments_quantity() {
        let mut cart = Cart::new();
        let milk = item(50, "Milk");

        cart.add_to_cart(milk.clone());
        cart.add_to_cart(milk.clone());

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(milk.id).map(|i| i.quantity), Some(2));
    }

    #[test]
    fn new_items_start_at_quantity_one() {
        let mut cart = Cart::new();
        let bread = CartItem {
            quantity: 9,
            ..item(40, "Bread")
        };

        cart.add_to_cart(bread.clone());

        assert_eq!(cart.get(bread.id).map(|i| i.quantity), Some(1));
    }

    #[test]
    fn totals_follow_quantity_updates() {
        let mut cart = Cart::new();
        let a = item(50, "A");
        let b = item(30, "B");

        cart.add_to_cart(a.clone());
        cart.update_quantity(a.id, 2);
        cart.add_to_cart(b.clone());

        assert_eq!(cart.total(), Decimal::from(130));
        assert_eq!(cart.item_count(), 3);

        cart.update_quantity(a.id, 0);

        assert_eq!(cart.total(), Decimal::from(30));
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn zero_update_then_positive_update_recreates_line() {
        let mut cart = Cart::new();
        let a = item(10, "A");
        cart.add_to_cart(a.clone());

        cart.update_quantity(a.id, 0);
        assert!(cart.get(a.id).is_none());

        cart.update_quantity(a.id, 4);
        assert_eq!(cart.get(a.id).map(|i| i.quantity), Some(4));
        assert_eq!(cart.total(), Decimal::from(40));
    }

    #[test]
    fn updating_unknown_id_is_a_no_op() {
        let mut cart = Cart::new();
        cart.add_to_cart(item(10, "A"));

        cart.update_quantity(Uuid::new_v4(), 3);

        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn negative_update_removes_line() {
        let mut cart = Cart::new();
        let a = item(10, "A");
        cart.add_to_cart(a.clone());

        cart.update_quantity(a.id, -5);

        assert!(cart.is_empty());
    }

    #[test]
    fn clear_forgets_removed_items_too() {
        let mut cart = Cart::new();
        let a = item(10, "A");
        cart.add_to_cart(a.clone());
        cart.update_quantity(a.id, 0);

        cart.clear();
        cart.update_quantity(a.id, 2);

        assert!(cart.is_empty());
    }

    #[test]
    fn item_count_matches_quantities_over_mixed_operations() {
        let mut cart = Cart::new();
        let items: Vec<CartItem> = (1..=4).map(|p| item(p, "x")).collect();

        let ops: [(usize, i64); 10] = [
            (0, 3),
            (1, 1),
            (2, 0),
            (3, 7),
            (0, -1),
            (1, 5),
            (2, 2),
            (3, 0),
            (0, 4),
            (1, 1),
        ];
        for it in &items {
            cart.add_to_cart(it.clone());
        }
        for (index, quantity) in ops {
            let id = items[index].id;
            cart.add_to_cart(items[index].clone());
            cart.update_quantity(id, quantity);

            let sum: u64 = cart.items().iter().map(|i| u64::from(i.quantity)).sum();
            assert_eq!(cart.item_count(), sum);
            assert!(cart.items().iter().all(|i| i.quantity >= 1));
        }
    }

    #[test]
    fn huge_quantities_are_counted_exactly() {
        let mut cart = Cart::new();
        let a = item(1, "A");
        let b = item(2, "B");
        cart.add_to_cart(a.clone());
        cart.add_to_cart(b.clone());

        cart.update_quantity(a.id, 5_000_000_000);
        cart.update_quantity(b.id, i64::from(u32::MAX));

        assert_eq!(cart.get(a.id).map(|i| i.quantity), Some(u32::MAX));
        assert_eq!(cart.item_count(), 2 * u64::from(u32::MAX));
        assert_eq!(cart.total(), Decimal::from(u32::MAX) * Decimal::from(3));

        // One more unit on a full line stays at the ceiling.
        cart.add_to_cart(a.clone());
        assert_eq!(cart.get(a.id).map(|i| i.quantity), Some(u32::MAX));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_catalog::ProductId;
use inkwell_core::{DomainError, Entity, UserId};

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    /// Anonymous shopper identified by a session token.
    Guest(String),
    Customer(UserId),
}

impl core::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CartOwner::Guest(session) => write!(f, "guest:{session}"),
            CartOwner::Customer(id) => write!(f, "customer:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub owner: CartOwner,
    pub lines: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Cart {
    type Id = CartOwner;

    fn id(&self) -> &Self::Id {
        &self.owner
    }
}

fn not_enough_stock(available: u32) -> DomainError {
    DomainError::validation(format!("only {available} units available"))
}

impl Cart {
    pub fn new(owner: CartOwner, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            lines: Vec::new(),
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Distinct products in the cart.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }

    /// Add `quantity` units, merging with an existing line.
    ///
    /// `available` is the current stock when it is tracked; the merged quantity
    /// may not exceed it.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        available: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let merged = self.quantity_of(product_id).saturating_add(quantity);
        if let Some(available) = available {
            if merged > available {
                return Err(not_enough_stock(available));
            }
        }

        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = merged,
            None => self.lines.push(CartLine {
                product_id,
                quantity,
                added_at: now,
            }),
        }
        self.updated_at = now;
        Ok(())
    }

    /// Set a line's quantity; zero or less removes it.
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
        available: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.lines.iter().any(|l| l.product_id == product_id) {
            return Err(DomainError::not_found());
        }
        if quantity <= 0 {
            self.remove_item(product_id, now);
            return Ok(());
        }

        let quantity = u32::try_from(quantity).map_err(|_| DomainError::validation("quantity too large"))?;
        if let Some(available) = available {
            if quantity > available {
                return Err(not_enough_stock(available));
            }
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = quantity;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: ProductId, now: DateTime<Utc>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        let removed = self.lines.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.updated_at = now;
    }

    /// Fold a guest cart into this one, summing shared products.
    ///
    /// Stock is not re-checked here; checkout validates availability.
    pub fn merge_from(&mut self, guest: Cart, now: DateTime<Utc>) {
        for incoming in guest.lines {
            match self.lines.iter_mut().find(|l| l.product_id == incoming.product_id) {
                Some(line) => line.quantity = line.quantity.saturating_add(incoming.quantity),
                None => self.lines.push(incoming),
            }
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_core::AggregateId;

    fn pid() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn guest_cart() -> Cart {
        Cart::new(CartOwner::Guest("sess-1".into()), Utc::now())
    }

    #[test]
    fn add_merges_and_respects_stock() {
        let now = Utc::now();
        let mut cart = guest_cart();
        let book = pid();

        cart.add_item(book, 2, Some(3), now).unwrap();
        cart.add_item(book, 1, Some(3), now).unwrap();
        assert_eq!(cart.quantity_of(book), 3);
        assert_eq!(cart.item_count(), 1);

        let err = cart.add_item(book, 1, Some(3), now).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(cart.quantity_of(book), 3);
    }

    #[test]
    fn untracked_stock_is_unbounded() {
        let mut cart = guest_cart();
        cart.add_item(pid(), 500, None, Utc::now()).unwrap();
        assert_eq!(cart.total_quantity(), 500);
    }

    #[test]
    fn zero_quantity_add_is_invalid() {
        let mut cart = guest_cart();
        assert!(cart.add_item(pid(), 0, None, Utc::now()).is_err());
    }

    #[test]
    fn set_quantity_zero_removes() {
        let now = Utc::now();
        let mut cart = guest_cart();
        let book = pid();
        cart.add_item(book, 2, None, now).unwrap();

        cart.set_quantity(book, 0, None, now).unwrap();
        assert!(cart.is_empty());

        assert_eq!(cart.set_quantity(book, 1, None, now), Err(DomainError::NotFound));
    }

    #[test]
    fn set_quantity_checks_stock() {
        let now = Utc::now();
        let mut cart = guest_cart();
        let book = pid();
        cart.add_item(book, 1, Some(5), now).unwrap();
        assert!(cart.set_quantity(book, 6, Some(5), now).is_err());
        cart.set_quantity(book, 5, Some(5), now).unwrap();
        assert_eq!(cart.quantity_of(book), 5);
    }

    #[test]
    fn merge_sums_shared_products() {
        let now = Utc::now();
        let shared = pid();
        let only_guest = pid();

        let mut guest = guest_cart();
        guest.add_item(shared, 1, None, now).unwrap();
        guest.add_item(only_guest, 2, None, now).unwrap();

        let mut mine = Cart::new(CartOwner::Customer(UserId::new()), now);
        mine.add_item(shared, 2, None, now).unwrap();

        mine.merge_from(guest, now);
        assert_eq!(mine.quantity_of(shared), 3);
        assert_eq!(mine.quantity_of(only_guest), 2);
        assert_eq!(mine.item_count(), 2);
    }
}

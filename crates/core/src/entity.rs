//! Entity trait: identity that survives state changes.
//!
//! Carts, coupons and homepage sections are plain entities; they are stored
//! directly rather than event-sourced.

pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

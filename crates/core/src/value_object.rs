//! Value object trait: equality by value, not identity.

/// Marker trait for immutable values compared attribute by attribute.
///
/// `Money`, shipping addresses and prices are value objects: two prices with
/// the same MRP and sale amount are the same price.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

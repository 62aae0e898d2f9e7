//! Carts and orders.
//!
//! Carts are plain entities owned by a guest session or a signed-in customer.
//! Orders are event-sourced: placement snapshots the priced cart, and payment
//! and fulfilment move the order through a fixed status table.

pub mod cart;
pub mod order;

pub use cart::{Cart, CartLine, CartOwner};
pub use inkwell_pricing::PaymentMethod;
pub use order::{
    AttachGatewayOrder, CapturePayment, ChangeStatus, ContactDetails, FailPayment,
    GatewayOrderAttached, Order, OrderCommand, OrderEvent, OrderId, OrderLine, OrderPlaced,
    OrderRefunded, OrderStatus, OrderStatusChanged, PaymentCaptured, PaymentFailed, PaymentStatus,
    PlaceOrder, RefundPayment, ShippingAddress,
};

/// Stream type for orders in the event store.
pub const AGGREGATE_TYPE: &str = "orders.order";

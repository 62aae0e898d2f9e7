//! Payment gateway integration.
//!
//! Signature checks for the hosted checkout and webhooks, webhook parsing,
//! a gateway client for creating orders and refunds, and UPI intent links.

pub mod gateway;
pub mod signature;
pub mod upi;
pub mod webhook;

pub use gateway::{GatewayError, GatewayOrder, GatewayRefund, PaymentGateway, RazorpayGateway, SimulatedGateway};
pub use signature::{checkout_signature, sign, verify_checkout_signature, verify_webhook_signature, SignatureError};
pub use upi::upi_intent_url;
pub use webhook::{parse_webhook, WebhookError, WebhookEvent};

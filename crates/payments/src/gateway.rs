use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use inkwell_core::Money;

pub const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway is not configured")]
    NotConfigured,

    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Order created on the gateway side; the browser checkout pays against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: Option<Money>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the browser checkout.
    fn key_id(&self) -> &str;

    async fn create_order(&self, amount: Money, receipt: &str) -> Result<GatewayOrder, GatewayError>;

    /// Refund a captured payment, in full when `amount` is `None`.
    async fn refund(&self, payment_id: &str, amount: Option<Money>) -> Result<GatewayRefund, GatewayError>;
}

/// HTTP client for the Razorpay orders and refunds API.
#[derive(Debug, Clone)]
pub struct RazorpayGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: u64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: u64,
    currency: String,
    #[serde(default)]
    receipt: Option<String>,
}

#[derive(Serialize)]
struct RefundBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<u64>,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
    #[serde(default)]
    amount: Option<u64>,
}

impl RazorpayGateway {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self::with_base_url(RAZORPAY_API_BASE, key_id, key_secret)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.key_id.is_empty() || self.key_secret.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(())
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %message, "payment gateway rejected request");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, amount: Money, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        self.ensure_configured()?;
        let body = CreateOrderBody {
            amount: amount.paise(),
            currency: "INR",
            receipt,
            payment_capture: 1,
        };
        let request = self.http.post(format!("{}/orders", self.base_url)).json(&body);
        let order: OrderResponse = self.send(request).await?;
        tracing::info!(gateway_order_id = %order.id, receipt, "gateway order created");

        Ok(GatewayOrder {
            id: order.id,
            amount: Money::from_paise(order.amount),
            currency: order.currency,
            receipt: order.receipt.unwrap_or_else(|| receipt.to_string()),
        })
    }

    async fn refund(&self, payment_id: &str, amount: Option<Money>) -> Result<GatewayRefund, GatewayError> {
        self.ensure_configured()?;
        let body = RefundBody {
            amount: amount.map(|a| a.paise()),
        };
        let request = self
            .http
            .post(format!("{}/payments/{payment_id}/refund", self.base_url))
            .json(&body);
        let refund: RefundResponse = self.send(request).await?;
        tracing::info!(refund_id = %refund.id, payment_id, "refund processed");

        Ok(GatewayRefund {
            id: refund.id,
            payment_id: payment_id.to_string(),
            amount: refund.amount.map(Money::from_paise).or(amount),
        })
    }
}

/// Offline gateway for development and tests. Ids are sequential.
#[derive(Debug)]
pub struct SimulatedGateway {
    key_id: String,
    next: AtomicU64,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self {
            key_id: "rzp_test_simulated".to_string(),
            next: AtomicU64::new(1),
        }
    }

    fn next_seq(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, amount: Money, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder {
            id: format!("order_sim_{:06}", self.next_seq()),
            amount,
            currency: "INR".to_string(),
            receipt: receipt.to_string(),
        })
    }

    async fn refund(&self, payment_id: &str, amount: Option<Money>) -> Result<GatewayRefund, GatewayError> {
        Ok(GatewayRefund {
            id: format!("rfnd_sim_{:06}", self.next_seq()),
            payment_id: payment_id.to_string(),
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_ids_are_sequential() {
        let gw = SimulatedGateway::new();
        let a = gw.create_order(Money::from_rupees(100), "order_1").await.unwrap();
        let b = gw.create_order(Money::from_rupees(200), "order_2").await.unwrap();
        assert_eq!(a.id, "order_sim_000001");
        assert_eq!(b.id, "order_sim_000002");
        assert_eq!(b.amount, Money::from_rupees(200));

        let r = gw.refund("pay_1", None).await.unwrap();
        assert_eq!(r.id, "rfnd_sim_000003");
    }

    #[tokio::test]
    async fn unconfigured_razorpay_fails_fast() {
        let gw = RazorpayGateway::new("", "");
        let err = gw.create_order(Money::from_rupees(1), "r").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured));
    }
}

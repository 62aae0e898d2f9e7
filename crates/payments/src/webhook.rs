use serde::Deserialize;
use thiserror::Error;

use inkwell_core::Money;

/// What a gateway webhook asks us to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentCaptured {
        payment_id: String,
        gateway_order_id: String,
        amount: Money,
    },
    PaymentFailed {
        payment_id: String,
        gateway_order_id: String,
        error: Option<String>,
    },
    /// An event type this store does not act on.
    Ignored(String),
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed webhook body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("webhook payload is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    payment: Option<PaymentWrapper>,
}

#[derive(Debug, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: Option<String>,
    order_id: Option<String>,
    #[serde(default)]
    amount: Option<u64>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Parse a webhook body that has already passed signature verification.
pub fn parse_webhook(body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    let kind = envelope.event.as_str();
    if kind != "payment.captured" && kind != "payment.failed" {
        return Ok(WebhookEvent::Ignored(envelope.event));
    }

    let entity = envelope
        .payload
        .payment
        .map(|p| p.entity)
        .ok_or(WebhookError::MissingField("payload.payment.entity"))?;
    let payment_id = entity.id.ok_or(WebhookError::MissingField("id"))?;
    let gateway_order_id = entity.order_id.ok_or(WebhookError::MissingField("order_id"))?;

    if kind == "payment.captured" {
        let amount = entity.amount.ok_or(WebhookError::MissingField("amount"))?;
        Ok(WebhookEvent::PaymentCaptured {
            payment_id,
            gateway_order_id,
            amount: Money::from_paise(amount),
        })
    } else {
        Ok(WebhookEvent::PaymentFailed {
            payment_id,
            gateway_order_id,
            error: entity.error_description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured() {
        let body = br#"{
            "event": "payment.captured",
            "payload": { "payment": { "entity": {
                "id": "pay_29QQoUBi66xm2f", "order_id": "order_9A33XWu170gUtm", "amount": 50000, "currency": "INR"
            }}}
        }"#;
        assert_eq!(
            parse_webhook(body).unwrap(),
            WebhookEvent::PaymentCaptured {
                payment_id: "pay_29QQoUBi66xm2f".into(),
                gateway_order_id: "order_9A33XWu170gUtm".into(),
                amount: Money::from_rupees(500),
            }
        );
    }

    #[test]
    fn failed_carries_description() {
        let body = br#"{"event":"payment.failed","payload":{"payment":{"entity":{
            "id":"pay_1","order_id":"order_1","error_description":"Payment was unsuccessful"}}}}"#;
        match parse_webhook(body).unwrap() {
            WebhookEvent::PaymentFailed { error, .. } => {
                assert_eq!(error.as_deref(), Some("Payment was unsuccessful"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_events_are_ignored() {
        let body = br#"{"event":"refund.processed","payload":{}}"#;
        assert_eq!(
            parse_webhook(body).unwrap(),
            WebhookEvent::Ignored("refund.processed".into())
        );
    }

    #[test]
    fn captured_without_order_is_an_error() {
        let body = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_1","amount":1}}}}"#;
        assert!(matches!(parse_webhook(body), Err(WebhookError::MissingField("order_id"))));
        assert!(matches!(parse_webhook(b"not json"), Err(WebhookError::Malformed(_))));
    }
}

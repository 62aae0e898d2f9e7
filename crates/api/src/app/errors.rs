use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use inkwell_core::DomainError;
use inkwell_infra::checkout::CheckoutError;
use inkwell_infra::command_dispatcher::DispatchError;
use inkwell_infra::read_model::ReadStoreError;
use inkwell_payments::{GatewayError, SignatureError};

use crate::app::services::DocumentError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) | DispatchError::CorruptStream(msg) => {
            tracing::error!(error = %msg, "unreadable event stream");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "stored events could not be read")
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    dispatch_error_to_response(err.into())
}

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    match err {
        CheckoutError::EmptyCart => json_error(StatusCode::BAD_REQUEST, "empty_cart", err.to_string()),
        CheckoutError::Unavailable(msg) => json_error(StatusCode::CONFLICT, "unavailable", msg),
        CheckoutError::Coupon(e) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_coupon", e.to_string()),
        CheckoutError::Cod(e) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "cod_unavailable", e.to_string()),
        CheckoutError::Signature(SignatureError::SecretNotConfigured) => json_error(
            StatusCode::BAD_REQUEST,
            "webhook_not_configured",
            "webhook secret is not configured",
        ),
        CheckoutError::Signature(e) => json_error(StatusCode::BAD_REQUEST, "invalid_signature", e.to_string()),
        CheckoutError::Webhook(e) => json_error(StatusCode::BAD_REQUEST, "invalid_webhook", e.to_string()),
        CheckoutError::Gateway(GatewayError::NotConfigured) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "gateway_not_configured",
            "payment gateway is not configured",
        ),
        CheckoutError::Gateway(e) => {
            tracing::error!(error = %e, "payment gateway call failed");
            json_error(StatusCode::BAD_GATEWAY, "gateway_error", e.to_string())
        }
        CheckoutError::AmountMismatch { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "amount_mismatch", err.to_string())
        }
        CheckoutError::UnknownGatewayOrder(_) => json_error(StatusCode::NOT_FOUND, "unknown_order", err.to_string()),
        CheckoutError::Store(e) => store_error_to_response(e),
        CheckoutError::Dispatch(e) => dispatch_error_to_response(e),
    }
}

pub fn store_error_to_response(err: ReadStoreError) -> axum::response::Response {
    tracing::error!(error = %err, "document write failed");
    json_error(StatusCode::SERVICE_UNAVAILABLE, "store_error", err.to_string())
}

pub fn document_error_to_response(err: DocumentError) -> axum::response::Response {
    match err {
        DocumentError::Domain(e) => domain_error_to_response(e),
        DocumentError::Store(e) => store_error_to_response(e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_pricing::CouponRejection;

    #[test]
    fn status_mapping() {
        assert_eq!(
            dispatch_error_to_response(DispatchError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            domain_error_to_response(DomainError::validation("bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            checkout_error_to_response(CheckoutError::EmptyCart).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            checkout_error_to_response(CheckoutError::Coupon(CouponRejection::Expired)).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            checkout_error_to_response(CheckoutError::Signature(SignatureError::SecretNotConfigured)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            checkout_error_to_response(CheckoutError::Store(ReadStoreError::Unavailable("down".into()))).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            document_error_to_response(DocumentError::Domain(DomainError::NotFound)).status(),
            StatusCode::NOT_FOUND
        );
    }
}

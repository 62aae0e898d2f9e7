use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signing secret is not configured")]
    SecretNotConfigured,

    #[error("signature is missing")]
    MissingSignature,

    #[error("signature does not match")]
    InvalidSignature,
}

fn mac(secret: &str, data: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::SecretNotConfigured)?;
    mac.update(data);
    Ok(mac)
}

/// Lowercase hex HMAC-SHA256 of `data`.
pub fn sign(secret: &str, data: &[u8]) -> Result<String, SignatureError> {
    Ok(hex::encode(mac(secret, data)?.finalize().into_bytes()))
}

fn verify(secret: &str, data: &[u8], signature: &str) -> Result<(), SignatureError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(SignatureError::MissingSignature);
    }
    let expected = hex::decode(signature).map_err(|_| SignatureError::InvalidSignature)?;
    mac(secret, data)?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::InvalidSignature)
}

/// Signature the hosted checkout returns for `gateway_order_id|payment_id`.
pub fn checkout_signature(
    gateway_order_id: &str,
    payment_id: &str,
    key_secret: &str,
) -> Result<String, SignatureError> {
    sign(key_secret, format!("{gateway_order_id}|{payment_id}").as_bytes())
}

/// Check the signature returned to the browser after a checkout payment.
pub fn verify_checkout_signature(
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &str,
) -> Result<(), SignatureError> {
    if key_secret.is_empty() {
        return Err(SignatureError::SecretNotConfigured);
    }
    verify(
        key_secret,
        format!("{gateway_order_id}|{payment_id}").as_bytes(),
        signature,
    )
}

/// Check a webhook body against its signature header.
///
/// The MAC is computed over the raw request bytes, before any JSON parsing.
pub fn verify_webhook_signature(
    raw_body: &[u8],
    signature_header: Option<&str>,
    secret: Option<&str>,
) -> Result<(), SignatureError> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(SignatureError::SecretNotConfigured)?;
    let header = signature_header.ok_or(SignatureError::MissingSignature)?;
    verify(secret, raw_body, header)
}

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

use inkwell_auth::JwtValidator;
use inkwell_orders::CartOwner;

use crate::context::{CartContext, PrincipalContext};

pub const CART_SESSION_HEADER: &str = "x-cart-session";

const MAX_SESSION_LEN: usize = 128;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

impl AuthState {
    fn principal(&self, token: &str) -> Result<PrincipalContext, StatusCode> {
        let claims = self.jwt.validate(token, Utc::now()).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            StatusCode::UNAUTHORIZED
        })?;
        Ok(PrincipalContext::new(claims.sub, claims.roles, claims.email))
    }
}

/// Admin routes: a valid bearer token is mandatory.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?.ok_or(StatusCode::UNAUTHORIZED)?;
    let principal = state.principal(token)?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Storefront routes: anonymous is fine, but a token that is present must be valid.
///
/// Also resolves the cart owner and mints a guest session when there is none.
pub async fn storefront_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let principal = match extract_bearer(req.headers())? {
        Some(token) => Some(state.principal(token)?),
        None => None,
    };

    let session = req
        .headers()
        .get(CART_SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= MAX_SESSION_LEN)
        .map(str::to_string);

    let cart = match (&principal, session) {
        (Some(p), session) => CartContext {
            owner: CartOwner::Customer(p.user_id()),
            session,
            minted: false,
        },
        (None, Some(session)) => CartContext {
            owner: CartOwner::Guest(session.clone()),
            session: Some(session),
            minted: false,
        },
        (None, None) => {
            let session = Uuid::now_v7().simple().to_string();
            CartContext {
                owner: CartOwner::Guest(session.clone()),
                session: Some(session),
                minted: true,
            }
        }
    };

    let minted = cart.minted.then(|| cart.session.clone()).flatten();
    if let Some(principal) = principal {
        req.extensions_mut().insert(principal);
    }
    req.extensions_mut().insert(cart);

    let mut response = next.run(req).await;
    if let Some(session) = minted {
        if let Ok(value) = HeaderValue::from_str(&session) {
            response.headers_mut().insert(CART_SESSION_HEADER, value);
        }
    }
    Ok(response)
}

/// `Ok(None)` when there is no Authorization header at all.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, StatusCode> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(Some(token))
}

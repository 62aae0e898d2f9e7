use thiserror::Error;

use crate::{Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Implemented by admin requests that need a permission before they run.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Pure policy check. No IO.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Built-in role to permission mapping.
///
/// - `admin`: everything
/// - `staff`: day-to-day store operations, but not coupons
/// - `customer` and unknown roles: nothing administrative
pub fn role_permissions(role: &Role) -> Vec<Permission> {
    match role.as_str() {
        "admin" => vec![Permission::WILDCARD],
        "staff" => vec![
            Permission::CATALOG_MANAGE,
            Permission::INVENTORY_MANAGE,
            Permission::ORDERS_READ,
            Permission::ORDERS_MANAGE,
            Permission::HOME_MANAGE,
            Permission::DASHBOARD_READ,
        ],
        _ => Vec::new(),
    }
}

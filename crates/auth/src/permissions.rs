use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Opaque strings such as `"catalog.manage"`. The wildcard `"*"` grants
/// everything and is what the admin role resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const CATALOG_MANAGE: Permission = Permission(Cow::Borrowed("catalog.manage"));
    pub const INVENTORY_MANAGE: Permission = Permission(Cow::Borrowed("inventory.manage"));
    pub const ORDERS_READ: Permission = Permission(Cow::Borrowed("orders.read"));
    pub const ORDERS_MANAGE: Permission = Permission(Cow::Borrowed("orders.manage"));
    pub const HOME_MANAGE: Permission = Permission(Cow::Borrowed("home.manage"));
    pub const COUPONS_MANAGE: Permission = Permission(Cow::Borrowed("coupons.manage"));
    pub const DASHBOARD_READ: Permission = Permission(Cow::Borrowed("dashboard.read"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

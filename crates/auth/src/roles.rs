use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role carried in a bearer token.
///
/// Unknown role names are kept as-is and simply grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const CUSTOMER: Role = Role(Cow::Borrowed("customer"));
    pub const STAFF: Role = Role(Cow::Borrowed("staff"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

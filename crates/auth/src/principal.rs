use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use inkwell_core::UserId;

use crate::{Permission, Role, authorize::role_permissions};

/// Identity of an authenticated caller (customer or staff member).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The domain-side user id for this principal.
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.0)
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A resolved principal: identity, roles, and the permissions those roles grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve permissions from the built-in role mapping.
    pub fn from_roles(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        let mut permissions: Vec<Permission> = Vec::new();
        for role in &roles {
            for p in role_permissions(role) {
                if !permissions.contains(&p) {
                    permissions.push(p);
                }
            }
        }
        Self {
            principal_id,
            roles,
            permissions,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

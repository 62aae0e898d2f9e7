use inkwell_auth::{Principal, PrincipalId, Role};
use inkwell_core::UserId;
use inkwell_orders::CartOwner;

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
    email: Option<String>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>, email: Option<String>) -> Self {
        Self {
            principal_id,
            roles,
            email,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn user_id(&self) -> UserId {
        self.principal_id.user_id()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Resolve role permissions for an authorization check.
    pub fn to_principal(&self) -> Principal {
        Principal::from_roles(self.principal_id, self.roles.clone())
    }
}

/// Whose cart a storefront request works on.
///
/// A bearer principal wins; otherwise the `x-cart-session` header names a
/// guest cart. `minted` is set when the session id was created for this
/// request and must be echoed back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartContext {
    pub owner: CartOwner,
    pub session: Option<String>,
    pub minted: bool,
}

impl CartContext {
    pub fn customer(&self) -> Option<UserId> {
        match &self.owner {
            CartOwner::Customer(id) => Some(*id),
            CartOwner::Guest(_) => None,
        }
    }
}

//! API-side authorization guard for admin requests.
//!
//! Checks run at the request boundary (before dispatch), keeping domain
//! aggregates and infra auth-agnostic.

use inkwell_auth::{AuthzError, CommandAuthorization, Permission, authorize};

use crate::context::PrincipalContext;

/// Check every permission a command needs against the caller's roles.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = principal.to_principal();
    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}

/// Single-permission check for requests that are not commands.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), AuthzError> {
    authorize(&principal.to_principal(), permission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_auth::{PrincipalId, Role};

    struct Needs(Vec<Permission>);

    impl CommandAuthorization for Needs {
        fn required_permissions(&self) -> &[Permission] {
            &self.0
        }
    }

    fn ctx(role: Role) -> PrincipalContext {
        PrincipalContext::new(PrincipalId::new(), vec![role], None)
    }

    #[test]
    fn every_required_permission_is_checked() {
        let cmd = Needs(vec![Permission::CATALOG_MANAGE, Permission::COUPONS_MANAGE]);
        assert!(authorize_command(&ctx(Role::ADMIN), &cmd).is_ok());
        assert_eq!(
            authorize_command(&ctx(Role::STAFF), &cmd),
            Err(AuthzError::Forbidden("coupons.manage".into()))
        );
    }

    #[test]
    fn customers_cannot_reach_admin() {
        assert!(require(&ctx(Role::CUSTOMER), &Permission::DASHBOARD_READ).is_err());
        assert!(require(&ctx(Role::STAFF), &Permission::DASHBOARD_READ).is_ok());
    }
}

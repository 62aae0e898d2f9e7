use axum::http::StatusCode;
use axum::response::Response;

use inkwell_auth::{CommandAuthorization, Permission};

use crate::app::errors;
use crate::authz;
use crate::context::PrincipalContext;

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, required: Permission) -> Self {
        Self {
            inner,
            required: vec![required],
        }
    }

    /// Unwrap the command once the caller is allowed to run it.
    pub fn authorize(self, principal: &PrincipalContext) -> Result<C, Response> {
        authz::authorize_command(principal, &self).map_err(forbidden)?;
        Ok(self.inner)
    }
}

/// Permission check for admin reads and document edits.
pub fn guard(principal: &PrincipalContext, permission: Permission) -> Result<(), Response> {
    authz::require(principal, &permission).map_err(forbidden)
}

fn forbidden(e: inkwell_auth::AuthzError) -> Response {
    errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
}

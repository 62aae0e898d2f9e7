//! `inkwell-auth`: bearer-token identity and permission checks.
//!
//! Tokens are minted elsewhere; this crate only verifies them and maps roles
//! to permissions. It knows nothing about HTTP or storage.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod validator;

pub use authorize::{AuthzError, CommandAuthorization, authorize, role_permissions};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use permissions::Permission;
pub use principal::{Principal, PrincipalId};
pub use roles::Role;
pub use validator::{Hs256JwtValidator, JwtError, JwtValidator};

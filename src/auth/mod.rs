//! Request authentication and role-based authorization.
//!
//! Access tokens arrive as `Authorization: Bearer <token>` and are verified
//! statelessly; refresh tokens travel in an HTTP-only cookie scoped to the
//! auth endpoints. The extractors here attach `{user_id, role}` to handlers
//! and enforce role allow-sets.

mod cookie;
mod errors;
mod extractors;

pub use cookie::{
    REFRESH_COOKIE_NAME, build_refresh_cookie, clear_refresh_cookie, get_cookie,
};
pub use errors::AuthError;
pub use extractors::{
    Auth, AuthenticatedUser, HasAuthState, RoleRestricted, RoleSet, StaffOnly,
};

pub mod auth;
pub mod ownership;

pub use auth::{admin_middleware, auth_middleware, AdminUser, AuthContext, AuthUser, LiveIdentity};
pub use ownership::{authorize_owned, may_access, Owned, Principal};

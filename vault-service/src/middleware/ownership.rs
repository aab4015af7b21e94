//! Per-resource access checks.

use service_core::error::AppError;

use crate::middleware::auth::{load_live_identity, AuthContext};
use crate::models::{FileRecord, Role};
use crate::services::UserStore;

/// A resource with a single, immutable owner.
pub trait Owned {
    fn owner_id(&self) -> &str;
}

impl Owned for FileRecord {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Principal<'a> {
    pub id: &'a str,
    pub role: Role,
}

/// Admins may access anything; everyone else only what they own.
pub fn may_access<R: Owned + ?Sized>(principal: &Principal<'_>, resource: &R) -> bool {
    principal.role == Role::Admin || resource.owner_id() == principal.id
}

/// Allow the owner outright. Otherwise decide on the caller's live role, re-reading the
/// account if the gate did not already do so.
pub async fn authorize_owned<R: Owned + Sync + ?Sized>(
    ctx: &AuthContext,
    resource: &R,
    users: &dyn UserStore,
) -> Result<(), AppError> {
    if resource.owner_id() == ctx.user_id {
        return Ok(());
    }

    let role = match ctx.live {
        Some(live) => live.role,
        None => load_live_identity(users, &ctx.user_id).await?.role,
    };

    let principal = Principal {
        id: &ctx.user_id,
        role,
    };
    if may_access(&principal, resource) {
        tracing::info!(
            user_id = %ctx.user_id,
            owner_id = %resource.owner_id(),
            "Admin override on owned resource"
        );
        Ok(())
    } else {
        tracing::warn!(
            user_id = %ctx.user_id,
            owner_id = %resource.owner_id(),
            "Access to another user's resource denied"
        );
        Err(AppError::Forbidden(anyhow::anyhow!(
            "You do not have permission to access this file"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::LiveIdentity;
    use crate::models::User;
    use crate::services::InMemoryUserStore;

    struct Doc(&'static str);

    impl Owned for Doc {
        fn owner_id(&self) -> &str {
            self.0
        }
    }

    fn ctx(user_id: &str) -> AuthContext {
        AuthContext {
            user_id: user_id.to_string(),
            live: None,
        }
    }

    #[test]
    fn test_may_access_truth_table() {
        for role in [Role::User, Role::Admin] {
            for (id, owner) in [("a", "a"), ("a", "b")] {
                let principal = Principal { id, role };
                let expected = role == Role::Admin || id == owner;
                assert_eq!(may_access(&principal, &Doc(owner)), expected);
            }
        }
    }

    #[tokio::test]
    async fn test_owner_allowed_without_store_lookup() {
        let store = InMemoryUserStore::new();
        store.set_unavailable(true);
        assert!(authorize_owned(&ctx("a"), &Doc("a"), &store).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_owner_uses_live_role() {
        let store = InMemoryUserStore::new();
        let mut admin = User::new("Root".to_string(), "root@example.com", "h".to_string());
        admin.role = Role::Admin;
        let regular = User::new("Bob".to_string(), "bob@example.com", "h".to_string());
        store.insert(&admin).await.unwrap();
        store.insert(&regular).await.unwrap();

        assert!(authorize_owned(&ctx(&admin.id), &Doc("someone"), &store)
            .await
            .is_ok());
        assert!(matches!(
            authorize_owned(&ctx(&regular.id), &Doc("someone"), &store).await,
            Err(AppError::Forbidden(_))
        ));

        // Demoted after the token was issued.
        admin.role = Role::User;
        store.update(&admin).await.unwrap();
        assert!(authorize_owned(&ctx(&admin.id), &Doc("someone"), &store)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_context_live_role_is_used() {
        let store = InMemoryUserStore::new();
        store.set_unavailable(true);
        let ctx = AuthContext {
            user_id: "admin".to_string(),
            live: Some(LiveIdentity {
                role: Role::Admin,
                suspended: false,
            }),
        };
        assert!(authorize_owned(&ctx, &Doc("someone"), &store).await.is_ok());
    }
}

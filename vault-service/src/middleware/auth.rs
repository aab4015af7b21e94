use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{models::Role, services::UserStore, AppState};

/// Account state read from the credential store during this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveIdentity {
    pub role: Role,
    pub suspended: bool,
}

/// Identity attached to an authenticated request.
///
/// `live` is only present when the gate re-read the account; the role and suspension
/// snapshot embedded in the token are never exposed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub live: Option<LiveIdentity>,
}

impl AuthContext {
    pub fn is_live_admin(&self) -> bool {
        self.live.is_some_and(|live| live.role == Role::Admin)
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty()).then_some(token)
}

/// Re-read the account behind a verified token.
///
/// A missing account is `Unauthorized`, a suspended one `Forbidden`.
pub async fn load_live_identity(
    users: &dyn UserStore,
    user_id: &str,
) -> Result<LiveIdentity, AppError> {
    let user = users.find_by_id(user_id).await?.ok_or_else(|| {
        tracing::warn!(user_id = %user_id, "Token subject no longer exists");
        AppError::Unauthorized(anyhow::anyhow!("Account no longer exists"))
    })?;

    if user.suspended {
        tracing::warn!(user_id = %user_id, "Suspended account rejected");
        return Err(AppError::Forbidden(anyhow::anyhow!("Account is suspended")));
    }

    Ok(LiveIdentity {
        role: user.role,
        suspended: user.suspended,
    })
}

/// Require a valid bearer token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = {
        let token = bearer_token(&req).ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

        state.tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            e
        })?
    };

    let live = if state.config.auth.live_check_all_routes {
        Some(load_live_identity(state.users.as_ref(), &claims.sub).await?)
    } else {
        None
    };

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        live,
    });

    Ok(next.run(req).await)
}

/// Require a live, unsuspended admin account. Must run after [`auth_middleware`].
pub async fn admin_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = req
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

    let live = match ctx.live {
        Some(live) => live,
        None => load_live_identity(state.users.as_ref(), &ctx.user_id).await?,
    };

    if live.role != Role::Admin {
        tracing::warn!(user_id = %ctx.user_id, "Non-admin rejected from admin route");
        return Err(AppError::Forbidden(anyhow::anyhow!("Admin access required")));
    }

    req.extensions_mut().insert(AuthContext {
        user_id: ctx.user_id,
        live: Some(live),
    });

    Ok(next.run(req).await)
}

/// Extractor for the authenticated caller.
pub struct AuthUser(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))
    }
}

/// Extractor for a caller that passed [`admin_middleware`].
pub struct AdminUser(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(ctx) = AuthUser::from_request_parts(parts, state).await?;
        if !ctx.is_live_admin() {
            return Err(AppError::Forbidden(anyhow::anyhow!("Admin access required")));
        }
        Ok(AdminUser(ctx))
    }
}

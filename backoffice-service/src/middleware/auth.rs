//! Bearer authentication and tenant context resolution.
//!
//! `auth_middleware` validates the access token and stores its claims in the
//! request extensions. Handlers then take either [`AuthUser`] (any
//! authenticated caller) or [`TenantContext`] (caller acting inside exactly
//! one organization).

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::domain::{Permission, Role};
use crate::services::AccessTokenClaims;
use crate::AppState;

/// Header a super-admin uses to pick the organization it acts on.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Middleware to require a valid bearer token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())?;
    let claims = state.jwt.validate_access_token(token)?;

    // Store claims in request extensions so extractors can access them
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })
}

/// Claims of the authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AccessTokenClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<AccessTokenClaims>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

        tracing::Span::current().record("user_id", tracing::field::display(claims.sub));

        Ok(AuthUser(claims))
    }
}

/// Organization, user and role every tenant-scoped operation runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

impl TenantContext {
    /// Resolve the acting organization from token claims and the optional
    /// organization header.
    ///
    /// Regular users always act on the organization in their token and may
    /// not name another one. Super-admins act on the header organization,
    /// falling back to their own.
    pub fn resolve(
        claims: &AccessTokenClaims,
        requested: Option<&str>,
    ) -> Result<Self, AppError> {
        let requested = requested
            .map(|raw| {
                Uuid::parse_str(raw.trim()).map_err(|_| {
                    AppError::BadRequest(anyhow::anyhow!("Invalid {} header", ORGANIZATION_HEADER))
                })
            })
            .transpose()?;

        let organization_id = if claims.role.is_super_admin() {
            requested.or(claims.org).ok_or_else(|| {
                AppError::Forbidden(anyhow::anyhow!(
                    "Super-admin must select an organization via {}",
                    ORGANIZATION_HEADER
                ))
            })?
        } else {
            let own = claims.org.ok_or_else(|| {
                AppError::Forbidden(anyhow::anyhow!("User does not belong to an organization"))
            })?;
            if requested.is_some_and(|org| org != own) {
                return Err(AppError::Forbidden(anyhow::anyhow!(
                    "Cannot act on another organization"
                )));
            }
            own
        };

        Ok(Self {
            organization_id,
            user_id: claims.sub,
            role: claims.role,
        })
    }

    /// Deny unless the role holds every permission in `required`.
    pub fn require(&self, required: &[Permission]) -> Result<(), AppError> {
        require_permissions(self.role, required)
    }
}

pub fn require_permissions(role: Role, required: &[Permission]) -> Result<(), AppError> {
    match role.missing(required) {
        None => Ok(()),
        Some(permission) => Err(AppError::Forbidden(anyhow::anyhow!(
            "Missing permission {}",
            permission
        ))),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        let requested = parts
            .headers
            .get(ORGANIZATION_HEADER)
            .map(|value| {
                value.to_str().map_err(|_| {
                    AppError::BadRequest(anyhow::anyhow!("Invalid {} header", ORGANIZATION_HEADER))
                })
            })
            .transpose()?;

        let tenant = TenantContext::resolve(&claims, requested)?;

        // Add to tracing span for observability
        tracing::Span::current().record(
            "organization_id",
            tracing::field::display(tenant.organization_id),
        );

        Ok(tenant)
    }
}

pub mod auth;
pub mod metrics;

pub use auth::{auth_middleware, AuthUser, TenantContext, ORGANIZATION_HEADER};
pub use metrics::http_metrics_middleware;

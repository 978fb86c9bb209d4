//! Services module for backoffice-service.

pub mod database;
mod documents;
mod invoices;
pub mod jwt;
pub mod metrics;
mod orders;
mod quotations;
mod tenants;
mod tickets;

pub use database::Database;
pub use jwt::{AccessTokenClaims, JwtService};
pub use metrics::{get_metrics, init_metrics};
pub use tenants::ClearedRows;

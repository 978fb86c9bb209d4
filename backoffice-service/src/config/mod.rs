//! Configuration for backoffice-service.

use crate::domain::{ApprovalPolicy, Currency};
use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::config::{self as core_config, get_env, parse_env};
use service_core::error::AppError;

#[derive(Debug, Clone)]
pub struct BackofficeConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub issuer: String,
    pub access_token_expiry_minutes: i64,
}

/// Business policy knobs.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Tax rate (percent) applied when a document does not specify one.
    pub default_tax_rate: Decimal,
    pub default_currency: Currency,
    /// Days a new quotation stays valid when `valid_until` is omitted.
    pub quotation_validity_days: i64,
    pub allow_self_approval: bool,
    pub enforce_plan_limits: bool,
}

impl PolicyConfig {
    pub fn approval_policy(&self) -> ApprovalPolicy {
        if self.allow_self_approval {
            ApprovalPolicy::AllowSelfApproval
        } else {
            ApprovalPolicy::DistinctApprover
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_tax_rate: Decimal::from(11),
            default_currency: Currency::Idr,
            quotation_validity_days: 30,
            allow_self_approval: false,
            enforce_plan_limits: true,
        }
    }
}

impl BackofficeConfig {
    pub fn load() -> Result<Self, AppError> {
        // Handles .env, the optional configuration file and APP__ overrides
        let common = core_config::Config::load()?;
        let is_prod = common.is_prod();
        let defaults = PolicyConfig::default();

        let default_currency = get_env("DEFAULT_CURRENCY", Some("IDR"), false)?
            .parse::<Currency>()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        Ok(BackofficeConfig {
            service_name: get_env("SERVICE_NAME", Some("backoffice-service"), false)?,
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: get_env("LOG_LEVEL", Some("info,backoffice_service=debug"), false)?,
            otlp_endpoint: std::env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(get_env(
                    "JWT_SECRET",
                    Some("dev-only-insecure-secret"),
                    is_prod,
                )?),
                issuer: get_env("JWT_ISSUER", Some("backoffice"), false)?,
                access_token_expiry_minutes: parse_env("ACCESS_TOKEN_EXPIRY_MINUTES", 60)?,
            },
            policy: PolicyConfig {
                default_tax_rate: parse_env("DEFAULT_TAX_RATE", defaults.default_tax_rate)?,
                default_currency,
                quotation_validity_days: parse_env(
                    "QUOTATION_VALIDITY_DAYS",
                    defaults.quotation_validity_days,
                )?,
                allow_self_approval: parse_env(
                    "ALLOW_SELF_APPROVAL",
                    defaults.allow_self_approval,
                )?,
                enforce_plan_limits: parse_env(
                    "ENFORCE_PLAN_LIMITS",
                    defaults.enforce_plan_limits,
                )?,
            },
            common,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_uses_eleven_percent_and_distinct_approver() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.default_tax_rate, Decimal::from(11));
        assert_eq!(policy.approval_policy(), ApprovalPolicy::DistinctApprover);
        assert!(policy.enforce_plan_limits);
    }
}

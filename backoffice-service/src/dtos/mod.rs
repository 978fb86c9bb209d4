//! Request and response bodies of the HTTP API.

mod documents;
mod tenants;
mod tickets;

pub use documents::*;
pub use tenants::*;
pub use tickets::*;

use rust_decimal::Decimal;
use serde::Deserialize;
use std::borrow::Cow;
use uuid::Uuid;
use validator::ValidationError;

/// Query string accepted by list endpoints. Filters a route does not
/// understand are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

pub(crate) fn positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut error = ValidationError::new("positive");
        error.message = Some(Cow::Borrowed("must be greater than zero"));
        Err(error)
    }
}

pub(crate) fn slug(value: &str) -> Result<(), ValidationError> {
    let valid = !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("slug");
        error.message = Some(Cow::Borrowed(
            "use lowercase letters, digits and inner hyphens only",
        ));
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn slug_accepts_kebab_case_only() {
        assert!(slug("acme-corp-2").is_ok());
        assert!(slug("Acme").is_err());
        assert!(slug("-acme").is_err());
        assert!(slug("acme corp").is_err());
    }

    #[test]
    fn positive_decimal_rejects_zero() {
        assert!(positive_decimal(&dec!(0.01)).is_ok());
        assert!(positive_decimal(&dec!(0)).is_err());
        assert!(positive_decimal(&dec!(-1)).is_err());
    }
}

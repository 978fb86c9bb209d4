//! HTTP handlers for backoffice-service.

pub mod clients;
pub mod health;
pub mod invoices;
pub mod me;
pub mod orders;
pub mod organizations;
pub mod projects;
pub mod quotations;
pub mod tickets;
pub mod users;

pub use health::{health_check, metrics_endpoint, readiness_check};

use crate::domain::{Currency, Rates, TransitionError};
use crate::dtos::ListQuery;
use crate::models::PageRequest;
use crate::startup::AppState;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::str::FromStr;

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) fn page_request(
    query: &ListQuery,
    sortable: &[&'static str],
) -> Result<PageRequest, AppError> {
    PageRequest::new(
        query.page,
        query.limit,
        query.sort_by.as_deref(),
        query.sort_order.as_deref(),
        sortable,
    )
}

/// Parse an optional status filter or body field.
pub(crate) fn parse_status<T>(raw: Option<&str>) -> Result<Option<T>, AppError>
where
    T: FromStr<Err = TransitionError>,
{
    raw.map(str::parse::<T>)
        .transpose()
        .map_err(AppError::from)
}

pub(crate) fn currency_or_default(
    state: &AppState,
    code: Option<&str>,
) -> Result<Currency, AppError> {
    match code {
        Some(code) => Ok(code.parse()?),
        None => Ok(state.config.policy.default_currency),
    }
}

/// Document rates with the configured default tax rate and no discount.
pub(crate) fn rates_or_default(
    state: &AppState,
    tax_rate: Option<Decimal>,
    discount_percentage: Option<Decimal>,
) -> Result<Rates, AppError> {
    Ok(Rates::new(
        tax_rate.unwrap_or(state.config.policy.default_tax_rate),
        discount_percentage.unwrap_or(Decimal::ZERO),
    )?)
}

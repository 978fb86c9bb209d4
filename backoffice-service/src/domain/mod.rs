//! Business rules that do not touch the database.

pub mod access;
pub mod lifecycle;
pub mod money;

pub use access::{Permission, Role};
pub use lifecycle::{
    ApprovalPolicy, InvoiceStatus, OrderStatus, ProjectStatus, QuotationStatus, TicketStatus,
    TransitionError,
};
pub use money::{compute_totals, Currency, LineAmount, MoneyError, Rates, Totals};

use service_core::error::AppError;

impl From<MoneyError> for AppError {
    fn from(err: MoneyError) -> Self {
        let message = err.to_string();
        match err {
            MoneyError::NonPositiveQuantity { .. } => {
                AppError::validation("items", "non_positive_quantity", message)
            }
            MoneyError::NonPositiveUnitPrice { .. } => {
                AppError::validation("items", "non_positive_unit_price", message)
            }
            MoneyError::RateOutOfRange { field, .. } => {
                AppError::validation(field, "range", message)
            }
            MoneyError::UnsupportedCurrency(_) => {
                AppError::validation("currency", "unsupported", message)
            }
            MoneyError::Overflow(_) => AppError::BadRequest(anyhow::anyhow!(message)),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        let message = err.to_string();
        match err {
            TransitionError::InvalidTransition { .. } | TransitionError::Expired(_) => {
                AppError::Conflict(anyhow::anyhow!(message))
            }
            TransitionError::MissingItems => AppError::validation("items", "required", message),
            TransitionError::MissingApprover => {
                AppError::validation("approver_id", "required", message)
            }
            TransitionError::MissingReason => AppError::validation("reason", "required", message),
            TransitionError::UnresolvedReference => AppError::BadRequest(anyhow::anyhow!(message)),
            TransitionError::SelfApproval => AppError::Forbidden(anyhow::anyhow!(message)),
            TransitionError::UnknownStatus { .. } => {
                AppError::validation("status", "unknown", message)
            }
        }
    }
}

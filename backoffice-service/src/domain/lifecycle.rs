//! Status state machines for quotations, orders, invoices and tickets.
//!
//! Transitions are pure functions of the current state and the facts the
//! caller gathered inside its transaction; persistence applies the returned
//! state with a guarded `UPDATE ... WHERE status = <current>`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("quotation has no line items")]
    MissingItems,

    #[error("quotation references a client or project outside the organization")]
    UnresolvedReference,

    #[error("an approver identity is required")]
    MissingApprover,

    #[error("the creator of a quotation cannot approve it")]
    SelfApproval,

    #[error("a rejection reason is required")]
    MissingReason,

    #[error("quotation expired on {0}")]
    Expired(NaiveDate),

    #[error("unknown {entity} status '{value}'")]
    UnknownStatus { entity: &'static str, value: String },
}

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $entity:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TransitionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(TransitionError::UnknownStatus {
                        entity: $entity,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

status_enum! {
    /// Quotation status.
    QuotationStatus, "quotation" {
        Draft => "draft",
        Sent => "sent",
        Approved => "approved",
        Rejected => "rejected",
        Expired => "expired",
    }
}

status_enum! {
    /// Order status.
    OrderStatus, "order" {
        Pending => "pending",
        Confirmed => "confirmed",
        Processing => "processing",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

status_enum! {
    /// Invoice status.
    InvoiceStatus, "invoice" {
        Draft => "draft",
        Sent => "sent",
        Paid => "paid",
        Overdue => "overdue",
        Cancelled => "cancelled",
    }
}

status_enum! {
    /// Ticket status.
    TicketStatus, "ticket" {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
}

status_enum! {
    /// Project status. Free-form moves between any two states.
    ProjectStatus, "project" {
        Planning => "planning",
        Active => "active",
        OnHold => "on_hold",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

fn invalid(entity: &'static str, from: impl fmt::Display, to: impl fmt::Display) -> TransitionError {
    TransitionError::InvalidTransition {
        entity,
        from: from.to_string(),
        to: to.to_string(),
    }
}

// -----------------------------------------------------------------------------
// Quotation
// -----------------------------------------------------------------------------

/// Whether the creator of a quotation may approve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    DistinctApprover,
    AllowSelfApproval,
}

impl QuotationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuotationStatus::Approved | QuotationStatus::Rejected | QuotationStatus::Expired
        )
    }

    /// Items, rates and references may only change while drafting.
    pub fn is_editable(&self) -> bool {
        *self == QuotationStatus::Draft
    }
}

/// `draft → sent`.
pub fn send_quotation(
    current: QuotationStatus,
    item_count: usize,
    references_resolved: bool,
) -> Result<QuotationStatus, TransitionError> {
    if current != QuotationStatus::Draft {
        return Err(invalid("quotation", current, QuotationStatus::Sent));
    }
    if item_count == 0 {
        return Err(TransitionError::MissingItems);
    }
    if !references_resolved {
        return Err(TransitionError::UnresolvedReference);
    }
    Ok(QuotationStatus::Sent)
}

/// `sent → approved`.
pub fn approve_quotation(
    current: QuotationStatus,
    approver: Option<Uuid>,
    created_by: Uuid,
    policy: ApprovalPolicy,
) -> Result<QuotationStatus, TransitionError> {
    if current != QuotationStatus::Sent {
        return Err(invalid("quotation", current, QuotationStatus::Approved));
    }
    let approver = approver.ok_or(TransitionError::MissingApprover)?;
    if approver == created_by && policy == ApprovalPolicy::DistinctApprover {
        return Err(TransitionError::SelfApproval);
    }
    Ok(QuotationStatus::Approved)
}

/// `sent → rejected`.
pub fn reject_quotation(
    current: QuotationStatus,
    reason: Option<&str>,
) -> Result<QuotationStatus, TransitionError> {
    if current != QuotationStatus::Sent {
        return Err(invalid("quotation", current, QuotationStatus::Rejected));
    }
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(QuotationStatus::Rejected),
        _ => Err(TransitionError::MissingReason),
    }
}

/// System-driven expiry: a non-terminal quotation whose `valid_until` lies
/// strictly before `today` becomes expired.
pub fn expire_quotation(
    current: QuotationStatus,
    valid_until: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<QuotationStatus> {
    match valid_until {
        Some(deadline) if !current.is_terminal() && today > deadline => {
            Some(QuotationStatus::Expired)
        }
        _ => None,
    }
}

/// Only approved quotations turn into orders or invoices.
pub fn ensure_convertible(current: QuotationStatus) -> Result<(), TransitionError> {
    if current != QuotationStatus::Approved {
        return Err(TransitionError::InvalidTransition {
            entity: "quotation",
            from: current.to_string(),
            to: "converted".to_string(),
        });
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Order / Invoice / Ticket
// -----------------------------------------------------------------------------

impl OrderStatus {
    pub fn allowed_targets(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    /// Items may only change before the order is confirmed.
    pub fn is_editable(&self) -> bool {
        *self == OrderStatus::Pending
    }

    pub fn is_invoiceable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Completed
        )
    }
}

impl InvoiceStatus {
    pub fn allowed_targets(&self) -> &'static [InvoiceStatus] {
        use InvoiceStatus::*;
        match self {
            Draft => &[Sent, Cancelled],
            Sent => &[Paid, Overdue, Cancelled],
            Overdue => &[Paid, Cancelled],
            Paid | Cancelled => &[],
        }
    }

    pub fn is_editable(&self) -> bool {
        *self == InvoiceStatus::Draft
    }
}

impl TicketStatus {
    pub fn allowed_targets(&self) -> &'static [TicketStatus] {
        use TicketStatus::*;
        match self {
            Open => &[InProgress, Closed],
            InProgress => &[Resolved, Closed],
            Resolved => &[Closed, Open],
            Closed => &[Open],
        }
    }
}

pub fn transition_order(
    current: OrderStatus,
    target: OrderStatus,
) -> Result<OrderStatus, TransitionError> {
    if current.allowed_targets().contains(&target) {
        Ok(target)
    } else {
        Err(invalid("order", current, target))
    }
}

pub fn transition_invoice(
    current: InvoiceStatus,
    target: InvoiceStatus,
) -> Result<InvoiceStatus, TransitionError> {
    if current.allowed_targets().contains(&target) {
        Ok(target)
    } else {
        Err(invalid("invoice", current, target))
    }
}

pub fn transition_ticket(
    current: TicketStatus,
    target: TicketStatus,
) -> Result<TicketStatus, TransitionError> {
    if current.allowed_targets().contains(&target) {
        Ok(target)
    } else {
        Err(invalid("ticket", current, target))
    }
}

//! Roles and the statically declared permission set of each role.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of roles a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Staff,
    Viewer,
}

/// Permission keys checked by handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    OrganizationRead,
    OrganizationManage,
    UserRead,
    UserManage,
    ClientRead,
    ClientWrite,
    ProjectRead,
    ProjectWrite,
    QuotationRead,
    QuotationWrite,
    QuotationApprove,
    OrderRead,
    OrderWrite,
    InvoiceRead,
    InvoiceWrite,
    TicketRead,
    TicketWrite,
}

impl Permission {
    pub fn key(&self) -> &'static str {
        match self {
            Permission::OrganizationRead => "backoffice.organization:read",
            Permission::OrganizationManage => "backoffice.organization:manage",
            Permission::UserRead => "backoffice.user:read",
            Permission::UserManage => "backoffice.user:manage",
            Permission::ClientRead => "backoffice.client:read",
            Permission::ClientWrite => "backoffice.client:write",
            Permission::ProjectRead => "backoffice.project:read",
            Permission::ProjectWrite => "backoffice.project:write",
            Permission::QuotationRead => "backoffice.quotation:read",
            Permission::QuotationWrite => "backoffice.quotation:write",
            Permission::QuotationApprove => "backoffice.quotation:approve",
            Permission::OrderRead => "backoffice.order:read",
            Permission::OrderWrite => "backoffice.order:write",
            Permission::InvoiceRead => "backoffice.invoice:read",
            Permission::InvoiceWrite => "backoffice.invoice:write",
            Permission::TicketRead => "backoffice.ticket:read",
            Permission::TicketWrite => "backoffice.ticket:write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

use Permission::*;

const ALL: &[Permission] = &[
    OrganizationRead,
    OrganizationManage,
    UserRead,
    UserManage,
    ClientRead,
    ClientWrite,
    ProjectRead,
    ProjectWrite,
    QuotationRead,
    QuotationWrite,
    QuotationApprove,
    OrderRead,
    OrderWrite,
    InvoiceRead,
    InvoiceWrite,
    TicketRead,
    TicketWrite,
];

const ADMIN: &[Permission] = &[
    OrganizationRead,
    UserRead,
    UserManage,
    ClientRead,
    ClientWrite,
    ProjectRead,
    ProjectWrite,
    QuotationRead,
    QuotationWrite,
    QuotationApprove,
    OrderRead,
    OrderWrite,
    InvoiceRead,
    InvoiceWrite,
    TicketRead,
    TicketWrite,
];

const MANAGER: &[Permission] = &[
    OrganizationRead,
    UserRead,
    ClientRead,
    ClientWrite,
    ProjectRead,
    ProjectWrite,
    QuotationRead,
    QuotationWrite,
    QuotationApprove,
    OrderRead,
    OrderWrite,
    InvoiceRead,
    InvoiceWrite,
    TicketRead,
    TicketWrite,
];

const STAFF: &[Permission] = &[
    OrganizationRead,
    UserRead,
    ClientRead,
    ClientWrite,
    ProjectRead,
    ProjectWrite,
    QuotationRead,
    QuotationWrite,
    OrderRead,
    InvoiceRead,
    TicketRead,
    TicketWrite,
];

const VIEWER: &[Permission] = &[
    OrganizationRead,
    ClientRead,
    ProjectRead,
    QuotationRead,
    OrderRead,
    InvoiceRead,
    TicketRead,
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Viewer => "viewer",
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::SuperAdmin => ALL,
            Role::Admin => ADMIN,
            Role::Manager => MANAGER,
            Role::Staff => STAFF,
            Role::Viewer => VIEWER,
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// First permission in `required` this role lacks, if any.
    pub fn missing(&self, required: &[Permission]) -> Option<Permission> {
        required.iter().copied().find(|p| !self.has(*p))
    }

    pub fn is_super_admin(&self) -> bool {
        *self == Role::SuperAdmin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "staff" => Ok(Role::Staff),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

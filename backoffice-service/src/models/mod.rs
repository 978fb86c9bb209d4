//! Persistent entities and the inputs used to create or change them.

mod client;
mod document;
mod invoice;
mod order;
mod organization;
mod pagination;
mod project;
mod quotation;
mod ticket;
mod user;

pub use client::{Client, CreateClient, UpdateClient};
pub use document::{DocumentDetail, DocumentKind, FinancialDocument, LineItem, NewLineItem};
pub use invoice::{CreateInvoice, Invoice, InvoiceFilter};
pub use order::{CreateOrder, Order, OrderFilter};
pub use organization::{CreateOrganization, Organization, PlanLimit, UpdateOrganization};
pub use pagination::{PageRequest, Paginated, PaginationMeta, SortOrder};
pub use project::{CreateProject, Project, UpdateProject};
pub use quotation::{CreateQuotation, Quotation, QuotationFilter, UpdateQuotation};
pub use ticket::{CreateTicket, Ticket, TicketFilter, TicketPriority, UpdateTicket};
pub use user::{CreateUser, UpdateUser, User};

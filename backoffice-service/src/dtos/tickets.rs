use crate::models::TicketPriority;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Subject is required"))]
    pub subject: String,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub assigned_to: Option<Uuid>,
}

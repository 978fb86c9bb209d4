//! Organization (tenant root) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub plan: String,
    /// `None` means unlimited.
    pub max_users: Option<i32>,
    pub max_projects: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateOrganization {
    pub name: String,
    pub slug: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub plan: String,
    pub max_users: Option<i32>,
    pub max_projects: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub plan: Option<String>,
    pub max_users: Option<i32>,
    pub max_projects: Option<i32>,
    pub is_active: Option<bool>,
}

/// Which plan limit a creation would exceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanLimit {
    Users,
    Projects,
}

impl PlanLimit {
    pub fn label(&self) -> &'static str {
        match self {
            PlanLimit::Users => "user",
            PlanLimit::Projects => "project",
        }
    }
}

impl Organization {
    pub fn limit(&self, limit: PlanLimit) -> Option<i32> {
        match limit {
            PlanLimit::Users => self.max_users,
            PlanLimit::Projects => self.max_projects,
        }
    }

    /// Whether one more row may be created given `current` existing rows.
    pub fn allows_another(&self, limit: PlanLimit, current: i64) -> bool {
        match self.limit(limit) {
            Some(max) => current < i64::from(max),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(max_projects: Option<i32>) -> Organization {
        Organization {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            slug: "acme".to_string(),
            email: None,
            phone: None,
            address: None,
            plan: "basic".to_string(),
            max_users: Some(5),
            max_projects,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn eleventh_project_blocked_at_limit_of_ten() {
        let org = org(Some(10));
        assert!(org.allows_another(PlanLimit::Projects, 9));
        assert!(!org.allows_another(PlanLimit::Projects, 10));
    }

    #[test]
    fn missing_limit_is_unlimited() {
        assert!(org(None).allows_another(PlanLimit::Projects, 10_000));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Driver,
    Dispatcher,
    Manager,
    Admin,
}

text_enum!(Role {
    Customer => "customer",
    Driver => "driver",
    Dispatcher => "dispatcher",
    Manager => "manager",
    Admin => "admin",
});

impl Role {
    /// Dispatchers, managers and admins plan routes and triage issues.
    pub fn is_planner(&self) -> bool {
        matches!(self, Role::Dispatcher | Role::Manager | Role::Admin)
    }

    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

/// The account a shipment is billed to. Customers log in as `user_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(user_id: Uuid, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub home_region: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(user_id: Uuid, name: &str, home_region: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            phone: None,
            home_region: home_region.to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub plate: String,
    pub capacity_kg: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(plate: &str, capacity_kg: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate: plate.to_string(),
            capacity_kg,
            active: true,
            created_at: Utc::now(),
        }
    }
}

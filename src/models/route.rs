use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

text_enum!(RouteStatus {
    Planned => "planned",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// One driver and vehicle working one region on one day.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub code: String,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub region: String,
    pub route_date: NaiveDate,
    pub status: RouteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn new(code: &str, driver_id: Uuid, vehicle_id: Uuid, region: &str, route_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.to_string(),
            driver_id,
            vehicle_id,
            region: region.to_string(),
            route_date,
            status: RouteStatus::Planned,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Pending,
    Arrived,
    Completed,
    Failed,
    Skipped,
}

text_enum!(StopStatus {
    Pending => "pending",
    Arrived => "arrived",
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
});

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub shipment_id: Uuid,
    /// 1-based position, unique within the route.
    pub sequence: i32,
    pub planned_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub status: StopStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RouteStop {
    pub fn new(route_id: Uuid, shipment_id: Uuid, sequence: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            route_id,
            shipment_id,
            sequence,
            planned_arrival: None,
            actual_arrival: None,
            status: StopStatus::Pending,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWithStops {
    #[serde(flatten)]
    pub route: Route,
    pub stops: Vec<RouteStop>,
}

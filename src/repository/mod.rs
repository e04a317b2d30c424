pub mod memory;
pub mod postgres;
pub mod scope;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::escalation::{EscalationContact, EscalationLog};
use crate::models::fleet::{Driver, Vehicle};
use crate::models::issue::{DeliveryIssue, IssueStatus};
use crate::models::metric::{MetricDefinition, MetricSnapshot, TimeWindow};
use crate::models::route::{Route, RouteStop};
use crate::models::shipment::{Shipment, ShipmentScan, ShipmentStatus};
use crate::models::user::Customer;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// `None` on a field means "don't filter"; `Some(vec![])` matches nothing.
#[derive(Clone, Debug, Default)]
pub struct ShipmentFilter {
    pub ids: Option<Vec<Uuid>>,
    pub customer_id: Option<Uuid>,
    pub statuses: Option<Vec<ShipmentStatus>>,
    /// Applied to `updated_at`.
    pub updated: TimeWindow,
}

impl ShipmentFilter {
    pub fn matches(&self, shipment: &Shipment) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&shipment.id))
            && self.customer_id.map_or(true, |c| c == shipment.customer_id)
            && self
                .statuses
                .as_ref()
                .map_or(true, |s| s.contains(&shipment.status))
            && self.updated.contains(shipment.updated_at)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScanFilter {
    pub shipment_ids: Option<Vec<Uuid>>,
    /// Applied to `scanned_at`.
    pub scanned: TimeWindow,
}

impl ScanFilter {
    pub fn for_shipment(shipment_id: Uuid) -> Self {
        Self {
            shipment_ids: Some(vec![shipment_id]),
            scanned: TimeWindow::default(),
        }
    }

    pub fn matches(&self, scan: &ShipmentScan) -> bool {
        self.shipment_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&scan.shipment_id))
            && self.scanned.contains(scan.scanned_at)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RouteFilter {
    pub driver_id: Option<Uuid>,
    pub region: Option<String>,
    pub route_date: Option<NaiveDate>,
}

impl RouteFilter {
    pub fn matches(&self, route: &Route) -> bool {
        self.driver_id.map_or(true, |d| d == route.driver_id)
            && self.region.as_ref().map_or(true, |r| *r == route.region)
            && self.route_date.map_or(true, |d| d == route.route_date)
    }
}

#[derive(Clone, Debug, Default)]
pub struct IssueFilter {
    pub shipment_ids: Option<Vec<Uuid>>,
    pub statuses: Option<Vec<IssueStatus>>,
    /// Applied to `created_at`.
    pub created: TimeWindow,
}

impl IssueFilter {
    pub fn matches(&self, issue: &DeliveryIssue) -> bool {
        self.shipment_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&issue.shipment_id))
            && self
                .statuses
                .as_ref()
                .map_or(true, |s| s.contains(&issue.status))
            && self.created.contains(issue.created_at)
    }
}

/// Persistence seam. Implementations return rows in the documented order;
/// uniqueness rules are checked by the services before writing.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;
    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>>;
    async fn customer_for_user(&self, user_id: Uuid) -> Result<Option<Customer>>;

    async fn insert_driver(&self, driver: &Driver) -> Result<()>;
    async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>>;
    async fn driver_for_user(&self, user_id: Uuid) -> Result<Option<Driver>>;
    /// Ordered by name.
    async fn list_drivers(&self) -> Result<Vec<Driver>>;

    async fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<()>;
    async fn get_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>>;
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>>;
    /// Ordered by plate.
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>>;

    async fn insert_shipment(&self, shipment: &Shipment) -> Result<()>;
    async fn get_shipment(&self, id: Uuid) -> Result<Option<Shipment>>;
    async fn find_shipment_by_tracking(&self, tracking_id: &str) -> Result<Option<Shipment>>;
    async fn update_shipment(&self, shipment: &Shipment) -> Result<()>;
    /// Newest first.
    async fn list_shipments(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>>;

    async fn insert_scan(&self, scan: &ShipmentScan) -> Result<()>;
    /// Ordered by `scanned_at`.
    async fn list_scans(&self, filter: &ScanFilter) -> Result<Vec<ShipmentScan>>;

    async fn insert_route(&self, route: &Route) -> Result<()>;
    async fn get_route(&self, id: Uuid) -> Result<Option<Route>>;
    async fn find_route_by_code(&self, code: &str) -> Result<Option<Route>>;
    async fn update_route(&self, route: &Route) -> Result<()>;
    /// Ordered by date, then code.
    async fn list_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>>;
    /// Sorted, deduplicated.
    async fn distinct_regions(&self) -> Result<Vec<String>>;

    async fn insert_stop(&self, stop: &RouteStop) -> Result<()>;
    async fn get_stop(&self, id: Uuid) -> Result<Option<RouteStop>>;
    async fn update_stop(&self, stop: &RouteStop) -> Result<()>;
    /// Ordered by route, then sequence.
    async fn list_stops(&self, route_ids: &[Uuid]) -> Result<Vec<RouteStop>>;

    async fn insert_issue(&self, issue: &DeliveryIssue) -> Result<()>;
    async fn get_issue(&self, id: Uuid) -> Result<Option<DeliveryIssue>>;
    async fn update_issue(&self, issue: &DeliveryIssue) -> Result<()>;
    /// Newest first.
    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<DeliveryIssue>>;

    async fn insert_contact(&self, contact: &EscalationContact) -> Result<()>;
    async fn get_contact(&self, id: Uuid) -> Result<Option<EscalationContact>>;
    async fn update_contact(&self, contact: &EscalationContact) -> Result<()>;
    /// Ladder order: ascending timeout, then creation time.
    async fn list_contacts(&self, active_only: bool) -> Result<Vec<EscalationContact>>;

    async fn insert_escalation_log(&self, log: &EscalationLog) -> Result<()>;
    async fn update_escalation_log(&self, log: &EscalationLog) -> Result<()>;
    /// Ordered by attempt, then creation time.
    async fn list_escalation_logs(&self, issue_id: Uuid) -> Result<Vec<EscalationLog>>;

    async fn insert_metric_definition(&self, definition: &MetricDefinition) -> Result<()>;
    async fn get_metric_definition(&self, id: Uuid) -> Result<Option<MetricDefinition>>;
    async fn find_metric_definition_by_key(&self, key: &str) -> Result<Option<MetricDefinition>>;
    /// Ordered by key.
    async fn list_metric_definitions(&self) -> Result<Vec<MetricDefinition>>;
    async fn insert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<()>;
    /// Newest first.
    async fn list_metric_snapshots(&self, metric_id: Uuid) -> Result<Vec<MetricSnapshot>>;

    /// Liveness check used by `/health`.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

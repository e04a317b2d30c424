use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::{IssueFilter, RouteFilter, ScanFilter, ShipmentFilter, Store};
use crate::models::escalation::{order_ladder, EscalationContact, EscalationLog};
use crate::models::fleet::{Driver, Vehicle};
use crate::models::issue::DeliveryIssue;
use crate::models::metric::{MetricDefinition, MetricSnapshot};
use crate::models::route::{Route, RouteStop};
use crate::models::shipment::{Shipment, ShipmentScan};
use crate::models::user::Customer;

#[derive(Default)]
struct Tables {
    customers: HashMap<Uuid, Customer>,
    drivers: HashMap<Uuid, Driver>,
    vehicles: HashMap<Uuid, Vehicle>,
    shipments: HashMap<Uuid, Shipment>,
    scans: Vec<ShipmentScan>,
    routes: HashMap<Uuid, Route>,
    stops: HashMap<Uuid, RouteStop>,
    issues: HashMap<Uuid, DeliveryIssue>,
    contacts: HashMap<Uuid, EscalationContact>,
    escalation_logs: HashMap<Uuid, EscalationLog>,
    metric_definitions: HashMap<Uuid, MetricDefinition>,
    metric_snapshots: Vec<MetricSnapshot>,
}

/// Process-local store for tests and database-less runs. Every call takes
/// the lock once and never holds it across an await.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn update_existing<T: Clone>(map: &mut HashMap<Uuid, T>, id: Uuid, value: &T, what: &str) -> Result<()> {
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(anyhow::anyhow!("{} {} does not exist", what, id)),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.tables.write().customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.tables.read().customers.get(&id).cloned())
    }

    async fn customer_for_user(&self, user_id: Uuid) -> Result<Option<Customer>> {
        Ok(self
            .tables
            .read()
            .customers
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<()> {
        self.tables.write().drivers.insert(driver.id, driver.clone());
        Ok(())
    }

    async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>> {
        Ok(self.tables.read().drivers.get(&id).cloned())
    }

    async fn driver_for_user(&self, user_id: Uuid) -> Result<Option<Driver>> {
        Ok(self
            .tables
            .read()
            .drivers
            .values()
            .find(|d| d.user_id == user_id)
            .cloned())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>> {
        let mut drivers: Vec<_> = self.tables.read().drivers.values().cloned().collect();
        drivers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(drivers)
    }

    async fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        self.tables.write().vehicles.insert(vehicle.id, vehicle.clone());
        Ok(())
    }

    async fn get_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>> {
        Ok(self.tables.read().vehicles.get(&id).cloned())
    }

    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>> {
        Ok(self
            .tables
            .read()
            .vehicles
            .values()
            .find(|v| v.plate == plate)
            .cloned())
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        let mut vehicles: Vec<_> = self.tables.read().vehicles.values().cloned().collect();
        vehicles.sort_by(|a, b| a.plate.cmp(&b.plate));
        Ok(vehicles)
    }

    async fn insert_shipment(&self, shipment: &Shipment) -> Result<()> {
        self.tables.write().shipments.insert(shipment.id, shipment.clone());
        Ok(())
    }

    async fn get_shipment(&self, id: Uuid) -> Result<Option<Shipment>> {
        Ok(self.tables.read().shipments.get(&id).cloned())
    }

    async fn find_shipment_by_tracking(&self, tracking_id: &str) -> Result<Option<Shipment>> {
        Ok(self
            .tables
            .read()
            .shipments
            .values()
            .find(|s| s.tracking_id == tracking_id)
            .cloned())
    }

    async fn update_shipment(&self, shipment: &Shipment) -> Result<()> {
        update_existing(&mut self.tables.write().shipments, shipment.id, shipment, "shipment")
    }

    async fn list_shipments(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>> {
        let mut shipments: Vec<_> = self
            .tables
            .read()
            .shipments
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        shipments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shipments)
    }

    async fn insert_scan(&self, scan: &ShipmentScan) -> Result<()> {
        self.tables.write().scans.push(scan.clone());
        Ok(())
    }

    async fn list_scans(&self, filter: &ScanFilter) -> Result<Vec<ShipmentScan>> {
        let mut scans: Vec<_> = self
            .tables
            .read()
            .scans
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        scans.sort_by_key(|s| s.scanned_at);
        Ok(scans)
    }

    async fn insert_route(&self, route: &Route) -> Result<()> {
        self.tables.write().routes.insert(route.id, route.clone());
        Ok(())
    }

    async fn get_route(&self, id: Uuid) -> Result<Option<Route>> {
        Ok(self.tables.read().routes.get(&id).cloned())
    }

    async fn find_route_by_code(&self, code: &str) -> Result<Option<Route>> {
        Ok(self
            .tables
            .read()
            .routes
            .values()
            .find(|r| r.code == code)
            .cloned())
    }

    async fn update_route(&self, route: &Route) -> Result<()> {
        update_existing(&mut self.tables.write().routes, route.id, route, "route")
    }

    async fn list_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>> {
        let mut routes: Vec<_> = self
            .tables
            .read()
            .routes
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        routes.sort_by(|a, b| (a.route_date, &a.code).cmp(&(b.route_date, &b.code)));
        Ok(routes)
    }

    async fn distinct_regions(&self) -> Result<Vec<String>> {
        let regions: BTreeSet<String> = self
            .tables
            .read()
            .routes
            .values()
            .map(|r| r.region.clone())
            .collect();
        Ok(regions.into_iter().collect())
    }

    async fn insert_stop(&self, stop: &RouteStop) -> Result<()> {
        self.tables.write().stops.insert(stop.id, stop.clone());
        Ok(())
    }

    async fn get_stop(&self, id: Uuid) -> Result<Option<RouteStop>> {
        Ok(self.tables.read().stops.get(&id).cloned())
    }

    async fn update_stop(&self, stop: &RouteStop) -> Result<()> {
        update_existing(&mut self.tables.write().stops, stop.id, stop, "route stop")
    }

    async fn list_stops(&self, route_ids: &[Uuid]) -> Result<Vec<RouteStop>> {
        let mut stops: Vec<_> = self
            .tables
            .read()
            .stops
            .values()
            .filter(|s| route_ids.contains(&s.route_id))
            .cloned()
            .collect();
        stops.sort_by_key(|s| (s.route_id, s.sequence));
        Ok(stops)
    }

    async fn insert_issue(&self, issue: &DeliveryIssue) -> Result<()> {
        self.tables.write().issues.insert(issue.id, issue.clone());
        Ok(())
    }

    async fn get_issue(&self, id: Uuid) -> Result<Option<DeliveryIssue>> {
        Ok(self.tables.read().issues.get(&id).cloned())
    }

    async fn update_issue(&self, issue: &DeliveryIssue) -> Result<()> {
        update_existing(&mut self.tables.write().issues, issue.id, issue, "issue")
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<DeliveryIssue>> {
        let mut issues: Vec<_> = self
            .tables
            .read()
            .issues
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        issues.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(issues)
    }

    async fn insert_contact(&self, contact: &EscalationContact) -> Result<()> {
        self.tables.write().contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn get_contact(&self, id: Uuid) -> Result<Option<EscalationContact>> {
        Ok(self.tables.read().contacts.get(&id).cloned())
    }

    async fn update_contact(&self, contact: &EscalationContact) -> Result<()> {
        update_existing(&mut self.tables.write().contacts, contact.id, contact, "contact")
    }

    async fn list_contacts(&self, active_only: bool) -> Result<Vec<EscalationContact>> {
        let mut contacts: Vec<_> = self
            .tables
            .read()
            .contacts
            .values()
            .filter(|c| !active_only || c.active)
            .cloned()
            .collect();
        order_ladder(&mut contacts);
        Ok(contacts)
    }

    async fn insert_escalation_log(&self, log: &EscalationLog) -> Result<()> {
        self.tables.write().escalation_logs.insert(log.id, log.clone());
        Ok(())
    }

    async fn update_escalation_log(&self, log: &EscalationLog) -> Result<()> {
        update_existing(&mut self.tables.write().escalation_logs, log.id, log, "escalation log")
    }

    async fn list_escalation_logs(&self, issue_id: Uuid) -> Result<Vec<EscalationLog>> {
        let mut logs: Vec<_> = self
            .tables
            .read()
            .escalation_logs
            .values()
            .filter(|l| l.issue_id == issue_id)
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.attempt, l.created_at));
        Ok(logs)
    }

    async fn insert_metric_definition(&self, definition: &MetricDefinition) -> Result<()> {
        self.tables
            .write()
            .metric_definitions
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn get_metric_definition(&self, id: Uuid) -> Result<Option<MetricDefinition>> {
        Ok(self.tables.read().metric_definitions.get(&id).cloned())
    }

    async fn find_metric_definition_by_key(&self, key: &str) -> Result<Option<MetricDefinition>> {
        Ok(self
            .tables
            .read()
            .metric_definitions
            .values()
            .find(|d| d.key == key)
            .cloned())
    }

    async fn list_metric_definitions(&self) -> Result<Vec<MetricDefinition>> {
        let mut definitions: Vec<_> = self
            .tables
            .read()
            .metric_definitions
            .values()
            .cloned()
            .collect();
        definitions.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(definitions)
    }

    async fn insert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<()> {
        self.tables.write().metric_snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn list_metric_snapshots(&self, metric_id: Uuid) -> Result<Vec<MetricSnapshot>> {
        let mut snapshots: Vec<_> = self
            .tables
            .read()
            .metric_snapshots
            .iter()
            .filter(|s| s.metric_id == metric_id)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};

    #[tokio::test]
    async fn test_update_missing_row_is_error() {
        let store = InMemoryStore::new();
        let shipment = Shipment::new("TRK-X", Uuid::new_v4(), Utc::now());
        assert!(store.update_shipment(&shipment).await.is_err());
    }

    #[tokio::test]
    async fn test_stops_ordered_by_sequence() {
        let store = InMemoryStore::new();
        let route_id = Uuid::new_v4();
        for seq in [3, 1, 2] {
            store
                .insert_stop(&RouteStop::new(route_id, Uuid::new_v4(), seq))
                .await
                .unwrap();
        }
        let stops = store.list_stops(&[route_id]).await.unwrap();
        let sequences: Vec<_> = stops.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_distinct_regions_sorted_and_deduplicated() {
        let store = InMemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        for (code, region) in [("R1", "west"), ("R2", "east"), ("R3", "west")] {
            let route = Route::new(code, Uuid::new_v4(), Uuid::new_v4(), region, date);
            store.insert_route(&route).await.unwrap();
        }
        assert_eq!(store.distinct_regions().await.unwrap(), vec!["east", "west"]);
    }

    #[tokio::test]
    async fn test_scan_filter_window() {
        let store = InMemoryStore::new();
        let shipment_id = Uuid::new_v4();
        let now = Utc::now();
        for offset in [0, 10, 20] {
            let scan = ShipmentScan::new(
                shipment_id,
                crate::models::shipment::ScanType::InTransit,
                "hub",
                now + Duration::minutes(offset),
            );
            store.insert_scan(&scan).await.unwrap();
        }
        let filter = ScanFilter {
            shipment_ids: Some(vec![shipment_id]),
            scanned: crate::models::metric::TimeWindow::between(now, now + Duration::minutes(10)),
        };
        assert_eq!(store.list_scans(&filter).await.unwrap().len(), 2);
    }
}

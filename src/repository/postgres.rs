use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{IssueFilter, RouteFilter, ScanFilter, ShipmentFilter, Store};
use crate::models::escalation::{EscalationContact, EscalationLog};
use crate::models::fleet::{Driver, Vehicle};
use crate::models::issue::DeliveryIssue;
use crate::models::metric::{MetricDefinition, MetricSnapshot, TimeWindow};
use crate::models::route::{Route, RouteStop};
use crate::models::shipment::{Shipment, ShipmentScan};
use crate::models::user::Customer;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Enum columns are TEXT; rows carry strings and convert on the way out.

#[derive(sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    tracking_id: String,
    customer_id: Uuid,
    origin: String,
    destination: String,
    status: String,
    promised_delivery_date: DateTime<Utc>,
    last_scan_location: Option<String>,
    last_scan_at: Option<DateTime<Utc>>,
    sla_risk_score: f64,
    is_vip: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = anyhow::Error;

    fn try_from(row: ShipmentRow) -> Result<Self> {
        Ok(Shipment {
            id: row.id,
            tracking_id: row.tracking_id,
            customer_id: row.customer_id,
            origin: row.origin,
            destination: row.destination,
            status: row.status.parse()?,
            promised_delivery_date: row.promised_delivery_date,
            last_scan_location: row.last_scan_location,
            last_scan_at: row.last_scan_at,
            sla_risk_score: row.sla_risk_score,
            is_vip: row.is_vip,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScanRow {
    id: Uuid,
    shipment_id: Uuid,
    scan_type: String,
    location: String,
    scanned_at: DateTime<Utc>,
    recorded_by: Option<Uuid>,
}

impl TryFrom<ScanRow> for ShipmentScan {
    type Error = anyhow::Error;

    fn try_from(row: ScanRow) -> Result<Self> {
        Ok(ShipmentScan {
            id: row.id,
            shipment_id: row.shipment_id,
            scan_type: row.scan_type.parse()?,
            location: row.location,
            scanned_at: row.scanned_at,
            recorded_by: row.recorded_by,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    code: String,
    driver_id: Uuid,
    vehicle_id: Uuid,
    region: String,
    route_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RouteRow> for Route {
    type Error = anyhow::Error;

    fn try_from(row: RouteRow) -> Result<Self> {
        Ok(Route {
            id: row.id,
            code: row.code,
            driver_id: row.driver_id,
            vehicle_id: row.vehicle_id,
            region: row.region,
            route_date: row.route_date,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StopRow {
    id: Uuid,
    route_id: Uuid,
    shipment_id: Uuid,
    sequence: i32,
    planned_arrival: Option<DateTime<Utc>>,
    actual_arrival: Option<DateTime<Utc>>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StopRow> for RouteStop {
    type Error = anyhow::Error;

    fn try_from(row: StopRow) -> Result<Self> {
        Ok(RouteStop {
            id: row.id,
            route_id: row.route_id,
            shipment_id: row.shipment_id,
            sequence: row.sequence,
            planned_arrival: row.planned_arrival,
            actual_arrival: row.actual_arrival,
            status: row.status.parse()?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: Uuid,
    shipment_id: Uuid,
    reported_by: Uuid,
    issue_type: String,
    description: String,
    severity: f64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<IssueRow> for DeliveryIssue {
    type Error = anyhow::Error;

    fn try_from(row: IssueRow) -> Result<Self> {
        Ok(DeliveryIssue {
            id: row.id,
            shipment_id: row.shipment_id,
            reported_by: row.reported_by,
            issue_type: row.issue_type.parse()?,
            description: row.description,
            severity: row.severity,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            resolved_at: row.resolved_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    channel: String,
    destination: String,
    timeout_seconds: i32,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for EscalationContact {
    type Error = anyhow::Error;

    fn try_from(row: ContactRow) -> Result<Self> {
        Ok(EscalationContact {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            channel: row.channel.parse()?,
            destination: row.destination,
            timeout_seconds: row.timeout_seconds,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EscalationLogRow {
    id: Uuid,
    issue_id: Uuid,
    contact_id: Uuid,
    attempt: i32,
    event_type: String,
    payload: serde_json::Value,
    acknowledged: bool,
    acknowledged_at: Option<DateTime<Utc>>,
    ack_method: Option<String>,
    acknowledged_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EscalationLogRow> for EscalationLog {
    type Error = anyhow::Error;

    fn try_from(row: EscalationLogRow) -> Result<Self> {
        Ok(EscalationLog {
            id: row.id,
            issue_id: row.issue_id,
            contact_id: row.contact_id,
            attempt: row.attempt,
            event_type: row.event_type.parse()?,
            payload: row.payload,
            acknowledged: row.acknowledged,
            acknowledged_at: row.acknowledged_at,
            ack_method: row.ack_method.map(|m| m.parse()).transpose()?,
            acknowledged_by: row.acknowledged_by,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MetricDefinitionRow {
    id: Uuid,
    key: String,
    name: String,
    description: Option<String>,
    kind: String,
    threshold: Option<f64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MetricDefinitionRow> for MetricDefinition {
    type Error = anyhow::Error;

    fn try_from(row: MetricDefinitionRow) -> Result<Self> {
        Ok(MetricDefinition {
            id: row.id,
            key: row.key,
            name: row.name,
            description: row.description,
            kind: row.kind.parse()?,
            threshold: row.threshold,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MetricSnapshotRow {
    id: Uuid,
    metric_id: Uuid,
    value: f64,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    dimension: String,
    dimension_value: Option<String>,
    breakdown: Option<serde_json::Value>,
    generated_at: DateTime<Utc>,
}

impl TryFrom<MetricSnapshotRow> for MetricSnapshot {
    type Error = anyhow::Error;

    fn try_from(row: MetricSnapshotRow) -> Result<Self> {
        let breakdown = row
            .breakdown
            .map(serde_json::from_value::<BTreeMap<String, f64>>)
            .transpose()?;
        Ok(MetricSnapshot {
            id: row.id,
            metric_id: row.metric_id,
            value: row.value,
            window_start: row.window_start,
            window_end: row.window_end,
            dimension: row.dimension,
            dimension_value: row.dimension_value,
            breakdown,
            generated_at: row.generated_at,
        })
    }
}

fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = anyhow::Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Appends `AND column >= from AND column <= to` for the bounded sides.
fn push_window(builder: &mut QueryBuilder<'_, Postgres>, column: &str, window: &TimeWindow) {
    if let Some(from) = window.from {
        builder.push(format!(" AND {} >= ", column)).push_bind(from);
    }
    if let Some(to) = window.to {
        builder.push(format!(" AND {} <= ", column)).push_bind(to);
    }
}

const SHIPMENT_COLUMNS: &str = "id, tracking_id, customer_id, origin, destination, status, \
     promised_delivery_date, last_scan_location, last_scan_at, sla_risk_score, is_vip, \
     created_at, updated_at";

const ROUTE_COLUMNS: &str =
    "id, code, driver_id, vehicle_id, region, route_date, status, created_at, updated_at";

const STOP_COLUMNS: &str = "id, route_id, shipment_id, sequence, planned_arrival, actual_arrival, \
     status, notes, created_at, updated_at";

const ISSUE_COLUMNS: &str = "id, shipment_id, reported_by, issue_type, description, severity, \
     status, created_at, updated_at, resolved_at";

const CONTACT_COLUMNS: &str =
    "id, user_id, name, channel, destination, timeout_seconds, active, created_at";

const LOG_COLUMNS: &str = "id, issue_id, contact_id, attempt, event_type, payload, acknowledged, \
     acknowledged_at, ack_method, acknowledged_by, created_at";

const DEFINITION_COLUMNS: &str = "id, key, name, description, kind, threshold, created_at";

const SNAPSHOT_COLUMNS: &str = "id, metric_id, value, window_start, window_end, dimension, \
     dimension_value, breakdown, generated_at";

#[async_trait]
impl Store for PgStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query("INSERT INTO customers (id, user_id, name, created_at) VALUES ($1, $2, $3, $4)")
            .bind(customer.id)
            .bind(customer.user_id)
            .bind(&customer.name)
            .bind(customer.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, (Uuid, Uuid, String, DateTime<Utc>)>(
            "SELECT id, user_id, name, created_at FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, user_id, name, created_at)| Customer {
            id,
            user_id,
            name,
            created_at,
        }))
    }

    async fn customer_for_user(&self, user_id: Uuid) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, (Uuid, Uuid, String, DateTime<Utc>)>(
            "SELECT id, user_id, name, created_at FROM customers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, user_id, name, created_at)| Customer {
            id,
            user_id,
            name,
            created_at,
        }))
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<()> {
        sqlx::query(
            "INSERT INTO drivers (id, user_id, name, phone, home_region, active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(driver.id)
        .bind(driver.user_id)
        .bind(&driver.name)
        .bind(&driver.phone)
        .bind(&driver.home_region)
        .bind(driver.active)
        .bind(driver.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>> {
        Ok(sqlx::query_as::<_, DriverRow>(
            "SELECT id, user_id, name, phone, home_region, active, created_at FROM drivers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Driver::from))
    }

    async fn driver_for_user(&self, user_id: Uuid) -> Result<Option<Driver>> {
        Ok(sqlx::query_as::<_, DriverRow>(
            "SELECT id, user_id, name, phone, home_region, active, created_at FROM drivers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Driver::from))
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>> {
        let rows = sqlx::query_as::<_, DriverRow>(
            "SELECT id, user_id, name, phone, home_region, active, created_at FROM drivers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Driver::from).collect())
    }

    async fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        sqlx::query(
            "INSERT INTO vehicles (id, plate, capacity_kg, active, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(vehicle.id)
        .bind(&vehicle.plate)
        .bind(vehicle.capacity_kg)
        .bind(vehicle.active)
        .bind(vehicle.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>> {
        Ok(sqlx::query_as::<_, VehicleRow>(
            "SELECT id, plate, capacity_kg, active, created_at FROM vehicles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Vehicle::from))
    }

    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>> {
        Ok(sqlx::query_as::<_, VehicleRow>(
            "SELECT id, plate, capacity_kg, active, created_at FROM vehicles WHERE plate = $1",
        )
        .bind(plate)
        .fetch_optional(&self.pool)
        .await?
        .map(Vehicle::from))
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        let rows = sqlx::query_as::<_, VehicleRow>(
            "SELECT id, plate, capacity_kg, active, created_at FROM vehicles ORDER BY plate",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    async fn insert_shipment(&self, s: &Shipment) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO shipments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            SHIPMENT_COLUMNS
        ))
        .bind(s.id)
        .bind(&s.tracking_id)
        .bind(s.customer_id)
        .bind(&s.origin)
        .bind(&s.destination)
        .bind(s.status.as_str())
        .bind(s.promised_delivery_date)
        .bind(&s.last_scan_location)
        .bind(s.last_scan_at)
        .bind(s.sla_risk_score)
        .bind(s.is_vip)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_shipment(&self, id: Uuid) -> Result<Option<Shipment>> {
        sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {} FROM shipments WHERE id = $1",
            SHIPMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Shipment::try_from)
        .transpose()
    }

    async fn find_shipment_by_tracking(&self, tracking_id: &str) -> Result<Option<Shipment>> {
        sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {} FROM shipments WHERE tracking_id = $1",
            SHIPMENT_COLUMNS
        ))
        .bind(tracking_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Shipment::try_from)
        .transpose()
    }

    async fn update_shipment(&self, s: &Shipment) -> Result<()> {
        sqlx::query(
            "UPDATE shipments SET origin = $2, destination = $3, status = $4, \
             promised_delivery_date = $5, last_scan_location = $6, last_scan_at = $7, \
             sla_risk_score = $8, is_vip = $9, updated_at = $10 WHERE id = $1",
        )
        .bind(s.id)
        .bind(&s.origin)
        .bind(&s.destination)
        .bind(s.status.as_str())
        .bind(s.promised_delivery_date)
        .bind(&s.last_scan_location)
        .bind(s.last_scan_at)
        .bind(s.sla_risk_score)
        .bind(s.is_vip)
        .bind(s.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_shipments(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM shipments WHERE TRUE",
            SHIPMENT_COLUMNS
        ));
        if let Some(ids) = &filter.ids {
            builder.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(customer_id) = filter.customer_id {
            builder.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(statuses) = &filter.statuses {
            let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            builder.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        push_window(&mut builder, "updated_at", &filter.updated);
        builder.push(" ORDER BY created_at DESC");

        let rows = builder
            .build_query_as::<ShipmentRow>()
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn insert_scan(&self, scan: &ShipmentScan) -> Result<()> {
        sqlx::query(
            "INSERT INTO shipment_scans (id, shipment_id, scan_type, location, scanned_at, recorded_by) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(scan.id)
        .bind(scan.shipment_id)
        .bind(scan.scan_type.as_str())
        .bind(&scan.location)
        .bind(scan.scanned_at)
        .bind(scan.recorded_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_scans(&self, filter: &ScanFilter) -> Result<Vec<ShipmentScan>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, shipment_id, scan_type, location, scanned_at, recorded_by \
             FROM shipment_scans WHERE TRUE",
        );
        if let Some(ids) = &filter.shipment_ids {
            builder.push(" AND shipment_id = ANY(").push_bind(ids.clone()).push(")");
        }
        push_window(&mut builder, "scanned_at", &filter.scanned);
        builder.push(" ORDER BY scanned_at ASC");

        let rows = builder.build_query_as::<ScanRow>().fetch_all(&self.pool).await?;
        convert(rows)
    }

    async fn insert_route(&self, r: &Route) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO routes ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            ROUTE_COLUMNS
        ))
        .bind(r.id)
        .bind(&r.code)
        .bind(r.driver_id)
        .bind(r.vehicle_id)
        .bind(&r.region)
        .bind(r.route_date)
        .bind(r.status.as_str())
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_route(&self, id: Uuid) -> Result<Option<Route>> {
        sqlx::query_as::<_, RouteRow>(&format!("SELECT {} FROM routes WHERE id = $1", ROUTE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Route::try_from)
            .transpose()
    }

    async fn find_route_by_code(&self, code: &str) -> Result<Option<Route>> {
        sqlx::query_as::<_, RouteRow>(&format!("SELECT {} FROM routes WHERE code = $1", ROUTE_COLUMNS))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(Route::try_from)
            .transpose()
    }

    async fn update_route(&self, r: &Route) -> Result<()> {
        sqlx::query(
            "UPDATE routes SET driver_id = $2, vehicle_id = $3, region = $4, route_date = $5, \
             status = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(r.id)
        .bind(r.driver_id)
        .bind(r.vehicle_id)
        .bind(&r.region)
        .bind(r.route_date)
        .bind(r.status.as_str())
        .bind(r.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM routes WHERE TRUE", ROUTE_COLUMNS));
        if let Some(driver_id) = filter.driver_id {
            builder.push(" AND driver_id = ").push_bind(driver_id);
        }
        if let Some(region) = &filter.region {
            builder.push(" AND region = ").push_bind(region.clone());
        }
        if let Some(date) = filter.route_date {
            builder.push(" AND route_date = ").push_bind(date);
        }
        builder.push(" ORDER BY route_date, code");

        let rows = builder.build_query_as::<RouteRow>().fetch_all(&self.pool).await?;
        convert(rows)
    }

    async fn distinct_regions(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT region FROM routes ORDER BY region")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(region,)| region).collect())
    }

    async fn insert_stop(&self, stop: &RouteStop) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO route_stops ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            STOP_COLUMNS
        ))
        .bind(stop.id)
        .bind(stop.route_id)
        .bind(stop.shipment_id)
        .bind(stop.sequence)
        .bind(stop.planned_arrival)
        .bind(stop.actual_arrival)
        .bind(stop.status.as_str())
        .bind(&stop.notes)
        .bind(stop.created_at)
        .bind(stop.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_stop(&self, id: Uuid) -> Result<Option<RouteStop>> {
        sqlx::query_as::<_, StopRow>(&format!("SELECT {} FROM route_stops WHERE id = $1", STOP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(RouteStop::try_from)
            .transpose()
    }

    async fn update_stop(&self, stop: &RouteStop) -> Result<()> {
        sqlx::query(
            "UPDATE route_stops SET sequence = $2, planned_arrival = $3, actual_arrival = $4, \
             status = $5, notes = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(stop.id)
        .bind(stop.sequence)
        .bind(stop.planned_arrival)
        .bind(stop.actual_arrival)
        .bind(stop.status.as_str())
        .bind(&stop.notes)
        .bind(stop.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_stops(&self, route_ids: &[Uuid]) -> Result<Vec<RouteStop>> {
        let rows = sqlx::query_as::<_, StopRow>(&format!(
            "SELECT {} FROM route_stops WHERE route_id = ANY($1) ORDER BY route_id, sequence",
            STOP_COLUMNS
        ))
        .bind(route_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn insert_issue(&self, issue: &DeliveryIssue) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO delivery_issues ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            ISSUE_COLUMNS
        ))
        .bind(issue.id)
        .bind(issue.shipment_id)
        .bind(issue.reported_by)
        .bind(issue.issue_type.as_str())
        .bind(&issue.description)
        .bind(issue.severity)
        .bind(issue.status.as_str())
        .bind(issue.created_at)
        .bind(issue.updated_at)
        .bind(issue.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_issue(&self, id: Uuid) -> Result<Option<DeliveryIssue>> {
        sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {} FROM delivery_issues WHERE id = $1",
            ISSUE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(DeliveryIssue::try_from)
        .transpose()
    }

    async fn update_issue(&self, issue: &DeliveryIssue) -> Result<()> {
        sqlx::query(
            "UPDATE delivery_issues SET description = $2, severity = $3, status = $4, \
             updated_at = $5, resolved_at = $6 WHERE id = $1",
        )
        .bind(issue.id)
        .bind(&issue.description)
        .bind(issue.severity)
        .bind(issue.status.as_str())
        .bind(issue.updated_at)
        .bind(issue.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<DeliveryIssue>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM delivery_issues WHERE TRUE",
            ISSUE_COLUMNS
        ));
        if let Some(ids) = &filter.shipment_ids {
            builder.push(" AND shipment_id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(statuses) = &filter.statuses {
            let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            builder.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        push_window(&mut builder, "created_at", &filter.created);
        builder.push(" ORDER BY created_at DESC");

        let rows = builder.build_query_as::<IssueRow>().fetch_all(&self.pool).await?;
        convert(rows)
    }

    async fn insert_contact(&self, c: &EscalationContact) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO escalation_contacts ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            CONTACT_COLUMNS
        ))
        .bind(c.id)
        .bind(c.user_id)
        .bind(&c.name)
        .bind(c.channel.as_str())
        .bind(&c.destination)
        .bind(c.timeout_seconds)
        .bind(c.active)
        .bind(c.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_contact(&self, id: Uuid) -> Result<Option<EscalationContact>> {
        sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {} FROM escalation_contacts WHERE id = $1",
            CONTACT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(EscalationContact::try_from)
        .transpose()
    }

    async fn update_contact(&self, c: &EscalationContact) -> Result<()> {
        sqlx::query(
            "UPDATE escalation_contacts SET name = $2, channel = $3, destination = $4, \
             timeout_seconds = $5, active = $6 WHERE id = $1",
        )
        .bind(c.id)
        .bind(&c.name)
        .bind(c.channel.as_str())
        .bind(&c.destination)
        .bind(c.timeout_seconds)
        .bind(c.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_contacts(&self, active_only: bool) -> Result<Vec<EscalationContact>> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {} FROM escalation_contacts WHERE ($1 = FALSE OR active) \
             ORDER BY timeout_seconds ASC, created_at ASC, id ASC",
            CONTACT_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn insert_escalation_log(&self, log: &EscalationLog) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO escalation_logs ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            LOG_COLUMNS
        ))
        .bind(log.id)
        .bind(log.issue_id)
        .bind(log.contact_id)
        .bind(log.attempt)
        .bind(log.event_type.as_str())
        .bind(&log.payload)
        .bind(log.acknowledged)
        .bind(log.acknowledged_at)
        .bind(log.ack_method.map(|m| m.as_str()))
        .bind(log.acknowledged_by)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_escalation_log(&self, log: &EscalationLog) -> Result<()> {
        sqlx::query(
            "UPDATE escalation_logs SET acknowledged = $2, acknowledged_at = $3, ack_method = $4, \
             acknowledged_by = $5 WHERE id = $1",
        )
        .bind(log.id)
        .bind(log.acknowledged)
        .bind(log.acknowledged_at)
        .bind(log.ack_method.map(|m| m.as_str()))
        .bind(log.acknowledged_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_escalation_logs(&self, issue_id: Uuid) -> Result<Vec<EscalationLog>> {
        let rows = sqlx::query_as::<_, EscalationLogRow>(&format!(
            "SELECT {} FROM escalation_logs WHERE issue_id = $1 ORDER BY attempt, created_at",
            LOG_COLUMNS
        ))
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn insert_metric_definition(&self, d: &MetricDefinition) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO metric_definitions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            DEFINITION_COLUMNS
        ))
        .bind(d.id)
        .bind(&d.key)
        .bind(&d.name)
        .bind(&d.description)
        .bind(d.kind.as_str())
        .bind(d.threshold)
        .bind(d.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_metric_definition(&self, id: Uuid) -> Result<Option<MetricDefinition>> {
        sqlx::query_as::<_, MetricDefinitionRow>(&format!(
            "SELECT {} FROM metric_definitions WHERE id = $1",
            DEFINITION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(MetricDefinition::try_from)
        .transpose()
    }

    async fn find_metric_definition_by_key(&self, key: &str) -> Result<Option<MetricDefinition>> {
        sqlx::query_as::<_, MetricDefinitionRow>(&format!(
            "SELECT {} FROM metric_definitions WHERE key = $1",
            DEFINITION_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .map(MetricDefinition::try_from)
        .transpose()
    }

    async fn list_metric_definitions(&self) -> Result<Vec<MetricDefinition>> {
        let rows = sqlx::query_as::<_, MetricDefinitionRow>(&format!(
            "SELECT {} FROM metric_definitions ORDER BY key",
            DEFINITION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn insert_metric_snapshot(&self, s: &MetricSnapshot) -> Result<()> {
        let breakdown = s.breakdown.as_ref().map(serde_json::to_value).transpose()?;
        sqlx::query(&format!(
            "INSERT INTO metric_snapshots ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            SNAPSHOT_COLUMNS
        ))
        .bind(s.id)
        .bind(s.metric_id)
        .bind(s.value)
        .bind(s.window_start)
        .bind(s.window_end)
        .bind(&s.dimension)
        .bind(&s.dimension_value)
        .bind(breakdown)
        .bind(s.generated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_metric_snapshots(&self, metric_id: Uuid) -> Result<Vec<MetricSnapshot>> {
        let rows = sqlx::query_as::<_, MetricSnapshotRow>(&format!(
            "SELECT {} FROM metric_snapshots WHERE metric_id = $1 ORDER BY generated_at DESC",
            SNAPSHOT_COLUMNS
        ))
        .bind(metric_id)
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct DriverRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    phone: Option<String>,
    home_region: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<DriverRow> for Driver {
    fn from(row: DriverRow) -> Self {
        Driver {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            phone: row.phone,
            home_region: row.home_region,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    plate: String,
    capacity_kg: f64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Vehicle {
            id: row.id,
            plate: row.plate,
            capacity_kg: row.capacity_kg,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

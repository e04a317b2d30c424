use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::access::{self, Actor};
use super::notification::{LiveEvent, LiveEventKind, NotificationService};
use crate::error::{ApiError, ApiResult};
use crate::models::shipment::{ScanType, Shipment, ShipmentScan, ShipmentStatus};
use crate::models::user::Role;
use crate::repository::{scope, ScanFilter, ShipmentFilter, Store};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentRequest {
    pub tracking_id: String,
    pub customer_id: Uuid,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    pub promised_delivery_date: DateTime<Utc>,
    #[serde(default)]
    pub sla_risk_score: f64,
    #[serde(default)]
    pub is_vip: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentQuery {
    pub status: Option<ShipmentStatus>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScanRequest {
    pub scan_type: ScanType,
    pub location: String,
    pub scanned_at: Option<DateTime<Utc>>,
}

pub struct ShipmentService {
    store: Arc<dyn Store>,
    events: Arc<NotificationService>,
}

impl ShipmentService {
    pub fn new(store: Arc<dyn Store>, events: Arc<NotificationService>) -> Self {
        Self { store, events }
    }

    /// Whether the shipment sits on one of the caller's routes. Only
    /// meaningful for drivers.
    pub async fn on_driver_route(&self, actor: &Actor, shipment_id: Uuid) -> anyhow::Result<bool> {
        match (actor.role, actor.driver_id) {
            (Role::Driver, Some(driver_id)) => Ok(scope::driver_shipment_ids(self.store.as_ref(), driver_id)
                .await?
                .contains(&shipment_id)),
            _ => Ok(false),
        }
    }

    /// Loads a shipment the caller is allowed to see. Hidden shipments are
    /// reported as forbidden, not missing.
    pub async fn visible_shipment(&self, actor: &Actor, shipment_id: Uuid) -> ApiResult<Shipment> {
        let shipment = self
            .store
            .get_shipment(shipment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("shipment"))?;
        self.ensure_visible(actor, &shipment).await?;
        Ok(shipment)
    }

    async fn ensure_visible(&self, actor: &Actor, shipment: &Shipment) -> ApiResult<()> {
        let on_route = self.on_driver_route(actor, shipment.id).await?;
        access::ensure(
            access::can_view_shipment(actor, shipment, on_route),
            "shipment belongs to another account",
        )
    }

    pub async fn create_shipment(&self, actor: &Actor, request: CreateShipmentRequest) -> ApiResult<Shipment> {
        access::ensure(access::can_manage_shipments(actor), "only dispatchers create shipments")?;

        let tracking_id = request.tracking_id.trim();
        if tracking_id.is_empty() {
            return Err(ApiError::bad_request("trackingId is required"));
        }
        if !(0.0..=1.0).contains(&request.sla_risk_score) {
            return Err(ApiError::bad_request("slaRiskScore must be within [0, 1]"));
        }
        if self.store.get_customer(request.customer_id).await?.is_none() {
            return Err(ApiError::not_found("customer"));
        }
        if self.store.find_shipment_by_tracking(tracking_id).await?.is_some() {
            return Err(ApiError::bad_request(format!(
                "tracking id {} already exists",
                tracking_id
            )));
        }

        let mut shipment = Shipment::new(tracking_id, request.customer_id, request.promised_delivery_date);
        shipment.origin = request.origin;
        shipment.destination = request.destination;
        shipment.sla_risk_score = request.sla_risk_score;
        shipment.is_vip = request.is_vip;
        self.store.insert_shipment(&shipment).await?;

        tracing::info!(shipment_id = %shipment.id, tracking_id = %shipment.tracking_id, "shipment created");
        self.events.publish(
            LiveEvent::new(LiveEventKind::ShipmentUpdated, shipment.id, &shipment).for_shipment(&shipment),
        );
        Ok(shipment)
    }

    pub async fn list_shipments(&self, actor: &Actor, query: ShipmentQuery) -> ApiResult<Vec<Shipment>> {
        let mut filter = ShipmentFilter {
            statuses: query.status.map(|s| vec![s]),
            ..Default::default()
        };

        match actor.role {
            Role::Customer => match actor.customer_id {
                Some(own) => filter.customer_id = Some(own),
                None => return Ok(Vec::new()),
            },
            Role::Driver => {
                filter.ids = Some(match actor.driver_id {
                    Some(driver_id) => scope::driver_shipment_ids(self.store.as_ref(), driver_id).await?,
                    None => Vec::new(),
                });
            }
            _ => filter.customer_id = query.customer_id,
        }

        Ok(self.store.list_shipments(&filter).await?)
    }

    pub async fn get_shipment(&self, actor: &Actor, shipment_id: Uuid) -> ApiResult<Shipment> {
        self.visible_shipment(actor, shipment_id).await
    }

    pub async fn track(&self, actor: &Actor, tracking_id: &str) -> ApiResult<Shipment> {
        let shipment = self
            .store
            .find_shipment_by_tracking(tracking_id)
            .await?
            .ok_or_else(|| ApiError::not_found("shipment"))?;
        self.ensure_visible(actor, &shipment).await?;
        Ok(shipment)
    }

    pub async fn record_scan(
        &self,
        actor: &Actor,
        shipment_id: Uuid,
        request: RecordScanRequest,
    ) -> ApiResult<ShipmentScan> {
        let mut shipment = self
            .store
            .get_shipment(shipment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("shipment"))?;
        let on_route = self.on_driver_route(actor, shipment.id).await?;
        access::ensure(
            access::can_record_scan(actor, on_route),
            "scans are recorded by dispatch or the assigned driver",
        )?;

        let location = request.location.trim();
        if location.is_empty() {
            return Err(ApiError::bad_request("scan location is required"));
        }

        let mut scan = ShipmentScan::new(
            shipment.id,
            request.scan_type,
            location,
            request.scanned_at.unwrap_or_else(Utc::now),
        );
        scan.recorded_by = Some(actor.user_id);

        shipment
            .apply_scan(&scan)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        self.store.insert_scan(&scan).await?;
        self.store.update_shipment(&shipment).await?;

        tracing::info!(
            shipment_id = %shipment.id,
            scan_type = %scan.scan_type,
            status = %shipment.status,
            "scan recorded"
        );
        self.events.publish(
            LiveEvent::new(LiveEventKind::ShipmentUpdated, shipment.id, &shipment).for_shipment(&shipment),
        );
        Ok(scan)
    }

    pub async fn list_scans(&self, actor: &Actor, shipment_id: Uuid) -> ApiResult<Vec<ShipmentScan>> {
        let shipment = self.visible_shipment(actor, shipment_id).await?;
        Ok(self.store.list_scans(&ScanFilter::for_shipment(shipment.id)).await?)
    }
}

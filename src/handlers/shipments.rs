use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::shipment::{Shipment, ShipmentScan};
use crate::services::access::Actor;
use crate::services::shipments::{CreateShipmentRequest, RecordScanRequest, ShipmentQuery};
use crate::services::AppState;

pub async fn create_shipment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateShipmentRequest>,
) -> ApiResult<(StatusCode, Json<Shipment>)> {
    let shipment = state.shipments.create_shipment(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

pub async fn list_shipments(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ShipmentQuery>,
) -> ApiResult<Json<Vec<Shipment>>> {
    Ok(Json(state.shipments.list_shipments(&actor, query).await?))
}

pub async fn get_shipment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(shipment_id): Path<Uuid>,
) -> ApiResult<Json<Shipment>> {
    Ok(Json(state.shipments.get_shipment(&actor, shipment_id).await?))
}

pub async fn track_shipment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(tracking_id): Path<String>,
) -> ApiResult<Json<Shipment>> {
    Ok(Json(state.shipments.track(&actor, &tracking_id).await?))
}

pub async fn record_scan(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(shipment_id): Path<Uuid>,
    Json(request): Json<RecordScanRequest>,
) -> ApiResult<(StatusCode, Json<ShipmentScan>)> {
    let scan = state
        .shipments
        .record_scan(&actor, shipment_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(scan)))
}

pub async fn list_scans(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(shipment_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ShipmentScan>>> {
    Ok(Json(state.shipments.list_scans(&actor, shipment_id).await?))
}

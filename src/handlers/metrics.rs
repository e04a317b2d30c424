use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::metric::{Dimension, MetricDefinition, MetricSnapshot, TimeWindow};
use crate::services::access::Actor;
use crate::services::metrics::{
    CreateMetricDefinitionRequest, GenerateSnapshotRequest, MetricQuery, MetricsOverview,
};
use crate::services::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub dimension: Option<String>,
    pub dimension_value: Option<String>,
    pub threshold: Option<f64>,
}

impl OverviewParams {
    fn into_query(self) -> ApiResult<MetricQuery> {
        let dimension = Dimension::parse(self.dimension.as_deref(), self.dimension_value.as_deref())
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::bad_request("from must not be after to"));
            }
        }
        Ok(MetricQuery {
            dimension,
            window: TimeWindow {
                from: self.from,
                to: self.to,
            },
            sla_threshold: self.threshold,
        })
    }
}

pub async fn overview(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(params): Query<OverviewParams>,
) -> ApiResult<Json<MetricsOverview>> {
    let query = params.into_query()?;
    Ok(Json(state.metrics.overview(&actor, query).await?))
}

pub async fn list_definitions(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Json<Vec<MetricDefinition>>> {
    Ok(Json(state.metrics.list_definitions(&actor).await?))
}

pub async fn create_definition(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateMetricDefinitionRequest>,
) -> ApiResult<(StatusCode, Json<MetricDefinition>)> {
    let definition = state.metrics.create_definition(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(definition)))
}

pub async fn get_definition(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(metric_id): Path<Uuid>,
) -> ApiResult<Json<MetricDefinition>> {
    Ok(Json(state.metrics.get_definition(&actor, metric_id).await?))
}

/// An empty body means the defaults; anything else must parse.
fn parse_snapshot_request(body: &[u8]) -> ApiResult<GenerateSnapshotRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(GenerateSnapshotRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid snapshot request: {}", e)))
}

/// The body is optional; an empty POST snapshots the last 24 hours globally.
pub async fn generate_snapshot(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(metric_id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<MetricSnapshot>)> {
    let request = parse_snapshot_request(&body)?;
    let snapshot = state
        .metrics
        .generate_snapshot(&actor, metric_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn list_snapshots(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(metric_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MetricSnapshot>>> {
    Ok(Json(state.metrics.list_snapshots(&actor, metric_id).await?))
}

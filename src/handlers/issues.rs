use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::issue::DeliveryIssue;
use crate::services::access::Actor;
use crate::services::issues::{IssueQuery, ReportIssueRequest, ReportedIssue, UpdateIssueRequest};
use crate::services::AppState;

pub async fn report_issue(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<ReportIssueRequest>,
) -> ApiResult<(StatusCode, Json<ReportedIssue>)> {
    let reported = state.issues.report(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(reported)))
}

pub async fn list_issues(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<IssueQuery>,
) -> ApiResult<Json<Vec<DeliveryIssue>>> {
    Ok(Json(state.issues.list_issues(&actor, query).await?))
}

pub async fn get_issue(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<DeliveryIssue>> {
    Ok(Json(state.issues.get_issue(&actor, issue_id).await?))
}

pub async fn update_issue(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(issue_id): Path<Uuid>,
    Json(request): Json<UpdateIssueRequest>,
) -> ApiResult<Json<DeliveryIssue>> {
    Ok(Json(state.issues.update_status(&actor, issue_id, request).await?))
}

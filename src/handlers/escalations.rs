use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::escalation::{EscalationContact, EscalationLog, EscalationSummary};
use crate::services::access::Actor;
use crate::services::escalation::{
    AcknowledgeRequest, AdvanceRequest, CreateContactRequest, UpdateContactRequest,
};
use crate::services::AppState;

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Json<Vec<EscalationContact>>> {
    Ok(Json(state.escalation.list_contacts(&actor).await?))
}

pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateContactRequest>,
) -> ApiResult<(StatusCode, Json<EscalationContact>)> {
    let contact = state.escalation.create_contact(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(contact_id): Path<Uuid>,
    Json(request): Json<UpdateContactRequest>,
) -> ApiResult<Json<EscalationContact>> {
    Ok(Json(
        state
            .escalation
            .update_contact(&actor, contact_id, request)
            .await?,
    ))
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<EscalationSummary>> {
    Ok(Json(state.escalation.status(&actor, issue_id).await?))
}

pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(issue_id): Path<Uuid>,
    request: Option<Json<AcknowledgeRequest>>,
) -> ApiResult<Json<EscalationLog>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .escalation
            .acknowledge(&actor, issue_id, request)
            .await?,
    ))
}

pub async fn advance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(issue_id): Path<Uuid>,
    request: Option<Json<AdvanceRequest>>,
) -> ApiResult<(StatusCode, Json<EscalationLog>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let log = state.escalation.advance(&actor, issue_id, request).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

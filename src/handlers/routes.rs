use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::route::{Route, RouteStop, RouteWithStops};
use crate::services::access::Actor;
use crate::services::routes::{
    CreateRouteRequest, CreateStopRequest, RouteQuery, UpdateRouteRequest, UpdateStopRequest,
};
use crate::services::AppState;

pub async fn create_route(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateRouteRequest>,
) -> ApiResult<(StatusCode, Json<Route>)> {
    let route = state.routes.create_route(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn list_routes(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<RouteQuery>,
) -> ApiResult<Json<Vec<Route>>> {
    Ok(Json(state.routes.list_routes(&actor, query).await?))
}

pub async fn get_route(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(route_id): Path<Uuid>,
) -> ApiResult<Json<RouteWithStops>> {
    Ok(Json(state.routes.get_route(&actor, route_id).await?))
}

pub async fn update_route(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(route_id): Path<Uuid>,
    Json(request): Json<UpdateRouteRequest>,
) -> ApiResult<Json<Route>> {
    Ok(Json(state.routes.update_route(&actor, route_id, request).await?))
}

pub async fn list_stops(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(route_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RouteStop>>> {
    Ok(Json(state.routes.list_stops(&actor, route_id).await?))
}

pub async fn create_stop(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(route_id): Path<Uuid>,
    Json(request): Json<CreateStopRequest>,
) -> ApiResult<(StatusCode, Json<RouteStop>)> {
    let stop = state.routes.create_stop(&actor, route_id, request).await?;
    Ok((StatusCode::CREATED, Json(stop)))
}

pub async fn update_stop(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((route_id, stop_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateStopRequest>,
) -> ApiResult<Json<RouteStop>> {
    Ok(Json(
        state
            .routes
            .update_stop(&actor, route_id, stop_id, request)
            .await?,
    ))
}

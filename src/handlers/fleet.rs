use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::models::fleet::{Driver, Vehicle};
use crate::models::user::Customer;
use crate::services::access::Actor;
use crate::services::fleet::{CreateCustomerRequest, CreateDriverRequest, CreateVehicleRequest};
use crate::services::AppState;

pub async fn list_drivers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Json<Vec<Driver>>> {
    Ok(Json(state.fleet.list_drivers(&actor).await?))
}

pub async fn create_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateDriverRequest>,
) -> ApiResult<(StatusCode, Json<Driver>)> {
    let driver = state.fleet.create_driver(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Json<Vec<Vehicle>>> {
    Ok(Json(state.fleet.list_vehicles(&actor).await?))
}

pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateVehicleRequest>,
) -> ApiResult<(StatusCode, Json<Vehicle>)> {
    let vehicle = state.fleet.create_vehicle(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateCustomerRequest>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = state.fleet.create_customer(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

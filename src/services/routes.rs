use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::access::{self, Actor};
use super::notification::{LiveEvent, LiveEventKind, NotificationService};
use crate::error::{ApiError, ApiResult};
use crate::models::route::{Route, RouteStatus, RouteStop, RouteWithStops, StopStatus};
use crate::models::shipment::ShipmentStatus;
use crate::models::user::Role;
use crate::repository::{RouteFilter, Store};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    pub code: String,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub region: String,
    pub route_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuery {
    pub region: Option<String>,
    pub date: Option<NaiveDate>,
    pub driver_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRouteRequest {
    pub status: Option<RouteStatus>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub region: Option<String>,
    pub route_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStopRequest {
    pub shipment_id: Uuid,
    pub sequence: i32,
    pub planned_arrival: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStopRequest {
    pub sequence: Option<i32>,
    pub planned_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub status: Option<StopStatus>,
    pub notes: Option<String>,
}

impl UpdateStopRequest {
    /// Fields only planners may change.
    fn touches_plan(&self) -> bool {
        self.sequence.is_some() || self.planned_arrival.is_some()
    }
}

pub struct RouteService {
    store: Arc<dyn Store>,
    events: Arc<NotificationService>,
}

impl RouteService {
    pub fn new(store: Arc<dyn Store>, events: Arc<NotificationService>) -> Self {
        Self { store, events }
    }

    async fn load_route(&self, route_id: Uuid) -> ApiResult<Route> {
        self.store
            .get_route(route_id)
            .await?
            .ok_or_else(|| ApiError::not_found("route"))
    }

    async fn ensure_driver_and_vehicle(&self, driver_id: Uuid, vehicle_id: Uuid) -> ApiResult<()> {
        if self.store.get_driver(driver_id).await?.is_none() {
            return Err(ApiError::not_found("driver"));
        }
        if self.store.get_vehicle(vehicle_id).await?.is_none() {
            return Err(ApiError::not_found("vehicle"));
        }
        Ok(())
    }

    pub async fn create_route(&self, actor: &Actor, request: CreateRouteRequest) -> ApiResult<Route> {
        access::ensure(access::can_plan_routes(actor), "only dispatchers plan routes")?;

        let code = request.code.trim();
        if code.is_empty() {
            return Err(ApiError::bad_request("route code is required"));
        }
        self.ensure_driver_and_vehicle(request.driver_id, request.vehicle_id)
            .await?;
        if self.store.find_route_by_code(code).await?.is_some() {
            return Err(ApiError::bad_request(format!("route code {} already exists", code)));
        }

        let route = Route::new(
            code,
            request.driver_id,
            request.vehicle_id,
            request.region.trim(),
            request.route_date,
        );
        self.store.insert_route(&route).await?;

        tracing::info!(route_id = %route.id, code = %route.code, region = %route.region, "route created");
        self.events.publish(
            LiveEvent::new(LiveEventKind::RouteUpdated, route.id, &route).for_route(&route),
        );
        Ok(route)
    }

    pub async fn list_routes(&self, actor: &Actor, query: RouteQuery) -> ApiResult<Vec<Route>> {
        access::ensure(access::can_list_routes(actor), "customers cannot list routes")?;

        let driver_id = if actor.role == Role::Driver {
            // A driver without a profile has no routes.
            match actor.driver_id {
                Some(own) => Some(own),
                None => return Ok(Vec::new()),
            }
        } else {
            query.driver_id
        };

        let filter = RouteFilter {
            driver_id,
            region: query.region,
            route_date: query.date,
        };
        Ok(self.store.list_routes(&filter).await?)
    }

    pub async fn get_route(&self, actor: &Actor, route_id: Uuid) -> ApiResult<RouteWithStops> {
        let route = self.load_route(route_id).await?;
        access::ensure(access::can_view_route(actor, &route), "route is assigned to another driver")?;

        let stops = self.store.list_stops(&[route.id]).await?;
        Ok(RouteWithStops { route, stops })
    }

    pub async fn update_route(&self, actor: &Actor, route_id: Uuid, request: UpdateRouteRequest) -> ApiResult<Route> {
        access::ensure(access::can_plan_routes(actor), "only dispatchers plan routes")?;

        let mut route = self.load_route(route_id).await?;
        let driver_id = request.driver_id.unwrap_or(route.driver_id);
        let vehicle_id = request.vehicle_id.unwrap_or(route.vehicle_id);
        if request.driver_id.is_some() || request.vehicle_id.is_some() {
            self.ensure_driver_and_vehicle(driver_id, vehicle_id).await?;
        }

        route.driver_id = driver_id;
        route.vehicle_id = vehicle_id;
        if let Some(status) = request.status {
            route.status = status;
        }
        if let Some(region) = request.region {
            route.region = region.trim().to_string();
        }
        if let Some(date) = request.route_date {
            route.route_date = date;
        }
        route.updated_at = Utc::now();
        self.store.update_route(&route).await?;

        tracing::info!(route_id = %route.id, status = %route.status, "route updated");
        self.events.publish(
            LiveEvent::new(LiveEventKind::RouteUpdated, route.id, &route).for_route(&route),
        );
        Ok(route)
    }

    pub async fn list_stops(&self, actor: &Actor, route_id: Uuid) -> ApiResult<Vec<RouteStop>> {
        let route = self.load_route(route_id).await?;
        access::ensure(access::can_view_route(actor, &route), "route is assigned to another driver")?;
        Ok(self.store.list_stops(&[route.id]).await?)
    }

    pub async fn create_stop(&self, actor: &Actor, route_id: Uuid, request: CreateStopRequest) -> ApiResult<RouteStop> {
        access::ensure(access::can_plan_routes(actor), "only dispatchers plan routes")?;

        let route = self.load_route(route_id).await?;
        if self.store.get_shipment(request.shipment_id).await?.is_none() {
            return Err(ApiError::not_found("shipment"));
        }
        if request.sequence < 1 {
            return Err(ApiError::bad_request("sequence must be at least 1"));
        }

        let existing = self.store.list_stops(&[route.id]).await?;
        if existing.iter().any(|s| s.shipment_id == request.shipment_id) {
            return Err(ApiError::bad_request("shipment is already on this route"));
        }
        if existing.iter().any(|s| s.sequence == request.sequence) {
            return Err(ApiError::bad_request(format!(
                "sequence {} is already used on this route",
                request.sequence
            )));
        }

        let mut stop = RouteStop::new(route.id, request.shipment_id, request.sequence);
        stop.planned_arrival = request.planned_arrival;
        stop.notes = request.notes;
        self.store.insert_stop(&stop).await?;

        tracing::info!(route_id = %route.id, stop_id = %stop.id, sequence = stop.sequence, "stop added");
        self.events.publish(
            LiveEvent::new(LiveEventKind::StopUpdated, stop.id, &stop).for_route(&route),
        );
        Ok(stop)
    }

    pub async fn update_stop(
        &self,
        actor: &Actor,
        route_id: Uuid,
        stop_id: Uuid,
        request: UpdateStopRequest,
    ) -> ApiResult<RouteStop> {
        let route = self.load_route(route_id).await?;
        access::ensure(access::can_update_stop(actor, &route), "route is assigned to another driver")?;
        if !actor.role.is_planner() && request.touches_plan() {
            return Err(ApiError::forbidden("drivers may only report stop progress"));
        }

        let mut stop = self
            .store
            .get_stop(stop_id)
            .await?
            .filter(|s| s.route_id == route.id)
            .ok_or_else(|| ApiError::not_found("stop"))?;

        if let Some(sequence) = request.sequence {
            if sequence < 1 {
                return Err(ApiError::bad_request("sequence must be at least 1"));
            }
            let taken = self
                .store
                .list_stops(&[route.id])
                .await?
                .iter()
                .any(|s| s.id != stop.id && s.sequence == sequence);
            if taken {
                return Err(ApiError::bad_request(format!(
                    "sequence {} is already used on this route",
                    sequence
                )));
            }
            stop.sequence = sequence;
        }

        let now = Utc::now();
        if let Some(planned) = request.planned_arrival {
            stop.planned_arrival = Some(planned);
        }
        if let Some(actual) = request.actual_arrival {
            stop.actual_arrival = Some(actual);
        }
        if let Some(notes) = request.notes {
            stop.notes = Some(notes);
        }

        // Settle the shipment first so an illegal transition leaves the stop untouched.
        let shipment_status = match request.status {
            Some(StopStatus::Completed) => Some(ShipmentStatus::Delivered),
            Some(StopStatus::Failed) => Some(ShipmentStatus::Failed),
            _ => None,
        };
        let mut shipment = None;
        if let Some(next) = shipment_status {
            let mut current = self
                .store
                .get_shipment(stop.shipment_id)
                .await?
                .ok_or_else(|| ApiError::not_found("shipment"))?;
            if current.status != next {
                current
                    .transition_to(next, now)
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                shipment = Some(current);
            }
        }

        if let Some(status) = request.status {
            if status == StopStatus::Arrived && stop.actual_arrival.is_none() {
                stop.actual_arrival = Some(now);
            }
            stop.status = status;
        }
        stop.updated_at = now;
        self.store.update_stop(&stop).await?;

        if let Some(shipment) = shipment {
            self.store.update_shipment(&shipment).await?;
            tracing::info!(shipment_id = %shipment.id, status = %shipment.status, "shipment settled by stop");
            self.events.publish(
                LiveEvent::new(LiveEventKind::ShipmentUpdated, shipment.id, &shipment).for_shipment(&shipment),
            );
        }

        tracing::info!(route_id = %route.id, stop_id = %stop.id, status = %stop.status, "stop updated");
        self.events.publish(
            LiveEvent::new(LiveEventKind::StopUpdated, stop.id, &stop).for_route(&route),
        );
        Ok(stop)
    }
}

//! Route planning, stop constraints and driver visibility.

mod common;

use chrono::Utc;
use uuid::Uuid;

use common::*;
use shipdesk::error::ApiError;
use shipdesk::models::route::{RouteStatus, StopStatus};
use shipdesk::models::shipment::{ScanType, ShipmentStatus};
use shipdesk::models::user::Role;
use shipdesk::repository::Store;
use shipdesk::services::routes::{
    CreateRouteRequest, CreateStopRequest, RouteQuery, UpdateRouteRequest, UpdateStopRequest,
};
use shipdesk::services::shipments::RecordScanRequest;

fn stop_request(shipment_id: Uuid, sequence: i32) -> CreateStopRequest {
    CreateStopRequest {
        shipment_id,
        sequence,
        planned_arrival: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_create_route_validates_references_and_code() {
    let (state, store) = app();
    let dispatcher = staff(Role::Dispatcher);
    let driver = seed_driver(&store, "west").await;
    let vehicle = seed_vehicle(&store).await;

    let request = |code: &str, driver_id, vehicle_id| CreateRouteRequest {
        code: code.to_string(),
        driver_id,
        vehicle_id,
        region: "west".to_string(),
        route_date: day(),
    };

    let route = state
        .routes
        .create_route(&dispatcher, request("W-1", driver.id, vehicle.id))
        .await
        .unwrap();
    assert_eq!(route.status, RouteStatus::Planned);

    let err = state
        .routes
        .create_route(&dispatcher, request("W-1", driver.id, vehicle.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let err = state
        .routes
        .create_route(&dispatcher, request("W-2", Uuid::new_v4(), vehicle.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(ref what) if what == "driver"));

    let err = state
        .routes
        .create_route(&dispatcher, request("W-3", driver.id, Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(ref what) if what == "vehicle"));

    let err = state
        .routes
        .create_route(&staff(Role::Driver), request("W-4", driver.id, vehicle.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_stop_constraints() {
    let (state, store) = app();
    let dispatcher = staff(Role::Dispatcher);
    let customer = seed_customer(&store).await;
    let (route, _) = seed_route(&store, "N-1", "north").await;
    let first = seed_shipment(&store, customer.id).await;
    let second = seed_shipment(&store, customer.id).await;

    state
        .routes
        .create_stop(&dispatcher, route.id, stop_request(first.id, 1))
        .await
        .unwrap();

    // Sequence taken.
    let err = state
        .routes
        .create_stop(&dispatcher, route.id, stop_request(second.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    // Shipment already on the route.
    let err = state
        .routes
        .create_stop(&dispatcher, route.id, stop_request(first.id, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let err = state
        .routes
        .create_stop(&dispatcher, route.id, stop_request(second.id, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let err = state
        .routes
        .create_stop(&dispatcher, route.id, stop_request(Uuid::new_v4(), 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = state
        .routes
        .create_stop(&dispatcher, Uuid::new_v4(), stop_request(second.id, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    state
        .routes
        .create_stop(&dispatcher, route.id, stop_request(second.id, 2))
        .await
        .unwrap();
    let stops = state.routes.list_stops(&dispatcher, route.id).await.unwrap();
    let sequences: Vec<_> = stops.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[tokio::test]
async fn test_resequencing_into_taken_slot_rejected() {
    let (state, store) = app();
    let dispatcher = staff(Role::Dispatcher);
    let customer = seed_customer(&store).await;
    let (route, _) = seed_route(&store, "N-1", "north").await;
    let a = place_on_route(&store, &route, &seed_shipment(&store, customer.id).await, 1).await;
    let _b = place_on_route(&store, &route, &seed_shipment(&store, customer.id).await, 2).await;

    let err = state
        .routes
        .update_stop(
            &dispatcher,
            route.id,
            a.id,
            UpdateStopRequest {
                sequence: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let moved = state
        .routes
        .update_stop(
            &dispatcher,
            route.id,
            a.id,
            UpdateStopRequest {
                sequence: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.sequence, 3);
}

#[tokio::test]
async fn test_driver_sees_only_own_routes() {
    let (state, store) = app();
    let (own, driver) = seed_route(&store, "N-1", "north").await;
    let (other, other_driver) = seed_route(&store, "N-2", "north").await;
    let actor = driver_actor(&store, &driver).await;

    // Asking for another driver's routes still returns only their own.
    let listed = state
        .routes
        .list_routes(
            &actor,
            RouteQuery {
                driver_id: Some(other_driver.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, own.id);

    assert!(state.routes.get_route(&actor, own.id).await.is_ok());
    let err = state.routes.get_route(&actor, other.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let all = state
        .routes
        .list_routes(&staff(Role::Dispatcher), RouteQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_customers_cannot_list_routes() {
    let (state, store) = app();
    let customer = seed_customer(&store).await;
    let actor = customer_actor(&store, &customer).await;
    let err = state
        .routes
        .list_routes(&actor, RouteQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_driver_progress_updates_stop_and_shipment() {
    let (state, store) = app();
    let customer = seed_customer(&store).await;
    let (route, driver) = seed_route(&store, "S-1", "south").await;
    let shipment = seed_shipment(&store, customer.id).await;
    let stop = place_on_route(&store, &route, &shipment, 1).await;
    let actor = driver_actor(&store, &driver).await;

    let arrived = state
        .routes
        .update_stop(
            &actor,
            route.id,
            stop.id,
            UpdateStopRequest {
                status: Some(StopStatus::Arrived),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(arrived.actual_arrival.is_some());

    let err = state
        .routes
        .update_stop(
            &actor,
            route.id,
            stop.id,
            UpdateStopRequest {
                sequence: Some(4),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    state
        .routes
        .update_stop(
            &actor,
            route.id,
            stop.id,
            UpdateStopRequest {
                status: Some(StopStatus::Completed),
                notes: Some("signed by reception".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let delivered = store.get_shipment(shipment.id).await.unwrap().unwrap();
    assert_eq!(delivered.status, ShipmentStatus::Delivered);
}

#[tokio::test]
async fn test_driver_cannot_touch_other_drivers_stops() {
    let (state, store) = app();
    let customer = seed_customer(&store).await;
    let (route, _) = seed_route(&store, "S-1", "south").await;
    let (_, stranger) = seed_route(&store, "S-2", "south").await;
    let stop = place_on_route(&store, &route, &seed_shipment(&store, customer.id).await, 1).await;
    let actor = driver_actor(&store, &stranger).await;

    let err = state
        .routes
        .update_stop(
            &actor,
            route.id,
            stop.id,
            UpdateStopRequest {
                status: Some(StopStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_failing_a_delivered_stop_is_rejected() {
    let (state, store) = app();
    let dispatcher = staff(Role::Dispatcher);
    let customer = seed_customer(&store).await;
    let (route, _) = seed_route(&store, "E-1", "east").await;
    let shipment = seed_shipment(&store, customer.id).await;
    let stop = place_on_route(&store, &route, &shipment, 1).await;

    state
        .shipments
        .record_scan(
            &dispatcher,
            shipment.id,
            RecordScanRequest {
                scan_type: ScanType::Delivered,
                location: "front door".into(),
                scanned_at: Some(Utc::now()),
            },
        )
        .await
        .unwrap();

    let err = state
        .routes
        .update_stop(
            &dispatcher,
            route.id,
            stop.id,
            UpdateStopRequest {
                status: Some(StopStatus::Failed),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
    let unchanged = store.get_stop(stop.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, StopStatus::Pending);
}

#[tokio::test]
async fn test_update_route_checks_new_driver() {
    let (state, store) = app();
    let dispatcher = staff(Role::Dispatcher);
    let (route, _) = seed_route(&store, "W-9", "west").await;

    let err = state
        .routes
        .update_route(
            &dispatcher,
            route.id,
            UpdateRouteRequest {
                driver_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let updated = state
        .routes
        .update_route(
            &dispatcher,
            route.id,
            UpdateRouteRequest {
                status: Some(RouteStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, RouteStatus::InProgress);
}

#[tokio::test]
async fn test_driver_scans_only_shipments_on_own_routes() {
    let (state, store) = app();
    let customer = seed_customer(&store).await;
    let (route, driver) = seed_route(&store, "N-5", "north").await;
    let on_route = seed_shipment(&store, customer.id).await;
    let elsewhere = seed_shipment(&store, customer.id).await;
    place_on_route(&store, &route, &on_route, 1).await;
    let actor = driver_actor(&store, &driver).await;

    let scan = |location: &str| RecordScanRequest {
        scan_type: ScanType::OutForDelivery,
        location: location.to_string(),
        scanned_at: None,
    };

    state
        .shipments
        .record_scan(&actor, on_route.id, scan("depot"))
        .await
        .unwrap();
    let err = state
        .shipments
        .record_scan(&actor, elsewhere.id, scan("depot"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let visible = state
        .shipments
        .list_shipments(&actor, Default::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].status, ShipmentStatus::OutForDelivery);
    assert_eq!(visible[0].last_scan_location.as_deref(), Some("depot"));
}

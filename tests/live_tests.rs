//! Live event feeds only carry what the subscriber is allowed to read.

mod common;

use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;
use uuid::Uuid;

use common::*;
use shipdesk::models::shipment::ScanType;
use shipdesk::models::user::Role;
use shipdesk::services::notification::{LiveEvent, LiveEventKind, LiveFeed};
use shipdesk::services::routes::UpdateStopRequest;
use shipdesk::services::shipments::{CreateShipmentRequest, RecordScanRequest};

fn new_shipment(tracking_id: &str, customer_id: Uuid) -> CreateShipmentRequest {
    CreateShipmentRequest {
        tracking_id: tracking_id.to_string(),
        customer_id,
        origin: "Depot".to_string(),
        destination: "Dock 7".to_string(),
        promised_delivery_date: Utc::now() + Duration::days(1),
        sla_risk_score: 0.9,
        is_vip: true,
    }
}

async fn next_event(feed: &mut LiveFeed) -> LiveEvent {
    tokio::time::timeout(StdDuration::from_secs(2), feed.next())
        .await
        .expect("no live event within two seconds")
        .expect("event hub closed")
}

#[tokio::test]
async fn test_customer_feed_skips_other_customers_shipments() {
    let (state, store) = app();
    let mine = seed_customer(&store).await;
    let theirs = seed_customer(&store).await;
    let actor = customer_actor(&store, &mine).await;
    let mut feed = state.events.feed(actor, state.store.clone());
    let dispatcher = staff(Role::Dispatcher);

    state
        .shipments
        .create_shipment(&dispatcher, new_shipment("OTHER-1", theirs.id))
        .await
        .unwrap();
    let own = state
        .shipments
        .create_shipment(&dispatcher, new_shipment("MINE-1", mine.id))
        .await
        .unwrap();

    let event = next_event(&mut feed).await;
    assert_eq!(event.kind, LiveEventKind::ShipmentUpdated);
    assert_eq!(event.entity_id, own.id);
    assert_eq!(event.payload["trackingId"], "MINE-1");
}

#[tokio::test]
async fn test_customer_feed_withholds_staff_only_events() {
    let (state, store) = app();
    seed_contact(&store, "shift lead", 60, true).await;
    let customer = seed_customer(&store).await;
    let shipment = seed_shipment(&store, customer.id).await;
    let actor = customer_actor(&store, &customer).await;
    let mut feed = state.events.feed(actor.clone(), state.store.clone());

    // The severe report also pages a contact; that update stays with staff.
    let reported = state
        .issues
        .report(
            &actor,
            shipdesk::services::issues::ReportIssueRequest {
                shipment_id: shipment.id,
                issue_type: shipdesk::models::issue::IssueType::Damaged,
                description: "torn box".to_string(),
                severity: 0.95,
            },
        )
        .await
        .unwrap();
    assert!(reported.escalation.is_some());
    state
        .shipments
        .record_scan(
            &staff(Role::Dispatcher),
            shipment.id,
            RecordScanRequest {
                scan_type: ScanType::PickedUp,
                location: "Depot".to_string(),
                scanned_at: None,
            },
        )
        .await
        .unwrap();

    let first = next_event(&mut feed).await;
    assert_eq!(first.kind, LiveEventKind::IssueCreated);
    let second = next_event(&mut feed).await;
    assert_eq!(second.kind, LiveEventKind::ShipmentUpdated);
    assert_eq!(second.entity_id, shipment.id);
}

#[tokio::test]
async fn test_driver_feed_carries_only_own_routes() {
    let (state, store) = app();
    let customer = seed_customer(&store).await;
    let (own_route, driver) = seed_route(&store, "N-1", "north").await;
    let (other_route, _) = seed_route(&store, "N-2", "north").await;
    let own_stop = place_on_route(&store, &own_route, &seed_shipment(&store, customer.id).await, 1).await;
    let other_stop = place_on_route(&store, &other_route, &seed_shipment(&store, customer.id).await, 1).await;
    let actor = driver_actor(&store, &driver).await;
    let mut feed = state.events.feed(actor, state.store.clone());
    let dispatcher = staff(Role::Dispatcher);

    let note = || UpdateStopRequest {
        notes: Some("gate code 4411".into()),
        ..Default::default()
    };
    state
        .routes
        .update_stop(&dispatcher, other_route.id, other_stop.id, note())
        .await
        .unwrap();
    state
        .shipments
        .record_scan(
            &dispatcher,
            other_stop.shipment_id,
            RecordScanRequest {
                scan_type: ScanType::PickedUp,
                location: "Depot".to_string(),
                scanned_at: None,
            },
        )
        .await
        .unwrap();
    state
        .shipments
        .record_scan(
            &dispatcher,
            own_stop.shipment_id,
            RecordScanRequest {
                scan_type: ScanType::PickedUp,
                location: "Depot".to_string(),
                scanned_at: None,
            },
        )
        .await
        .unwrap();
    state
        .routes
        .update_stop(&dispatcher, own_route.id, own_stop.id, note())
        .await
        .unwrap();

    let first = next_event(&mut feed).await;
    assert_eq!(first.kind, LiveEventKind::ShipmentUpdated);
    assert_eq!(first.entity_id, own_stop.shipment_id);
    let second = next_event(&mut feed).await;
    assert_eq!(second.kind, LiveEventKind::StopUpdated);
    assert_eq!(second.entity_id, own_stop.id);
}

#[tokio::test]
async fn test_staff_feed_sees_everything() {
    let (state, store) = app();
    let customer = seed_customer(&store).await;
    let mut feed = state.events.feed(staff(Role::Dispatcher), state.store.clone());

    let shipment = state
        .shipments
        .create_shipment(&staff(Role::Manager), new_shipment("ANY-1", customer.id))
        .await
        .unwrap();

    let event = next_event(&mut feed).await;
    assert_eq!(event.entity_id, shipment.id);
}

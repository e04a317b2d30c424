//! Fixtures shared by the integration tests. Everything runs against the
//! in-memory store.
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use shipdesk::config::Config;
use shipdesk::models::escalation::{ContactChannel, EscalationContact};
use shipdesk::models::fleet::{Driver, Vehicle};
use shipdesk::models::route::{Route, RouteStop};
use shipdesk::models::shipment::Shipment;
use shipdesk::models::user::{Customer, Role};
use shipdesk::repository::{InMemoryStore, Store};
use shipdesk::services::access::Actor;
use shipdesk::services::AppState;

pub const JWT_SECRET: &str = "integration-secret";

pub fn test_config() -> Config {
    let builder = Config::defaults()
        .unwrap()
        .set_override("database_url", "postgres://unused/shipdesk")
        .unwrap()
        .set_override("jwt_secret", JWT_SECRET)
        .unwrap();
    Config::from_builder(builder).unwrap()
}

pub fn app() -> (Arc<AppState>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let state = Arc::new(AppState::new(store.clone(), test_config()));
    (state, store)
}

pub fn staff(role: Role) -> Actor {
    Actor::new(Uuid::new_v4(), role)
}

pub async fn driver_actor(store: &InMemoryStore, driver: &Driver) -> Actor {
    Actor::resolve(store, driver.user_id, Role::Driver).await.unwrap()
}

pub async fn customer_actor(store: &InMemoryStore, customer: &Customer) -> Actor {
    Actor::resolve(store, customer.user_id, Role::Customer)
        .await
        .unwrap()
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
}

pub async fn seed_customer(store: &InMemoryStore) -> Customer {
    let customer = Customer::new(Uuid::new_v4(), "Acme Retail");
    store.insert_customer(&customer).await.unwrap();
    customer
}

pub async fn seed_driver(store: &InMemoryStore, region: &str) -> Driver {
    let driver = Driver::new(Uuid::new_v4(), "Dana Driver", region);
    store.insert_driver(&driver).await.unwrap();
    driver
}

pub async fn seed_vehicle(store: &InMemoryStore) -> Vehicle {
    let vehicle = Vehicle::new(&format!("VAN-{}", &Uuid::new_v4().to_string()[..6]), 1200.0);
    store.insert_vehicle(&vehicle).await.unwrap();
    vehicle
}

pub async fn seed_shipment(store: &InMemoryStore, customer_id: Uuid) -> Shipment {
    let shipment = Shipment::new(
        &format!("TRK-{}", Uuid::new_v4().simple()),
        customer_id,
        Utc::now() + chrono::Duration::days(1),
    );
    store.insert_shipment(&shipment).await.unwrap();
    shipment
}

/// A route in `region` with its own driver and vehicle.
pub async fn seed_route(store: &InMemoryStore, code: &str, region: &str) -> (Route, Driver) {
    let driver = seed_driver(store, region).await;
    let vehicle = seed_vehicle(store).await;
    let route = Route::new(code, driver.id, vehicle.id, region, day());
    store.insert_route(&route).await.unwrap();
    (route, driver)
}

pub async fn place_on_route(store: &InMemoryStore, route: &Route, shipment: &Shipment, sequence: i32) -> RouteStop {
    let stop = RouteStop::new(route.id, shipment.id, sequence);
    store.insert_stop(&stop).await.unwrap();
    stop
}

pub async fn seed_contact(store: &InMemoryStore, name: &str, timeout_seconds: i32, active: bool) -> EscalationContact {
    let mut contact = EscalationContact::new(Uuid::new_v4(), name, ContactChannel::Sms, timeout_seconds);
    contact.active = active;
    store.insert_contact(&contact).await.unwrap();
    contact
}

/// Marks a stored shipment delivered at `delivered_at`.
pub async fn deliver(store: &InMemoryStore, shipment: &mut Shipment, promised: DateTime<Utc>, delivered_at: DateTime<Utc>) {
    shipment.promised_delivery_date = promised;
    shipment.status = shipdesk::models::shipment::ShipmentStatus::Delivered;
    shipment.updated_at = delivered_at;
    store.update_shipment(shipment).await.unwrap();
}

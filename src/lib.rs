pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod services;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Metrics
        .route("/metrics/overview", get(handlers::metrics::overview))
        .route(
            "/metrics/definitions",
            get(handlers::metrics::list_definitions).post(handlers::metrics::create_definition),
        )
        .route(
            "/metrics/definitions/:metric_id",
            get(handlers::metrics::get_definition),
        )
        .route(
            "/metrics/snapshots/generate/:metric_id",
            post(handlers::metrics::generate_snapshot),
        )
        .route(
            "/metrics/snapshots/:metric_id",
            get(handlers::metrics::list_snapshots),
        )
        // Routes and stops
        .route(
            "/routes",
            get(handlers::routes::list_routes).post(handlers::routes::create_route),
        )
        .route(
            "/routes/:id",
            get(handlers::routes::get_route).patch(handlers::routes::update_route),
        )
        .route(
            "/routes/:id/stops",
            get(handlers::routes::list_stops).post(handlers::routes::create_stop),
        )
        .route(
            "/routes/:id/stops/:stop_id",
            patch(handlers::routes::update_stop),
        )
        // Shipments
        .route(
            "/shipments",
            get(handlers::shipments::list_shipments).post(handlers::shipments::create_shipment),
        )
        .route(
            "/shipments/track/:tracking_id",
            get(handlers::shipments::track_shipment),
        )
        .route("/shipments/:id", get(handlers::shipments::get_shipment))
        .route(
            "/shipments/:id/scans",
            get(handlers::shipments::list_scans).post(handlers::shipments::record_scan),
        )
        // Issues
        .route(
            "/issues",
            get(handlers::issues::list_issues).post(handlers::issues::report_issue),
        )
        .route(
            "/issues/:id",
            get(handlers::issues::get_issue).patch(handlers::issues::update_issue),
        )
        // Escalations
        .route(
            "/escalations/contacts",
            get(handlers::escalations::list_contacts).post(handlers::escalations::create_contact),
        )
        .route(
            "/escalations/contacts/:id",
            patch(handlers::escalations::update_contact),
        )
        .route("/escalations/:issue_id", get(handlers::escalations::get_status))
        .route(
            "/escalations/:issue_id/acknowledge",
            post(handlers::escalations::acknowledge),
        )
        .route(
            "/escalations/:issue_id/advance",
            post(handlers::escalations::advance),
        )
        // Fleet
        .route(
            "/drivers",
            get(handlers::fleet::list_drivers).post(handlers::fleet::create_driver),
        )
        .route(
            "/vehicles",
            get(handlers::fleet::list_vehicles).post(handlers::fleet::create_vehicle),
        )
        .route("/customers", post(handlers::fleet::create_customer))
        // Live updates and health
        .route("/ws", get(handlers::live::live_updates))
        .route("/health", get(handlers::health::health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

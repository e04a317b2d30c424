pub mod access;
pub mod escalation;
pub mod fleet;
pub mod issues;
pub mod metrics;
pub mod notification;
pub mod routes;
pub mod shipments;

use crate::config::Config;
use crate::repository::Store;
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub events: Arc<notification::NotificationService>,
    pub metrics: Arc<metrics::MetricsService>,
    pub escalation: Arc<escalation::EscalationService>,
    pub routes: Arc<routes::RouteService>,
    pub shipments: Arc<shipments::ShipmentService>,
    pub issues: Arc<issues::IssueService>,
    pub fleet: Arc<fleet::FleetService>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let events = Arc::new(notification::NotificationService::new(config.event_buffer));
        let metrics = Arc::new(metrics::MetricsService::new(
            store.clone(),
            events.clone(),
            config.sla_risk_threshold,
        ));
        let escalation = Arc::new(escalation::EscalationService::new(
            store.clone(),
            events.clone(),
            config.escalation_severity_threshold,
        ));
        let routes = Arc::new(routes::RouteService::new(store.clone(), events.clone()));
        let shipments = Arc::new(shipments::ShipmentService::new(store.clone(), events.clone()));
        let issues = Arc::new(issues::IssueService::new(
            store.clone(),
            events.clone(),
            shipments.clone(),
            escalation.clone(),
        ));
        let fleet = Arc::new(fleet::FleetService::new(store.clone()));

        Self {
            store,
            config,
            events,
            metrics,
            escalation,
            routes,
            shipments,
            issues,
            fleet,
        }
    }
}

pub mod escalations;
pub mod fleet;
pub mod health;
pub mod issues;
pub mod live;
pub mod metrics;
pub mod routes;
pub mod shipments;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use super::access::{self, Actor};
use crate::models::route::Route;
use crate::models::shipment::Shipment;
use crate::models::user::Role;
use crate::repository::{scope, Store};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveEventKind {
    #[serde(rename = "metric.snapshot.created")]
    MetricSnapshotCreated,
    #[serde(rename = "escalation.updated")]
    EscalationUpdated,
    #[serde(rename = "route.updated")]
    RouteUpdated,
    #[serde(rename = "stop.updated")]
    StopUpdated,
    #[serde(rename = "shipment.updated")]
    ShipmentUpdated,
    #[serde(rename = "issue.created")]
    IssueCreated,
    #[serde(rename = "issue.updated")]
    IssueUpdated,
}

/// Who besides operations staff may see an event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Audience {
    #[default]
    Staff,
    /// The owning customer.
    Customer { customer_id: Uuid },
    /// The owning customer and any driver carrying the shipment.
    Shipment { shipment_id: Uuid, customer_id: Uuid },
    /// The driver assigned to the route.
    Route { driver_id: Uuid },
}

/// Dashboard invalidation message pushed over the websocket.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub kind: LiveEventKind,
    pub entity_id: Uuid,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
    #[serde(skip)]
    pub audience: Audience,
}

impl LiveEvent {
    pub fn new<T: Serialize>(kind: LiveEventKind, entity_id: Uuid, payload: &T) -> Self {
        Self {
            kind,
            entity_id,
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
            emitted_at: Utc::now(),
            audience: Audience::Staff,
        }
    }

    pub fn for_customer(mut self, customer_id: Uuid) -> Self {
        self.audience = Audience::Customer { customer_id };
        self
    }

    pub fn for_shipment(mut self, shipment: &Shipment) -> Self {
        self.audience = Audience::Shipment {
            shipment_id: shipment.id,
            customer_id: shipment.customer_id,
        };
        self
    }

    pub fn for_route(mut self, route: &Route) -> Self {
        self.audience = Audience::Route {
            driver_id: route.driver_id,
        };
        self
    }
}

/// One subscriber's view of the hub, narrowed to what its actor may see.
pub struct LiveFeed {
    receiver: broadcast::Receiver<LiveEvent>,
    actor: Actor,
    store: Arc<dyn Store>,
}

impl LiveFeed {
    /// Next visible event; `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<LiveEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %self.actor.user_id, skipped, "live subscriber lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            };
            match self.visible(&event).await {
                Ok(true) => return Some(event),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, kind = ?event.kind, entity_id = %event.entity_id, "could not scope live event, withheld");
                }
            }
        }
    }

    async fn visible(&self, event: &LiveEvent) -> anyhow::Result<bool> {
        let on_driver_route = match (&event.audience, self.actor.role, self.actor.driver_id) {
            (Audience::Shipment { shipment_id, .. }, Role::Driver, Some(driver_id)) => {
                scope::driver_shipment_ids(self.store.as_ref(), driver_id)
                    .await?
                    .contains(shipment_id)
            }
            _ => false,
        };
        Ok(access::can_receive_event(&self.actor, &event.audience, on_driver_route))
    }
}

/// Fan-out of write events to live subscribers. Fire and forget: events
/// published with nobody listening, or to a lagging subscriber, are lost.
pub struct NotificationService {
    sender: broadcast::Sender<LiveEvent>,
    connections: DashMap<Uuid, DateTime<Utc>>,
}

impl NotificationService {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            connections: DashMap::new(),
        }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: LiveEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(kind = ?event.kind, entity_id = %event.entity_id, "no live subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    /// Subscribes on behalf of `actor`; events it may not see are skipped.
    pub fn feed(&self, actor: Actor, store: Arc<dyn Store>) -> LiveFeed {
        LiveFeed {
            receiver: self.sender.subscribe(),
            actor,
            store,
        }
    }

    pub fn register_connection(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.insert(id, Utc::now());
        id
    }

    pub fn unregister_connection(&self, id: Uuid) {
        self.connections.remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

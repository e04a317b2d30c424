//! Who may do what. One check per operation; services call `ensure`
//! with the relevant check instead of branching on roles inline.

use uuid::Uuid;

use super::notification::Audience;
use crate::error::{ApiError, ApiResult};
use crate::models::route::Route;
use crate::models::shipment::Shipment;
use crate::models::user::Role;
use crate::repository::Store;

/// The authenticated caller with their role profile resolved.
#[derive(Clone, Debug)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    /// Set when the caller is a driver with a driver profile.
    pub driver_id: Option<Uuid>,
    /// Set when the caller is a customer with a customer account.
    pub customer_id: Option<Uuid>,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            driver_id: None,
            customer_id: None,
        }
    }

    pub async fn resolve(store: &dyn Store, user_id: Uuid, role: Role) -> anyhow::Result<Self> {
        let mut actor = Actor::new(user_id, role);
        match role {
            Role::Driver => actor.driver_id = store.driver_for_user(user_id).await?.map(|d| d.id),
            Role::Customer => {
                actor.customer_id = store.customer_for_user(user_id).await?.map(|c| c.id)
            }
            _ => {}
        }
        Ok(actor)
    }
}

pub fn ensure(allowed: bool, reason: &str) -> ApiResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden(reason))
    }
}

fn drives(actor: &Actor, route: &Route) -> bool {
    actor.role == Role::Driver && actor.driver_id == Some(route.driver_id)
}

pub fn can_view_metrics(actor: &Actor) -> bool {
    actor.role.is_planner()
}

pub fn can_generate_snapshot(actor: &Actor) -> bool {
    actor.role.is_manager()
}

pub fn can_define_metrics(actor: &Actor) -> bool {
    actor.role.is_manager()
}

pub fn can_plan_routes(actor: &Actor) -> bool {
    actor.role.is_planner()
}

pub fn can_list_routes(actor: &Actor) -> bool {
    actor.role.is_planner() || actor.role == Role::Driver
}

pub fn can_view_route(actor: &Actor, route: &Route) -> bool {
    actor.role.is_planner() || drives(actor, route)
}

pub fn can_update_stop(actor: &Actor, route: &Route) -> bool {
    actor.role.is_planner() || drives(actor, route)
}

pub fn can_manage_shipments(actor: &Actor) -> bool {
    actor.role.is_planner()
}

/// `on_driver_route` is whether the shipment sits on one of the caller's
/// routes; it only matters for drivers.
pub fn can_view_shipment(actor: &Actor, shipment: &Shipment, on_driver_route: bool) -> bool {
    match actor.role {
        Role::Customer => actor.customer_id == Some(shipment.customer_id),
        Role::Driver => on_driver_route,
        _ => true,
    }
}

pub fn can_record_scan(actor: &Actor, on_driver_route: bool) -> bool {
    actor.role.is_planner() || (actor.role == Role::Driver && on_driver_route)
}

pub fn can_report_issue(actor: &Actor, shipment: &Shipment, on_driver_route: bool) -> bool {
    can_view_shipment(actor, shipment, on_driver_route)
}

pub fn can_list_issues(actor: &Actor) -> bool {
    actor.role.is_planner() || actor.role == Role::Customer
}

pub fn can_triage_issues(actor: &Actor) -> bool {
    actor.role.is_planner()
}

pub fn can_manage_contacts(actor: &Actor) -> bool {
    actor.role.is_manager()
}

pub fn can_acknowledge_escalation(actor: &Actor) -> bool {
    actor.role.is_planner()
}

pub fn can_advance_escalation(actor: &Actor) -> bool {
    actor.role.is_manager()
}

pub fn can_manage_fleet(actor: &Actor) -> bool {
    actor.role.is_planner()
}

pub fn can_manage_customers(actor: &Actor) -> bool {
    actor.role.is_manager()
}

/// Live events follow the read rules: staff see everything, customers
/// their own shipments and issues, drivers their own routes and the
/// shipments on them.
pub fn can_receive_event(actor: &Actor, audience: &Audience, on_driver_route: bool) -> bool {
    if actor.role.is_planner() {
        return true;
    }
    match (actor.role, audience) {
        (Role::Customer, Audience::Customer { customer_id })
        | (Role::Customer, Audience::Shipment { customer_id, .. }) => {
            actor.customer_id == Some(*customer_id)
        }
        (Role::Driver, Audience::Shipment { .. }) => on_driver_route,
        (Role::Driver, Audience::Route { driver_id }) => actor.driver_id == Some(*driver_id),
        _ => false,
    }
}

//! Resolves a metric dimension into the set of shipments it covers.
//!
//! Region, route and driver scopes all join Route → RouteStop → Shipment;
//! this is the only place that join is written.

use anyhow::Result;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{RouteFilter, Store};
use crate::models::metric::Dimension;

/// `Ok(None)` for the global scope (no restriction). Otherwise the
/// deduplicated shipment ids on the matching routes, possibly empty.
pub async fn shipment_ids_for(store: &dyn Store, dimension: &Dimension) -> Result<Option<Vec<Uuid>>> {
    let route_ids: Vec<Uuid> = match dimension {
        Dimension::Global => return Ok(None),
        Dimension::Route(route_id) => match store.get_route(*route_id).await? {
            Some(route) => vec![route.id],
            None => Vec::new(),
        },
        Dimension::Region(region) => route_ids(
            store,
            RouteFilter {
                region: Some(region.clone()),
                ..Default::default()
            },
        )
        .await?,
        Dimension::Driver(driver_id) => route_ids(
            store,
            RouteFilter {
                driver_id: Some(*driver_id),
                ..Default::default()
            },
        )
        .await?,
    };

    if route_ids.is_empty() {
        return Ok(Some(Vec::new()));
    }

    let shipment_ids: BTreeSet<Uuid> = store
        .list_stops(&route_ids)
        .await?
        .into_iter()
        .map(|stop| stop.shipment_id)
        .collect();

    Ok(Some(shipment_ids.into_iter().collect()))
}

async fn route_ids(store: &dyn Store, filter: RouteFilter) -> Result<Vec<Uuid>> {
    Ok(store
        .list_routes(&filter)
        .await?
        .into_iter()
        .map(|route| route.id)
        .collect())
}

/// Shipments on any route assigned to the driver.
pub async fn driver_shipment_ids(store: &dyn Store, driver_id: Uuid) -> Result<Vec<Uuid>> {
    Ok(shipment_ids_for(store, &Dimension::Driver(driver_id))
        .await?
        .unwrap_or_default())
}

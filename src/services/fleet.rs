use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::access::{self, Actor};
use crate::error::{ApiError, ApiResult};
use crate::models::fleet::{Driver, Vehicle};
use crate::models::user::Customer;
use crate::repository::Store;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDriverRequest {
    pub user_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub home_region: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVehicleRequest {
    pub plate: String,
    pub capacity_kg: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub user_id: Uuid,
    pub name: String,
}

/// Drivers, vehicles and customer accounts.
pub struct FleetService {
    store: Arc<dyn Store>,
}

impl FleetService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_driver(&self, actor: &Actor, request: CreateDriverRequest) -> ApiResult<Driver> {
        access::ensure(access::can_manage_fleet(actor), "only dispatchers manage the fleet")?;

        if request.name.trim().is_empty() {
            return Err(ApiError::bad_request("driver name is required"));
        }
        if self.store.driver_for_user(request.user_id).await?.is_some() {
            return Err(ApiError::bad_request("user already has a driver profile"));
        }

        let mut driver = Driver::new(request.user_id, request.name.trim(), request.home_region.trim());
        driver.phone = request.phone;
        self.store.insert_driver(&driver).await?;

        tracing::info!(driver_id = %driver.id, region = %driver.home_region, "driver added");
        Ok(driver)
    }

    pub async fn list_drivers(&self, actor: &Actor) -> ApiResult<Vec<Driver>> {
        access::ensure(access::can_manage_fleet(actor), "only dispatchers manage the fleet")?;
        Ok(self.store.list_drivers().await?)
    }

    pub async fn create_vehicle(&self, actor: &Actor, request: CreateVehicleRequest) -> ApiResult<Vehicle> {
        access::ensure(access::can_manage_fleet(actor), "only dispatchers manage the fleet")?;

        let plate = request.plate.trim();
        if plate.is_empty() {
            return Err(ApiError::bad_request("plate is required"));
        }
        if request.capacity_kg <= 0.0 {
            return Err(ApiError::bad_request("capacityKg must be positive"));
        }
        if self.store.find_vehicle_by_plate(plate).await?.is_some() {
            return Err(ApiError::bad_request(format!("plate {} already registered", plate)));
        }

        let vehicle = Vehicle::new(plate, request.capacity_kg);
        self.store.insert_vehicle(&vehicle).await?;

        tracing::info!(vehicle_id = %vehicle.id, plate = %vehicle.plate, "vehicle added");
        Ok(vehicle)
    }

    pub async fn list_vehicles(&self, actor: &Actor) -> ApiResult<Vec<Vehicle>> {
        access::ensure(access::can_manage_fleet(actor), "only dispatchers manage the fleet")?;
        Ok(self.store.list_vehicles().await?)
    }

    pub async fn create_customer(&self, actor: &Actor, request: CreateCustomerRequest) -> ApiResult<Customer> {
        access::ensure(access::can_manage_customers(actor), "only managers open customer accounts")?;

        if request.name.trim().is_empty() {
            return Err(ApiError::bad_request("customer name is required"));
        }
        if self.store.customer_for_user(request.user_id).await?.is_some() {
            return Err(ApiError::bad_request("user already has a customer account"));
        }

        let customer = Customer::new(request.user_id, request.name.trim());
        self.store.insert_customer(&customer).await?;

        tracing::info!(customer_id = %customer.id, "customer account opened");
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::repository::InMemoryStore;

    #[tokio::test]
    async fn test_vehicle_plate_unique() {
        let svc = FleetService::new(Arc::new(InMemoryStore::new()));
        let dispatcher = Actor::new(Uuid::new_v4(), Role::Dispatcher);
        let request = || CreateVehicleRequest {
            plate: "KX-101".into(),
            capacity_kg: 900.0,
        };

        svc.create_vehicle(&dispatcher, request()).await.unwrap();
        let err = svc.create_vehicle(&dispatcher, request()).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(svc.list_vehicles(&dispatcher).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_driver_profile_per_user() {
        let svc = FleetService::new(Arc::new(InMemoryStore::new()));
        let dispatcher = Actor::new(Uuid::new_v4(), Role::Dispatcher);
        let user_id = Uuid::new_v4();
        let request = || CreateDriverRequest {
            user_id,
            name: "Sam".into(),
            phone: None,
            home_region: "north".into(),
        };

        svc.create_driver(&dispatcher, request()).await.unwrap();
        assert!(matches!(
            svc.create_driver(&dispatcher, request()).await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_customers_opened_by_managers_only() {
        let svc = FleetService::new(Arc::new(InMemoryStore::new()));
        let request = || CreateCustomerRequest {
            user_id: Uuid::new_v4(),
            name: "Acme".into(),
        };

        let err = svc
            .create_customer(&Actor::new(Uuid::new_v4(), Role::Dispatcher), request())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        svc.create_customer(&Actor::new(Uuid::new_v4(), Role::Manager), request())
            .await
            .unwrap();
    }
}

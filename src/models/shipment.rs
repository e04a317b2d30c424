use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Failed,
}

text_enum!(ShipmentStatus {
    Pending => "pending",
    PickedUp => "picked_up",
    InTransit => "in_transit",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Failed => "failed",
});

#[derive(Debug, Error, PartialEq, Eq)]
#[error("shipment cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ShipmentStatus,
    pub to: ShipmentStatus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanRejected {
    #[error("shipment is already delivered and takes no further scans")]
    AlreadyDelivered,
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl ShipmentStatus {
    fn rank(&self) -> u8 {
        match self {
            ShipmentStatus::Pending => 0,
            ShipmentStatus::PickedUp => 1,
            ShipmentStatus::InTransit => 2,
            ShipmentStatus::OutForDelivery => 3,
            ShipmentStatus::Delivered | ShipmentStatus::Failed => 4,
        }
    }

    /// Statuses only move forward. A failed delivery may go back out
    /// (or back to the depot) for another attempt; delivered is final.
    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            ShipmentStatus::Delivered => false,
            ShipmentStatus::Failed => matches!(
                next,
                ShipmentStatus::InTransit | ShipmentStatus::OutForDelivery
            ),
            _ => next.rank() > self.rank(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: Uuid,
    pub tracking_id: String,
    pub customer_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub status: ShipmentStatus,
    pub promised_delivery_date: DateTime<Utc>,
    pub last_scan_location: Option<String>,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub sla_risk_score: f64,
    pub is_vip: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(tracking_id: &str, customer_id: Uuid, promised_delivery_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tracking_id: tracking_id.to_string(),
            customer_id,
            origin: String::new(),
            destination: String::new(),
            status: ShipmentStatus::Pending,
            promised_delivery_date,
            last_scan_location: None,
            last_scan_at: None,
            sla_risk_score: 0.0,
            is_vip: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Delivered no later than promised. `updated_at` is the delivery time:
    /// `apply_scan` refuses every scan once a shipment is delivered.
    pub fn delivered_on_time(&self) -> bool {
        self.status == ShipmentStatus::Delivered && self.updated_at <= self.promised_delivery_date
    }

    pub fn transition_to(
        &mut self,
        next: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch(at);
        Ok(())
    }

    /// `updated_at` never moves backwards.
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(at);
    }

    /// Fold a scan into the shipment. Status moves only when the scan type
    /// implies one; a backdated scan does not replace the last-seen position.
    pub fn apply_scan(&mut self, scan: &ShipmentScan) -> Result<(), ScanRejected> {
        if self.status == ShipmentStatus::Delivered {
            return Err(ScanRejected::AlreadyDelivered);
        }
        if let Some(next) = scan.scan_type.resulting_status() {
            self.transition_to(next, scan.scanned_at)?;
        }
        if self.last_scan_at.map_or(true, |last| scan.scanned_at >= last) {
            self.last_scan_location = Some(scan.location.clone());
            self.last_scan_at = Some(scan.scanned_at);
        }
        self.touch(scan.scanned_at);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    PickedUp,
    InTransit,
    ArrivedAtFacility,
    OutForDelivery,
    Delivered,
    FailedAttempt,
    Exception,
}

text_enum!(ScanType {
    PickedUp => "picked_up",
    InTransit => "in_transit",
    ArrivedAtFacility => "arrived_at_facility",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    FailedAttempt => "failed_attempt",
    Exception => "exception",
});

impl ScanType {
    pub fn resulting_status(&self) -> Option<ShipmentStatus> {
        match self {
            ScanType::PickedUp => Some(ShipmentStatus::PickedUp),
            ScanType::InTransit | ScanType::ArrivedAtFacility => Some(ShipmentStatus::InTransit),
            ScanType::OutForDelivery => Some(ShipmentStatus::OutForDelivery),
            ScanType::Delivered => Some(ShipmentStatus::Delivered),
            ScanType::FailedAttempt => Some(ShipmentStatus::Failed),
            ScanType::Exception => None,
        }
    }

    /// Scans that end a delivery attempt, successful or not.
    pub fn is_delivery_attempt(&self) -> bool {
        matches!(self, ScanType::Delivered | ScanType::FailedAttempt)
    }
}

/// Append-only; never updated once written.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentScan {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub scan_type: ScanType,
    pub location: String,
    pub scanned_at: DateTime<Utc>,
    pub recorded_by: Option<Uuid>,
}

impl ShipmentScan {
    pub fn new(shipment_id: Uuid, scan_type: ScanType, location: &str, scanned_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            shipment_id,
            scan_type,
            location: location.to_string(),
            scanned_at,
            recorded_by: None,
        }
    }
}

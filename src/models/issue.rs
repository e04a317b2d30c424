use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

text_enum!(IssueStatus {
    Open => "open",
    Investigating => "investigating",
    Resolved => "resolved",
    Closed => "closed",
});

impl IssueStatus {
    /// Counted by the open-issues KPI.
    pub fn is_open(&self) -> bool {
        matches!(self, IssueStatus::Open | IssueStatus::Investigating)
    }

    fn rank(&self) -> u8 {
        match self {
            IssueStatus::Open => 0,
            IssueStatus::Investigating => 1,
            IssueStatus::Resolved => 2,
            IssueStatus::Closed => 3,
        }
    }

    pub fn can_transition_to(&self, next: IssueStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Damaged,
    Lost,
    Delayed,
    WrongAddress,
    CustomerUnavailable,
    Other,
}

text_enum!(IssueType {
    Damaged => "damaged",
    Lost => "lost",
    Delayed => "delayed",
    WrongAddress => "wrong_address",
    CustomerUnavailable => "customer_unavailable",
    Other => "other",
});

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryIssue {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub reported_by: Uuid,
    pub issue_type: IssueType,
    pub description: String,
    /// 0.0 (cosmetic) to 1.0 (critical).
    pub severity: f64,
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DeliveryIssue {
    pub fn new(shipment_id: Uuid, reported_by: Uuid, issue_type: IssueType, severity: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            shipment_id,
            reported_by,
            issue_type,
            description: String::new(),
            severity,
            status: IssueStatus::Open,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Email,
    Sms,
    Phone,
    Push,
}

text_enum!(ContactChannel {
    Email => "email",
    Sms => "sms",
    Phone => "phone",
    Push => "push",
});

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationContact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub channel: ContactChannel,
    pub destination: String,
    /// How long this contact has to acknowledge before the next rung.
    pub timeout_seconds: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl EscalationContact {
    pub fn new(user_id: Uuid, name: &str, channel: ContactChannel, timeout_seconds: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            channel,
            destination: String::new(),
            timeout_seconds,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn ladder_key(&self) -> (i32, DateTime<Utc>, Uuid) {
        (self.timeout_seconds, self.created_at, self.id)
    }
}

/// Ladder order: ascending timeout, earliest created first on ties.
pub fn order_ladder(contacts: &mut [EscalationContact]) {
    contacts.sort_by_key(|c| c.ladder_key());
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationEvent {
    Triggered,
    Escalated,
    Resolved,
}

text_enum!(EscalationEvent {
    Triggered => "triggered",
    Escalated => "escalated",
    Resolved => "resolved",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMethod {
    Dashboard,
    Email,
    Sms,
    Phone,
}

text_enum!(AckMethod {
    Dashboard => "dashboard",
    Email => "email",
    Sms => "sms",
    Phone => "phone",
});

/// One notification attempt against one contact.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationLog {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub contact_id: Uuid,
    pub attempt: i32,
    pub event_type: EscalationEvent,
    pub payload: serde_json::Value,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub ack_method: Option<AckMethod>,
    pub acknowledged_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EscalationLog {
    pub fn new(
        issue_id: Uuid,
        contact_id: Uuid,
        attempt: i32,
        event_type: EscalationEvent,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            issue_id,
            contact_id,
            attempt,
            event_type,
            payload,
            acknowledged: false,
            acknowledged_at: None,
            ack_method: None,
            acknowledged_by: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    None,
    Active,
    Acknowledged,
    Resolved,
}

/// Highest attempt number among the logs, 0 when nothing was logged.
pub fn current_level(logs: &[EscalationLog]) -> i32 {
    logs.iter().map(|l| l.attempt).max().unwrap_or(0)
}

/// A resolution wins ties with the attempt it closes.
pub fn latest_log(logs: &[EscalationLog]) -> Option<&EscalationLog> {
    logs.iter()
        .max_by_key(|l| (l.attempt, l.created_at, l.event_type == EscalationEvent::Resolved))
}

pub fn derive_status(logs: &[EscalationLog]) -> EscalationStatus {
    match latest_log(logs) {
        None => EscalationStatus::None,
        Some(log) if log.event_type == EscalationEvent::Resolved => EscalationStatus::Resolved,
        Some(log) if log.acknowledged => EscalationStatus::Acknowledged,
        Some(_) => EscalationStatus::Active,
    }
}

/// The latest attempt is still waiting and its contact's timeout has run out.
pub fn is_overdue(log: &EscalationLog, contact: &EscalationContact, now: DateTime<Utc>) -> bool {
    log.event_type != EscalationEvent::Resolved
        && !log.acknowledged
        && now - log.created_at > Duration::seconds(i64::from(contact.timeout_seconds))
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationSummary {
    pub issue_id: Uuid,
    pub status: EscalationStatus,
    pub current_level: i32,
    pub current_contact_id: Option<Uuid>,
    pub overdue: bool,
    pub logs: Vec<EscalationLog>,
}

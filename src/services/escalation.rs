use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::access::{self, Actor};
use super::notification::{LiveEvent, LiveEventKind, NotificationService};
use crate::error::{ApiError, ApiResult};
use crate::models::escalation::{
    current_level, derive_status, is_overdue, latest_log, order_ladder, AckMethod, ContactChannel,
    EscalationContact, EscalationEvent, EscalationLog, EscalationStatus, EscalationSummary,
};
use crate::models::issue::DeliveryIssue;
use crate::repository::Store;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    pub user_id: Uuid,
    pub name: String,
    pub channel: ContactChannel,
    #[serde(default)]
    pub destination: String,
    pub timeout_seconds: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub channel: Option<ContactChannel>,
    pub destination: Option<String>,
    pub timeout_seconds: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    pub method: Option<AckMethod>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub reason: Option<String>,
}

/// Escalation ladder: severe issues page the fastest contact first and move
/// down the ladder by hand until someone acknowledges.
pub struct EscalationService {
    store: Arc<dyn Store>,
    events: Arc<NotificationService>,
    severity_threshold: f64,
}

impl EscalationService {
    pub fn new(store: Arc<dyn Store>, events: Arc<NotificationService>, severity_threshold: f64) -> Self {
        Self {
            store,
            events,
            severity_threshold,
        }
    }

    async fn ladder(&self) -> anyhow::Result<Vec<EscalationContact>> {
        let mut contacts = self.store.list_contacts(true).await?;
        order_ladder(&mut contacts);
        Ok(contacts)
    }

    fn publish(&self, issue_id: Uuid, log: &EscalationLog) {
        self.events
            .publish(LiveEvent::new(LiveEventKind::EscalationUpdated, issue_id, log));
    }

    /// Starts the ladder for a freshly reported issue. Returns the first log,
    /// or `None` when the issue is below the threshold or nobody is on call.
    pub async fn trigger(&self, issue: &DeliveryIssue) -> anyhow::Result<Option<EscalationLog>> {
        if issue.severity < self.severity_threshold {
            return Ok(None);
        }

        let Some(contact) = self.ladder().await?.into_iter().next() else {
            tracing::warn!(
                issue_id = %issue.id,
                severity = issue.severity,
                "severe issue reported but no active escalation contacts"
            );
            return Ok(None);
        };

        let log = EscalationLog::new(
            issue.id,
            contact.id,
            1,
            EscalationEvent::Triggered,
            json!({
                "reason": "severity_threshold",
                "issueType": issue.issue_type,
                "description": issue.description,
                "severity": issue.severity,
            }),
        );
        self.store.insert_escalation_log(&log).await?;

        tracing::info!(
            issue_id = %issue.id,
            contact_id = %contact.id,
            channel = %contact.channel,
            "escalation triggered"
        );
        self.publish(issue.id, &log);
        Ok(Some(log))
    }

    pub async fn acknowledge(
        &self,
        actor: &Actor,
        issue_id: Uuid,
        request: AcknowledgeRequest,
    ) -> ApiResult<EscalationLog> {
        access::ensure(
            access::can_acknowledge_escalation(actor),
            "escalations are acknowledged by operations staff",
        )?;

        let logs = self.store.list_escalation_logs(issue_id).await?;
        let mut latest = latest_log(&logs)
            .cloned()
            .ok_or_else(|| ApiError::not_found("escalation"))?;
        if latest.acknowledged {
            return Err(ApiError::bad_request("escalation already acknowledged"));
        }
        if latest.event_type == EscalationEvent::Resolved {
            return Err(ApiError::bad_request("escalation already resolved"));
        }

        latest.acknowledged = true;
        latest.acknowledged_at = Some(Utc::now());
        latest.ack_method = Some(request.method.unwrap_or(AckMethod::Dashboard));
        latest.acknowledged_by = Some(actor.user_id);
        self.store.update_escalation_log(&latest).await?;

        tracing::info!(issue_id = %issue_id, attempt = latest.attempt, user_id = %actor.user_id, "escalation acknowledged");
        self.publish(issue_id, &latest);
        Ok(latest)
    }

    /// Pages the next contact in the ladder after the one currently paged.
    /// The ladder stops once someone has acknowledged.
    pub async fn advance(&self, actor: &Actor, issue_id: Uuid, request: AdvanceRequest) -> ApiResult<EscalationLog> {
        access::ensure(
            access::can_advance_escalation(actor),
            "only managers advance escalations",
        )?;

        let logs = self.store.list_escalation_logs(issue_id).await?;
        let latest = latest_log(&logs).ok_or_else(|| ApiError::not_found("escalation"))?;
        match derive_status(&logs) {
            EscalationStatus::Resolved => {
                return Err(ApiError::bad_request("escalation already resolved"))
            }
            EscalationStatus::Acknowledged => {
                return Err(ApiError::bad_request("escalation already acknowledged"))
            }
            _ => {}
        }

        let level = current_level(&logs);
        let ladder = self.ladder().await?;
        let next = match ladder.iter().position(|c| c.id == latest.contact_id) {
            Some(position) => ladder.get(position + 1),
            // Current contact was deactivated; fall back to the rung by level.
            None => ladder.get(level as usize),
        }
        .ok_or_else(|| ApiError::bad_request("escalation ladder exhausted"))?;

        let log = EscalationLog::new(
            issue_id,
            next.id,
            level + 1,
            EscalationEvent::Escalated,
            json!({
                "reason": request.reason.unwrap_or_else(|| "manual".to_string()),
                "previousContactId": latest.contact_id,
            }),
        );
        self.store.insert_escalation_log(&log).await?;

        tracing::info!(issue_id = %issue_id, attempt = log.attempt, contact_id = %next.id, "escalation advanced");
        self.publish(issue_id, &log);
        Ok(log)
    }

    /// Closes the ladder for an issue. No-op when it never escalated or is
    /// already resolved.
    pub async fn resolve(&self, issue_id: Uuid) -> anyhow::Result<Option<EscalationLog>> {
        let logs = self.store.list_escalation_logs(issue_id).await?;
        let Some(latest) = latest_log(&logs) else {
            return Ok(None);
        };
        if latest.event_type == EscalationEvent::Resolved {
            return Ok(None);
        }

        let log = EscalationLog::new(
            issue_id,
            latest.contact_id,
            current_level(&logs),
            EscalationEvent::Resolved,
            json!({ "reason": "issue_resolved" }),
        );
        self.store.insert_escalation_log(&log).await?;

        tracing::info!(issue_id = %issue_id, attempt = log.attempt, "escalation resolved");
        self.publish(issue_id, &log);
        Ok(Some(log))
    }

    pub async fn status(&self, actor: &Actor, issue_id: Uuid) -> ApiResult<EscalationSummary> {
        access::ensure(access::can_triage_issues(actor), "escalations are limited to operations staff")?;

        if self.store.get_issue(issue_id).await?.is_none() {
            return Err(ApiError::not_found("issue"));
        }

        let logs = self.store.list_escalation_logs(issue_id).await?;
        let latest = latest_log(&logs).cloned();

        let overdue = match &latest {
            Some(log) => match self.store.get_contact(log.contact_id).await? {
                Some(contact) => is_overdue(log, &contact, Utc::now()),
                None => false,
            },
            None => false,
        };

        Ok(EscalationSummary {
            issue_id,
            status: derive_status(&logs),
            current_level: current_level(&logs),
            current_contact_id: latest.map(|l| l.contact_id),
            overdue,
            logs,
        })
    }

    pub async fn create_contact(&self, actor: &Actor, request: CreateContactRequest) -> ApiResult<EscalationContact> {
        access::ensure(access::can_manage_contacts(actor), "only managers manage escalation contacts")?;

        if request.timeout_seconds <= 0 {
            return Err(ApiError::bad_request("timeoutSeconds must be positive"));
        }
        if request.name.trim().is_empty() {
            return Err(ApiError::bad_request("contact name is required"));
        }

        let mut contact = EscalationContact::new(
            request.user_id,
            request.name.trim(),
            request.channel,
            request.timeout_seconds,
        );
        contact.destination = request.destination;
        self.store.insert_contact(&contact).await?;

        tracing::info!(contact_id = %contact.id, timeout_seconds = contact.timeout_seconds, "escalation contact added");
        Ok(contact)
    }

    pub async fn list_contacts(&self, actor: &Actor) -> ApiResult<Vec<EscalationContact>> {
        access::ensure(access::can_manage_contacts(actor), "only managers manage escalation contacts")?;
        let mut contacts = self.store.list_contacts(false).await?;
        order_ladder(&mut contacts);
        Ok(contacts)
    }

    pub async fn update_contact(
        &self,
        actor: &Actor,
        contact_id: Uuid,
        request: UpdateContactRequest,
    ) -> ApiResult<EscalationContact> {
        access::ensure(access::can_manage_contacts(actor), "only managers manage escalation contacts")?;

        let mut contact = self
            .store
            .get_contact(contact_id)
            .await?
            .ok_or_else(|| ApiError::not_found("escalation contact"))?;

        if let Some(timeout) = request.timeout_seconds {
            if timeout <= 0 {
                return Err(ApiError::bad_request("timeoutSeconds must be positive"));
            }
            contact.timeout_seconds = timeout;
        }
        if let Some(name) = request.name {
            contact.name = name;
        }
        if let Some(channel) = request.channel {
            contact.channel = channel;
        }
        if let Some(destination) = request.destination {
            contact.destination = destination;
        }
        if let Some(active) = request.active {
            contact.active = active;
        }
        self.store.update_contact(&contact).await?;

        Ok(contact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::IssueType;
    use crate::models::user::Role;
    use crate::repository::InMemoryStore;

    fn service(store: Arc<InMemoryStore>) -> EscalationService {
        EscalationService::new(store, Arc::new(NotificationService::new(16)), 0.8)
    }

    #[tokio::test]
    async fn test_below_threshold_does_not_trigger() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_contact(&EscalationContact::new(Uuid::new_v4(), "ops", ContactChannel::Sms, 60))
            .await
            .unwrap();
        let svc = service(store.clone());

        let issue = DeliveryIssue::new(Uuid::new_v4(), Uuid::new_v4(), IssueType::Delayed, 0.79);
        assert!(svc.trigger(&issue).await.unwrap().is_none());
        assert!(store.list_escalation_logs(issue.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_contacts_is_not_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store);
        let issue = DeliveryIssue::new(Uuid::new_v4(), Uuid::new_v4(), IssueType::Lost, 1.0);
        assert!(svc.trigger(&issue).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_contact(&EscalationContact::new(Uuid::new_v4(), "ops", ContactChannel::Sms, 60))
            .await
            .unwrap();
        let svc = service(store);
        let issue = DeliveryIssue::new(Uuid::new_v4(), Uuid::new_v4(), IssueType::Damaged, 0.8);
        let log = svc.trigger(&issue).await.unwrap().unwrap();
        assert_eq!(log.attempt, 1);
        assert_eq!(log.payload["issueType"], "damaged");
    }

    #[tokio::test]
    async fn test_contact_timeout_must_be_positive() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store);
        let manager = Actor::new(Uuid::new_v4(), Role::Manager);
        let err = svc
            .create_contact(
                &manager,
                CreateContactRequest {
                    user_id: Uuid::new_v4(),
                    name: "ops".into(),
                    channel: ContactChannel::Email,
                    destination: String::new(),
                    timeout_seconds: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}

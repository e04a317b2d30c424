use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::access::{self, Actor};
use super::escalation::EscalationService;
use super::notification::{LiveEvent, LiveEventKind, NotificationService};
use super::shipments::ShipmentService;
use crate::error::{ApiError, ApiResult};
use crate::models::escalation::EscalationLog;
use crate::models::issue::{DeliveryIssue, IssueStatus, IssueType};
use crate::models::user::Role;
use crate::repository::{IssueFilter, ShipmentFilter, Store};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportIssueRequest {
    pub shipment_id: Uuid,
    pub issue_type: IssueType,
    #[serde(default)]
    pub description: String,
    pub severity: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueQuery {
    pub status: Option<IssueStatus>,
    pub shipment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssueRequest {
    pub status: IssueStatus,
}

/// A new issue and the escalation it started, if any.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedIssue {
    #[serde(flatten)]
    pub issue: DeliveryIssue,
    pub escalation: Option<EscalationLog>,
}

pub struct IssueService {
    store: Arc<dyn Store>,
    events: Arc<NotificationService>,
    shipments: Arc<ShipmentService>,
    escalation: Arc<EscalationService>,
}

impl IssueService {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<NotificationService>,
        shipments: Arc<ShipmentService>,
        escalation: Arc<EscalationService>,
    ) -> Self {
        Self {
            store,
            events,
            shipments,
            escalation,
        }
    }

    pub async fn report(&self, actor: &Actor, request: ReportIssueRequest) -> ApiResult<ReportedIssue> {
        if !(0.0..=1.0).contains(&request.severity) {
            return Err(ApiError::bad_request("severity must be within [0, 1]"));
        }
        let shipment = self
            .store
            .get_shipment(request.shipment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("shipment"))?;
        let on_route = self.shipments.on_driver_route(actor, shipment.id).await?;
        access::ensure(
            access::can_report_issue(actor, &shipment, on_route),
            "shipment belongs to another account",
        )?;

        let mut issue = DeliveryIssue::new(shipment.id, actor.user_id, request.issue_type, request.severity);
        issue.description = request.description;
        self.store.insert_issue(&issue).await?;

        tracing::info!(
            issue_id = %issue.id,
            shipment_id = %shipment.id,
            issue_type = %issue.issue_type,
            severity = issue.severity,
            "issue reported"
        );
        self.events.publish(
            LiveEvent::new(LiveEventKind::IssueCreated, issue.id, &issue).for_customer(shipment.customer_id),
        );

        let escalation = self.escalation.trigger(&issue).await?;
        Ok(ReportedIssue { issue, escalation })
    }

    pub async fn list_issues(&self, actor: &Actor, query: IssueQuery) -> ApiResult<Vec<DeliveryIssue>> {
        access::ensure(access::can_list_issues(actor), "issues are not visible to drivers")?;

        let mut filter = IssueFilter {
            statuses: query.status.map(|s| vec![s]),
            shipment_ids: query.shipment_id.map(|id| vec![id]),
            ..Default::default()
        };

        if actor.role == Role::Customer {
            let Some(customer_id) = actor.customer_id else {
                return Ok(Vec::new());
            };
            let own: Vec<Uuid> = self
                .store
                .list_shipments(&ShipmentFilter {
                    customer_id: Some(customer_id),
                    ..Default::default()
                })
                .await?
                .into_iter()
                .map(|s| s.id)
                .filter(|id| query.shipment_id.map_or(true, |wanted| wanted == *id))
                .collect();
            filter.shipment_ids = Some(own);
        }

        Ok(self.store.list_issues(&filter).await?)
    }

    pub async fn get_issue(&self, actor: &Actor, issue_id: Uuid) -> ApiResult<DeliveryIssue> {
        access::ensure(access::can_list_issues(actor), "issues are not visible to drivers")?;
        let issue = self
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| ApiError::not_found("issue"))?;
        if actor.role == Role::Customer {
            self.shipments.visible_shipment(actor, issue.shipment_id).await?;
        }
        Ok(issue)
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        issue_id: Uuid,
        request: UpdateIssueRequest,
    ) -> ApiResult<DeliveryIssue> {
        access::ensure(access::can_triage_issues(actor), "only dispatchers triage issues")?;

        let mut issue = self
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| ApiError::not_found("issue"))?;
        if !issue.status.can_transition_to(request.status) {
            return Err(ApiError::bad_request(format!(
                "issue cannot move from {} to {}",
                issue.status, request.status
            )));
        }

        let now = Utc::now();
        issue.status = request.status;
        issue.updated_at = now;
        let settled = !issue.status.is_open();
        if settled && issue.resolved_at.is_none() {
            issue.resolved_at = Some(now);
        }
        self.store.update_issue(&issue).await?;

        tracing::info!(issue_id = %issue.id, status = %issue.status, "issue status changed");
        let mut event = LiveEvent::new(LiveEventKind::IssueUpdated, issue.id, &issue);
        if let Some(shipment) = self.store.get_shipment(issue.shipment_id).await? {
            event = event.for_customer(shipment.customer_id);
        }
        self.events.publish(event);

        if settled {
            self.escalation.resolve(issue.id).await?;
        }
        Ok(issue)
    }
}

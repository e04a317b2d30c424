use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use super::access::{self, Actor};
use super::notification::{LiveEvent, LiveEventKind, NotificationService};
use crate::error::{ApiError, ApiResult};
use crate::models::issue::{DeliveryIssue, IssueStatus};
use crate::models::metric::{Dimension, MetricDefinition, MetricKind, MetricSnapshot, TimeWindow};
use crate::models::shipment::{ScanType, Shipment, ShipmentScan, ShipmentStatus};
use crate::repository::{scope, IssueFilter, ScanFilter, ShipmentFilter, Store};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64)
}

/// Delivered on or before the promised date, over all delivered.
pub fn on_time_rate(shipments: &[Shipment]) -> f64 {
    let delivered: Vec<_> = shipments
        .iter()
        .filter(|s| s.status == ShipmentStatus::Delivered)
        .collect();
    let on_time = delivered.iter().filter(|s| s.delivered_on_time()).count();
    ratio(on_time, delivered.len())
}

/// Per shipment, take the earliest delivery attempt (delivered or failed)
/// and count how many of those first attempts were deliveries.
pub fn first_attempt_success_rate(scans: &[ShipmentScan]) -> f64 {
    let mut first_attempts: HashMap<Uuid, &ShipmentScan> = HashMap::new();
    for scan in scans.iter().filter(|s| s.scan_type.is_delivery_attempt()) {
        first_attempts
            .entry(scan.shipment_id)
            .and_modify(|current| {
                if scan.scanned_at < current.scanned_at {
                    *current = scan;
                }
            })
            .or_insert(scan);
    }
    let succeeded = first_attempts
        .values()
        .filter(|s| s.scan_type == ScanType::Delivered)
        .count();
    ratio(succeeded, first_attempts.len())
}

pub fn open_issue_count(issues: &[DeliveryIssue]) -> u64 {
    issues.iter().filter(|i| i.status.is_open()).count() as u64
}

/// Strictly above the threshold.
pub fn sla_risk_count(shipments: &[Shipment], threshold: f64) -> u64 {
    shipments.iter().filter(|s| s.sla_risk_score > threshold).count() as u64
}

#[derive(Clone, Debug)]
pub struct MetricQuery {
    pub dimension: Dimension,
    pub window: TimeWindow,
    pub sla_threshold: Option<f64>,
}

impl Default for MetricQuery {
    fn default() -> Self {
        Self {
            dimension: Dimension::Global,
            window: TimeWindow::default(),
            sla_threshold: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSet {
    pub on_time_rate: f64,
    pub first_attempt_success_rate: f64,
    pub open_issues: u64,
    pub sla_risk_count: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionKpis {
    pub region: String,
    #[serde(flatten)]
    pub kpis: KpiSet,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsOverview {
    pub dimension: String,
    pub dimension_value: Option<String>,
    pub window: TimeWindow,
    pub sla_threshold: f64,
    #[serde(flatten)]
    pub kpis: KpiSet,
    /// Only filled for the global scope.
    pub breakdown: Vec<RegionKpis>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetricDefinitionRequest {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: MetricKind,
    pub threshold: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GenerateSnapshotRequest {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub dimension: Option<String>,
    pub dimension_value: Option<String>,
}

/// Records a KPI is computed from, already narrowed to one scope.
struct ScopedRecords {
    shipment_ids: Option<Vec<Uuid>>,
    window: TimeWindow,
}

pub struct MetricsService {
    store: Arc<dyn Store>,
    events: Arc<NotificationService>,
    default_sla_threshold: f64,
}

impl MetricsService {
    pub fn new(store: Arc<dyn Store>, events: Arc<NotificationService>, default_sla_threshold: f64) -> Self {
        Self {
            store,
            events,
            default_sla_threshold,
        }
    }

    fn threshold(&self, requested: Option<f64>) -> ApiResult<f64> {
        let threshold = requested.unwrap_or(self.default_sla_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ApiError::bad_request("threshold must be within [0, 1]"));
        }
        Ok(threshold)
    }

    async fn scope(&self, dimension: &Dimension, window: TimeWindow) -> anyhow::Result<ScopedRecords> {
        Ok(ScopedRecords {
            shipment_ids: scope::shipment_ids_for(self.store.as_ref(), dimension).await?,
            window,
        })
    }

    async fn shipments(&self, scope: &ScopedRecords) -> anyhow::Result<Vec<Shipment>> {
        self.store
            .list_shipments(&ShipmentFilter {
                ids: scope.shipment_ids.clone(),
                updated: scope.window,
                ..Default::default()
            })
            .await
    }

    async fn scans(&self, scope: &ScopedRecords) -> anyhow::Result<Vec<ShipmentScan>> {
        self.store
            .list_scans(&ScanFilter {
                shipment_ids: scope.shipment_ids.clone(),
                scanned: scope.window,
            })
            .await
    }

    async fn open_issues(&self, scope: &ScopedRecords) -> anyhow::Result<Vec<DeliveryIssue>> {
        self.store
            .list_issues(&IssueFilter {
                shipment_ids: scope.shipment_ids.clone(),
                statuses: Some(vec![IssueStatus::Open, IssueStatus::Investigating]),
                created: scope.window,
            })
            .await
    }

    async fn kpis(&self, dimension: &Dimension, window: TimeWindow, threshold: f64) -> anyhow::Result<KpiSet> {
        let scope = self.scope(dimension, window).await?;
        let shipments = self.shipments(&scope).await?;
        let scans = self.scans(&scope).await?;
        let issues = self.open_issues(&scope).await?;

        Ok(KpiSet {
            on_time_rate: on_time_rate(&shipments),
            first_attempt_success_rate: first_attempt_success_rate(&scans),
            open_issues: open_issue_count(&issues),
            sla_risk_count: sla_risk_count(&shipments, threshold),
        })
    }

    /// One KPI for one scope.
    pub async fn compute(
        &self,
        kind: MetricKind,
        dimension: &Dimension,
        window: TimeWindow,
        threshold: f64,
    ) -> anyhow::Result<f64> {
        let scope = self.scope(dimension, window).await?;
        let value = match kind {
            MetricKind::OnTimeRate => on_time_rate(&self.shipments(&scope).await?),
            MetricKind::FirstAttemptSuccess => first_attempt_success_rate(&self.scans(&scope).await?),
            MetricKind::OpenIssues => open_issue_count(&self.open_issues(&scope).await?) as f64,
            MetricKind::SlaRisk => sla_risk_count(&self.shipments(&scope).await?, threshold) as f64,
        };
        Ok(value)
    }

    pub async fn overview(&self, actor: &Actor, query: MetricQuery) -> ApiResult<MetricsOverview> {
        access::ensure(access::can_view_metrics(actor), "metrics are limited to operations staff")?;
        let threshold = self.threshold(query.sla_threshold)?;

        let kpis = self.kpis(&query.dimension, query.window, threshold).await?;

        let mut breakdown = Vec::new();
        if query.dimension == Dimension::Global {
            for region in self.store.distinct_regions().await? {
                let kpis = self
                    .kpis(&Dimension::Region(region.clone()), query.window, threshold)
                    .await?;
                breakdown.push(RegionKpis { region, kpis });
            }
        }

        Ok(MetricsOverview {
            dimension: query.dimension.kind().to_string(),
            dimension_value: query.dimension.value(),
            window: query.window,
            sla_threshold: threshold,
            kpis,
            breakdown,
        })
    }

    pub async fn create_definition(
        &self,
        actor: &Actor,
        request: CreateMetricDefinitionRequest,
    ) -> ApiResult<MetricDefinition> {
        access::ensure(access::can_define_metrics(actor), "only managers define metrics")?;

        let key = request.key.trim();
        if key.is_empty() || request.name.trim().is_empty() {
            return Err(ApiError::bad_request("metric key and name are required"));
        }
        if let Some(threshold) = request.threshold {
            self.threshold(Some(threshold))?;
        }
        if self.store.find_metric_definition_by_key(key).await?.is_some() {
            return Err(ApiError::bad_request(format!("metric key {} already exists", key)));
        }

        let mut definition = MetricDefinition::new(key, request.name.trim(), request.kind);
        definition.description = request.description;
        definition.threshold = request.threshold;
        self.store.insert_metric_definition(&definition).await?;

        tracing::info!(metric_id = %definition.id, key = %definition.key, "metric definition created");
        Ok(definition)
    }

    pub async fn list_definitions(&self, actor: &Actor) -> ApiResult<Vec<MetricDefinition>> {
        access::ensure(access::can_view_metrics(actor), "metrics are limited to operations staff")?;
        Ok(self.store.list_metric_definitions().await?)
    }

    pub async fn get_definition(&self, actor: &Actor, metric_id: Uuid) -> ApiResult<MetricDefinition> {
        access::ensure(access::can_view_metrics(actor), "metrics are limited to operations staff")?;
        self.store
            .get_metric_definition(metric_id)
            .await?
            .ok_or_else(|| ApiError::not_found("metric definition"))
    }

    pub async fn generate_snapshot(
        &self,
        actor: &Actor,
        metric_id: Uuid,
        request: GenerateSnapshotRequest,
    ) -> ApiResult<MetricSnapshot> {
        access::ensure(access::can_generate_snapshot(actor), "only managers generate snapshots")?;

        let definition = self
            .store
            .get_metric_definition(metric_id)
            .await?
            .ok_or_else(|| ApiError::not_found("metric definition"))?;

        let window_end = request.to.unwrap_or_else(Utc::now);
        let window_start = request.from.unwrap_or(window_end - Duration::hours(24));
        if window_start > window_end {
            return Err(ApiError::bad_request("snapshot window starts after it ends"));
        }
        let window = TimeWindow::between(window_start, window_end);

        let dimension = Dimension::parse(request.dimension.as_deref(), request.dimension_value.as_deref())
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let threshold = self.threshold(definition.threshold)?;

        let value = self.compute(definition.kind, &dimension, window, threshold).await?;

        let breakdown = if dimension == Dimension::Global {
            let mut per_region = BTreeMap::new();
            for region in self.store.distinct_regions().await? {
                let value = self
                    .compute(definition.kind, &Dimension::Region(region.clone()), window, threshold)
                    .await?;
                per_region.insert(region, value);
            }
            Some(per_region)
        } else {
            None
        };

        let snapshot = MetricSnapshot {
            id: Uuid::new_v4(),
            metric_id: definition.id,
            value,
            window_start,
            window_end,
            dimension: dimension.kind().to_string(),
            dimension_value: dimension.value(),
            breakdown,
            generated_at: Utc::now(),
        };
        self.store.insert_metric_snapshot(&snapshot).await?;

        tracing::info!(
            metric_id = %definition.id,
            key = %definition.key,
            value = snapshot.value,
            dimension = %snapshot.dimension,
            "metric snapshot generated"
        );
        self.events.publish(LiveEvent::new(
            LiveEventKind::MetricSnapshotCreated,
            snapshot.id,
            &snapshot,
        ));

        Ok(snapshot)
    }

    pub async fn list_snapshots(&self, actor: &Actor, metric_id: Uuid) -> ApiResult<Vec<MetricSnapshot>> {
        access::ensure(access::can_view_metrics(actor), "metrics are limited to operations staff")?;
        if self.store.get_metric_definition(metric_id).await?.is_none() {
            return Err(ApiError::not_found("metric definition"));
        }
        Ok(self.store.list_metric_snapshots(metric_id).await?)
    }
}

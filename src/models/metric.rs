use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    OnTimeRate,
    FirstAttemptSuccess,
    OpenIssues,
    SlaRisk,
}

text_enum!(MetricKind {
    OnTimeRate => "on_time_rate",
    FirstAttemptSuccess => "first_attempt_success",
    OpenIssues => "open_issues",
    SlaRisk => "sla_risk",
});

/// Scope a metric is computed over.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "dimension", content = "value", rename_all = "snake_case")]
pub enum Dimension {
    Global,
    Region(String),
    Route(Uuid),
    Driver(Uuid),
}

impl Dimension {
    pub fn kind(&self) -> &'static str {
        match self {
            Dimension::Global => "global",
            Dimension::Region(_) => "region",
            Dimension::Route(_) => "route",
            Dimension::Driver(_) => "driver",
        }
    }

    pub fn value(&self) -> Option<String> {
        match self {
            Dimension::Global => None,
            Dimension::Region(region) => Some(region.clone()),
            Dimension::Route(id) | Dimension::Driver(id) => Some(id.to_string()),
        }
    }

    /// Rebuild from the `(kind, value)` pair used in query strings and rows.
    pub fn parse(kind: Option<&str>, value: Option<&str>) -> anyhow::Result<Self> {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        match (kind.unwrap_or("global"), value) {
            ("global", _) => Ok(Dimension::Global),
            ("region", Some(region)) => Ok(Dimension::Region(region.to_string())),
            ("route", Some(id)) => Ok(Dimension::Route(id.parse()?)),
            ("driver", Some(id)) => Ok(Dimension::Driver(id.parse()?)),
            (kind @ ("region" | "route" | "driver"), None) => {
                Err(anyhow::anyhow!("dimension {} requires a value", kind))
            }
            (other, _) => Err(anyhow::anyhow!("unknown dimension: {}", other)),
        }
    }
}

/// Inclusive time bounds; either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: MetricKind,
    /// Overrides the configured SLA-risk threshold for `sla_risk` metrics.
    pub threshold: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl MetricDefinition {
    pub fn new(key: &str, name: &str, kind: MetricKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.to_string(),
            name: name.to_string(),
            description: None,
            kind,
            threshold: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub id: Uuid,
    pub metric_id: Uuid,
    pub value: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub dimension: String,
    pub dimension_value: Option<String>,
    /// Region → value, only for global snapshots.
    pub breakdown: Option<BTreeMap<String, f64>>,
    pub generated_at: DateTime<Utc>,
}

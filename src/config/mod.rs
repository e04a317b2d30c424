pub mod database;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Shipments scoring strictly above this count towards the SLA-risk KPI.
    pub sla_risk_threshold: f64,
    /// Issues at or above this severity start the escalation ladder.
    pub escalation_severity_threshold: f64,
    pub event_buffer: usize,
    pub db_max_connections: u32,
    pub log_format: LogFormat,
}

impl Config {
    /// Load `.env` (if present) and layer environment variables over defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let builder = Self::defaults()?.add_source(config::Environment::default());
        Self::from_builder(builder)
    }

    pub fn defaults() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("sla_risk_threshold", 0.7)?
            .set_default("escalation_severity_threshold", 0.8)?
            .set_default("event_buffer", 256)?
            .set_default("db_max_connections", 20)?
            .set_default("log_format", "pretty")?)
    }

    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> anyhow::Result<Self> {
        let config: Config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to read configuration: {}", e))?
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL must be set");
        }
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must be set");
        }
        for (name, value) in [
            ("SLA_RISK_THRESHOLD", self.sla_risk_threshold),
            ("ESCALATION_SEVERITY_THRESHOLD", self.escalation_severity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        if self.event_buffer == 0 {
            anyhow::bail!("EVENT_BUFFER must be positive");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

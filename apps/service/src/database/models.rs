use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::types::Observation;
use crate::validation::{SiteConfig, SiteError, validate_site_name};

/// Convert a UTC timestamp to Unix milliseconds
pub fn timestamp_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert Unix milliseconds to a UTC timestamp
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Site definition as stored in the `sites` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: Option<i64>,
    pub name: String,
    pub url: Option<String>,
    pub ping_host: Option<String>,
    pub enabled: bool,
    pub enable_http: bool,
    pub enable_ping: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteRecord {
    /// New enabled record; each test is enabled when its target is present
    pub fn new(name: impl Into<String>, url: Option<String>, ping_host: Option<String>) -> Self {
        let url = url.filter(|u| !u.trim().is_empty());
        let ping_host = ping_host.filter(|h| !h.trim().is_empty());
        let now = Utc::now();

        Self {
            id: None,
            name: name.into(),
            enable_http: url.is_some(),
            enable_ping: ping_host.is_some(),
            url,
            ping_host,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record for a validated site
    pub fn from_site(site: &SiteConfig) -> Self {
        Self::new(site.name(), site.url().map(str::to_string), site.ping_host().map(str::to_string))
    }

    /// Same rules the management UI enforces before saving
    pub fn validate(&self) -> Result<(), SiteError> {
        let name = validate_site_name(&self.name)?;

        if !self.enable_http && !self.enable_ping {
            return Err(SiteError::NoTestsEnabled(name));
        }
        if self.enable_http && self.url.as_deref().is_none_or(|u| u.trim().is_empty()) {
            return Err(SiteError::MissingUrl { site: name });
        }
        if self.enable_ping && self.ping_host.as_deref().is_none_or(|h| h.trim().is_empty()) {
            return Err(SiteError::MissingPingHost { site: name });
        }

        Ok(())
    }

    /// The monitored view: a target only counts when its test is enabled
    pub fn to_site_config(&self) -> Result<SiteConfig, SiteError> {
        self.validate()?;
        SiteConfig::new(
            self.name.clone(),
            self.url.clone().filter(|_| self.enable_http),
            self.ping_host.clone().filter(|_| self.enable_ping),
        )
    }
}

/// Current up/total counts derived from the latest observation per site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total_sites: usize,
    pub sites_up: usize,
}

impl StatusCounts {
    pub fn from_latest(latest: &[Observation]) -> Self {
        Self {
            total_sites: latest.len(),
            sites_up: latest.iter().filter(|o| o.overall_success).count(),
        }
    }
}

/// Aggregate statistics for one site over a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub site_name: String,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub uptime_percent: f64,
    pub avg_http_latency_ms: Option<f64>,
    pub avg_ping_latency_ms: Option<f64>,
    pub avg_packet_loss_percent: Option<f64>,
}

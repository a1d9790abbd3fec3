use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::SiteConfig;

/// Health of a site derived from one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
    Degraded,
    Unknown,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
            MonitorStatus::Degraded => write!(f, "degraded"),
            MonitorStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Probe-specific payload carried next to the verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ProbeDetail {
    /// Final HTTP status code
    StatusCode(u16),
    /// Ping packet loss in percent (0.0 - 100.0)
    PacketLoss(f64),
}

/// Outcome of a single probe against a single target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// `false` means the probe was skipped, not that it failed
    pub attempted: bool,
    pub success: bool,
    pub latency_ms: Option<f64>,
    /// Fastest and slowest reply; only ping reports these
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<f64>,
    pub detail: Option<ProbeDetail>,
}

impl ProbeOutcome {
    /// A probe that was not configured for the site
    pub fn skipped() -> Self {
        Self {
            attempted: false,
            success: false,
            latency_ms: None,
            min_latency_ms: None,
            max_latency_ms: None,
            detail: None,
        }
    }

    /// A probe that ran and got a healthy answer
    pub fn success(latency_ms: f64, detail: Option<ProbeDetail>) -> Self {
        Self { success: true, latency_ms: Some(latency_ms), ..Self::failure(None, detail) }
    }

    /// A probe that ran and failed; latency and detail are kept when known
    pub fn failure(latency_ms: Option<f64>, detail: Option<ProbeDetail>) -> Self {
        Self { attempted: true, latency_ms, detail, ..Self::skipped() }
    }

    /// Attach the min/max reply times of a multi-packet probe
    pub fn with_latency_range(mut self, min_ms: Option<f64>, max_ms: Option<f64>) -> Self {
        self.min_latency_ms = min_ms;
        self.max_latency_ms = max_ms;
        self
    }

    /// Shorthand for a transport-level failure with nothing to report
    pub fn unreachable() -> Self {
        Self::failure(None, None)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.detail {
            Some(ProbeDetail::StatusCode(code)) => Some(code),
            _ => None,
        }
    }

    pub fn packet_loss(&self) -> Option<f64> {
        match self.detail {
            Some(ProbeDetail::PacketLoss(loss)) => Some(loss),
            _ => None,
        }
    }

    /// Attempted and passed
    pub fn passed(&self) -> bool {
        self.attempted && self.success
    }

    /// Attempted and did not pass
    pub fn failed(&self) -> bool {
        self.attempted && !self.success
    }
}

/// One evaluation of one site. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub site_name: String,
    pub timestamp: DateTime<Utc>,
    pub http: ProbeOutcome,
    pub ping: ProbeOutcome,
    pub overall_success: bool,
}

impl Observation {
    /// Fold per-probe outcomes into one observation.
    ///
    /// `overall_success` is the OR of every attempted probe. Observations
    /// with no attempted probe are never successful; [`SiteConfig`] makes
    /// that case unreachable for evaluated sites.
    pub fn new(
        site_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        http: ProbeOutcome,
        ping: ProbeOutcome,
    ) -> Self {
        debug_assert!(http.attempted || ping.attempted, "observation without any attempted probe");
        let overall_success = http.passed() || ping.passed();

        Self {
            site_name: site_name.into(),
            timestamp: truncate_timestamp(timestamp),
            http,
            ping,
            overall_success,
        }
    }

    /// Observation for a site whose evaluation blew up: every enabled
    /// probe is recorded as failed.
    pub fn failed(site: &SiteConfig, timestamp: DateTime<Utc>) -> Self {
        let http = if site.http_enabled() {
            ProbeOutcome::unreachable()
        } else {
            ProbeOutcome::skipped()
        };
        let ping = if site.ping_enabled() {
            ProbeOutcome::failure(None, Some(ProbeDetail::PacketLoss(100.0)))
        } else {
            ProbeOutcome::skipped()
        };

        Self::new(site.name(), timestamp, http, ping)
    }

    /// Tri-state view of the verdict; `overall_success` remains authoritative.
    pub fn status(&self) -> MonitorStatus {
        if !self.http.attempted && !self.ping.attempted {
            return MonitorStatus::Unknown;
        }
        if !self.overall_success {
            return MonitorStatus::Down;
        }

        let partial_loss = self.ping.passed() && self.ping.packet_loss().is_some_and(|loss| loss > 0.0);
        if self.http.failed() || self.ping.failed() || partial_loss {
            MonitorStatus::Degraded
        } else {
            MonitorStatus::Up
        }
    }
}

/// Observations are stored at millisecond resolution.
pub fn truncate_timestamp(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_overall_success_is_or_of_attempted() {
        let obs = Observation::new(
            "A",
            at(),
            ProbeOutcome::unreachable(),
            ProbeOutcome::success(12.0, Some(ProbeDetail::PacketLoss(0.0))),
        );
        assert!(obs.overall_success);

        let obs = Observation::new("A", at(), ProbeOutcome::unreachable(), ProbeOutcome::skipped());
        assert!(!obs.overall_success);
    }

    #[test]
    fn test_skipped_probe_never_counts() {
        let mut skipped = ProbeOutcome::skipped();
        skipped.success = true;
        let obs = Observation::new("A", at(), ProbeOutcome::unreachable(), skipped);
        assert!(!obs.overall_success);
    }

    #[test]
    fn test_status_derivation() {
        let up = Observation::new(
            "A",
            at(),
            ProbeOutcome::success(80.0, Some(ProbeDetail::StatusCode(200))),
            ProbeOutcome::success(12.0, Some(ProbeDetail::PacketLoss(0.0))),
        );
        assert_eq!(up.status(), MonitorStatus::Up);

        let lossy = Observation::new(
            "A",
            at(),
            ProbeOutcome::skipped(),
            ProbeOutcome::success(12.0, Some(ProbeDetail::PacketLoss(33.3))),
        );
        assert_eq!(lossy.status(), MonitorStatus::Degraded);

        let half = Observation::new(
            "A",
            at(),
            ProbeOutcome::unreachable(),
            ProbeOutcome::success(12.0, Some(ProbeDetail::PacketLoss(0.0))),
        );
        assert_eq!(half.status(), MonitorStatus::Degraded);

        let down = Observation::new("A", at(), ProbeOutcome::unreachable(), ProbeOutcome::skipped());
        assert_eq!(down.status(), MonitorStatus::Down);
    }

    #[test]
    fn test_timestamp_truncated_to_millis() {
        let ts = at() + chrono::Duration::nanoseconds(1_234_567);
        let obs = Observation::new("A", ts, ProbeOutcome::unreachable(), ProbeOutcome::skipped());
        assert_eq!(obs.timestamp, at() + chrono::Duration::milliseconds(1));
    }

    #[test]
    fn test_failed_observation_marks_enabled_probes() {
        let site = SiteConfig::new("C", None, Some("8.8.4.4".into())).unwrap();
        let obs = Observation::failed(&site, at());
        assert!(!obs.http.attempted);
        assert!(obs.ping.attempted);
        assert_eq!(obs.ping.packet_loss(), Some(100.0));
        assert!(!obs.overall_success);
    }
}

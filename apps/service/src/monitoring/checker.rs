use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::ping::PingRunner;
use super::types::{ProbeDetail, ProbeOutcome};

/// A single probe type. Implementations never fail: every transport
/// problem ends up as an unsuccessful outcome.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &str) -> ProbeOutcome;
}

pub const DEFAULT_USER_AGENT: &str = "NetworkMonitor/1.0";

/// HTTP/HTTPS probe
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout_seconds: u64, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &str) -> ProbeOutcome {
        let start = Instant::now();

        let response = match self.client.get(target).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("HTTP timeout for {}", target);
                return ProbeOutcome::unreachable();
            }
            Err(e) => {
                warn!("HTTP request to {} failed: {}", target, e);
                return ProbeOutcome::unreachable();
            }
        };

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        let status = response.status();
        let detail = Some(ProbeDetail::StatusCode(status.as_u16()));

        // Consider 2xx and 3xx as success
        if status.is_success() || status.is_redirection() {
            ProbeOutcome::success(latency_ms, detail)
        } else {
            ProbeOutcome::failure(Some(latency_ms), detail)
        }
    }
}

/// ICMP probe backed by a [`PingRunner`]
pub struct PingProbe<R> {
    runner: R,
}

impl<R: PingRunner> PingProbe<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

#[async_trait::async_trait]
impl<R: PingRunner> Probe for PingProbe<R> {
    async fn probe(&self, target: &str) -> ProbeOutcome {
        match self.runner.ping(target).await {
            Ok(stats) => {
                debug!(
                    host = target,
                    transmitted = stats.transmitted,
                    received = stats.received,
                    "Ping {}: {}% packet loss",
                    target,
                    stats.loss_percent
                );

                let detail = Some(ProbeDetail::PacketLoss(stats.loss_percent));
                match stats.avg_ms {
                    Some(avg) if stats.loss_percent < 100.0 => {
                        ProbeOutcome::success(avg, detail).with_latency_range(stats.min_ms, stats.max_ms)
                    }
                    _ => ProbeOutcome::failure(None, detail),
                }
            }
            Err(e) => {
                warn!("Ping failed for {}: {:#}", target, e);
                ProbeOutcome::failure(None, Some(ProbeDetail::PacketLoss(100.0)))
            }
        }
    }
}

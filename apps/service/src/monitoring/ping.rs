//! System `ping` invocation and summary parsing.
//!
//! ICMP needs raw sockets, so instead of opening them ourselves we shell
//! out to the platform `ping` binary and read its summary lines.

use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Summary of one ping invocation
#[derive(Debug, Clone, PartialEq)]
pub struct PingStats {
    pub transmitted: u32,
    pub received: u32,
    pub loss_percent: f64,
    pub min_ms: Option<f64>,
    /// Average over received replies only
    pub avg_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

/// Black-box ping capability: given a host, report latency and loss
#[async_trait::async_trait]
pub trait PingRunner: Send + Sync {
    async fn ping(&self, host: &str) -> Result<PingStats>;
}

/// Runs the platform `ping` binary
pub struct SystemPing {
    binary: String,
    count: u32,
    timeout_seconds: u64,
}

impl SystemPing {
    pub fn new(count: u32, timeout_seconds: u64) -> Self {
        Self { binary: "ping".to_string(), count, timeout_seconds }
    }

    /// Use a different executable (mostly for tests)
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn args(&self, host: &str) -> Vec<String> {
        // macOS takes the reply wait in milliseconds
        let wait = if cfg!(target_os = "macos") {
            self.timeout_seconds * 1000
        } else {
            self.timeout_seconds
        };

        vec![
            "-c".to_string(),
            self.count.to_string(),
            "-W".to_string(),
            wait.to_string(),
            host.to_string(),
        ]
    }

    /// Upper bound for the whole invocation
    fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds + u64::from(self.count) + 5)
    }
}

#[async_trait::async_trait]
impl PingRunner for SystemPing {
    async fn ping(&self, host: &str) -> Result<PingStats> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args(host))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.overall_timeout(), cmd.output())
            .await
            .map_err(|_| anyhow!("ping timeout for {}", host))?
            .with_context(|| format!("failed to run '{}'", self.binary))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_ping_output(&stdout) {
            Some(stats) => Ok(stats),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(anyhow!("ping exited with {}: {}", output.status, stderr.trim()))
            }
        }
    }
}

/// Parse the statistics block printed by iputils and BSD `ping`.
///
/// Returns `None` when no packet-loss summary is present at all.
pub fn parse_ping_output(output: &str) -> Option<PingStats> {
    let summary = output.lines().find(|line| line.contains("% packet loss"))?;

    let loss_percent = summary
        .split(',')
        .find_map(|part| part.trim().strip_suffix("% packet loss"))
        .and_then(|value| value.trim().parse::<f64>().ok())?;

    let transmitted = count_before(summary, "packets transmitted").unwrap_or(0);
    let received = count_before(summary, "received").unwrap_or(0);

    let (min_ms, avg_ms, max_ms) = output
        .lines()
        .find(|line| line.contains("min/avg/max"))
        .and_then(parse_rtt_line)
        .map_or((None, None, None), |(min, avg, max)| (Some(min), Some(avg), Some(max)));

    Some(PingStats { transmitted, received, loss_percent, min_ms, avg_ms, max_ms })
}

/// Number in front of `label` within a comma separated summary
fn count_before(summary: &str, label: &str) -> Option<u32> {
    summary.split(',').find_map(|part| {
        let part = part.trim();
        if !part.ends_with(label) {
            return None;
        }
        part.split_whitespace().next()?.parse().ok()
    })
}

/// `rtt min/avg/max/mdev = 11.1/12.2/13.3/0.9 ms`
fn parse_rtt_line(line: &str) -> Option<(f64, f64, f64)> {
    let values = line.split('=').nth(1)?.trim().trim_end_matches("ms").trim();
    let mut parts = values.split('/').map(|v| v.trim().parse::<f64>());

    let min = parts.next()?.ok()?;
    let avg = parts.next()?.ok()?;
    let max = parts.next()?.ok()?;
    Some((min, avg, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_OK: &str = "PING 1.1.1.1 (1.1.1.1) 56(84) bytes of data.
64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=11.8 ms
64 bytes from 1.1.1.1: icmp_seq=2 ttl=57 time=12.1 ms
64 bytes from 1.1.1.1: icmp_seq=3 ttl=57 time=12.4 ms

--- 1.1.1.1 ping statistics ---
3 packets transmitted, 3 received, 0% packet loss, time 2003ms
rtt min/avg/max/mdev = 11.812/12.104/12.398/0.239 ms
";

    const LINUX_PARTIAL: &str = "--- 8.8.8.8 ping statistics ---
3 packets transmitted, 2 received, 33.3333% packet loss, time 2010ms
rtt min/avg/max/mdev = 9.000/10.000/11.000/1.000 ms
";

    const LINUX_DEAD: &str = "--- 10.255.255.1 ping statistics ---
3 packets transmitted, 0 received, +3 errors, 100% packet loss, time 2040ms
";

    const MACOS_OK: &str = "--- github.com ping statistics ---
3 packets transmitted, 3 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 20.117/21.532/23.004/1.180 ms
";

    #[test]
    fn test_parse_linux_success() {
        let stats = parse_ping_output(LINUX_OK).unwrap();
        assert_eq!(stats.transmitted, 3);
        assert_eq!(stats.received, 3);
        assert_eq!(stats.loss_percent, 0.0);
        assert_eq!(stats.avg_ms, Some(12.104));
        assert_eq!(stats.min_ms, Some(11.812));
        assert_eq!(stats.max_ms, Some(12.398));
    }

    #[test]
    fn test_parse_partial_loss() {
        let stats = parse_ping_output(LINUX_PARTIAL).unwrap();
        assert_eq!(stats.received, 2);
        assert!((stats.loss_percent - 33.3333).abs() < 1e-9);
        assert_eq!(stats.avg_ms, Some(10.0));
    }

    #[test]
    fn test_parse_total_loss() {
        let stats = parse_ping_output(LINUX_DEAD).unwrap();
        assert_eq!(stats.received, 0);
        assert_eq!(stats.loss_percent, 100.0);
        assert_eq!(stats.avg_ms, None);
    }

    #[test]
    fn test_parse_macos() {
        let stats = parse_ping_output(MACOS_OK).unwrap();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.avg_ms, Some(21.532));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_ping_output("ping: unknown host nowhere.invalid").is_none());
        assert!(parse_ping_output("").is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let runner = SystemPing::new(1, 1).with_binary("definitely-not-a-ping-binary");
        assert!(runner.ping("127.0.0.1").await.is_err());
    }
}

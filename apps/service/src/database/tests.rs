use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

use super::models::SiteRecord;
use super::{DatabaseImpl, SiteRepository, Store};
use crate::monitoring::types::{Observation, ProbeDetail, ProbeOutcome};

/// Helper to create a throwaway database; keep the `TempDir` alive
async fn create_test_database() -> Result<(DatabaseImpl, TempDir)> {
    let temp_dir = tempdir()?;
    let database = DatabaseImpl::open(temp_dir.path().join("test.db")).await?;
    Ok((database, temp_dir))
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap()
}

fn full_observation(site: &str, timestamp: DateTime<Utc>, up: bool) -> Observation {
    let http = if up {
        ProbeOutcome::success(80.25, Some(ProbeDetail::StatusCode(200)))
    } else {
        ProbeOutcome::failure(Some(120.0), Some(ProbeDetail::StatusCode(503)))
    };
    let ping = if up {
        ProbeOutcome::success(12.5, Some(ProbeDetail::PacketLoss(0.0)))
    } else {
        ProbeOutcome::failure(None, Some(ProbeDetail::PacketLoss(100.0)))
    };
    Observation::new(site, timestamp, http, ping)
}

#[tokio::test]
async fn test_append_then_query_round_trip() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    let timestamp = at(5) + Duration::milliseconds(321);
    let obs = full_observation("A", timestamp, true);
    db.append(&obs).await?;

    let found = db.query_range(Some("A"), Some(timestamp), Some(timestamp)).await?;
    assert_eq!(found, vec![obs]);
    Ok(())
}

#[tokio::test]
async fn test_ping_reply_range_round_trip() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    let obs = Observation::new(
        "Gateway",
        at(7),
        ProbeOutcome::skipped(),
        ProbeOutcome::success(10.5, Some(ProbeDetail::PacketLoss(0.0)))
            .with_latency_range(Some(9.75), Some(14.25)),
    );
    db.append(&obs).await?;

    let found = db.query_range(Some("Gateway"), None, None).await?;
    assert_eq!(found, vec![obs.clone()]);
    assert_eq!(found[0].ping.min_latency_ms, Some(9.75));
    assert_eq!(found[0].ping.max_latency_ms, Some(14.25));
    assert_eq!(found[0].http.min_latency_ms, None);

    let latest = db.latest_per_site().await?;
    assert_eq!(latest[0].ping.max_latency_ms, Some(14.25));
    Ok(())
}

#[tokio::test]
async fn test_skipped_probe_round_trip() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    let obs = Observation::new(
        "C",
        at(1),
        ProbeOutcome::skipped(),
        ProbeOutcome::success(9.0, Some(ProbeDetail::PacketLoss(33.3))),
    );
    db.append(&obs).await?;

    let found = db.query_range(None, None, None).await?;
    assert_eq!(found.len(), 1);
    assert!(!found[0].http.attempted);
    assert_eq!(found[0], obs);
    Ok(())
}

#[tokio::test]
async fn test_query_range_filters_and_orders() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    db.append(&full_observation("A", at(30), true)).await?;
    db.append(&full_observation("B", at(10), false)).await?;
    db.append(&full_observation("A", at(20), false)).await?;
    db.append(&full_observation("A", at(40), true)).await?;

    let all = db.query_range(None, None, None).await?;
    let times: Vec<_> = all.iter().map(|o| o.timestamp).collect();
    assert_eq!(times, vec![at(10), at(20), at(30), at(40)]);

    let a_window = db.query_range(Some("A"), Some(at(20)), Some(at(30))).await?;
    assert_eq!(a_window.len(), 2);
    assert!(a_window.iter().all(|o| o.site_name == "A"));

    let none = db.query_range(Some("missing"), None, None).await?;
    assert!(none.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_latest_per_site_returns_most_recent() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    db.append(&full_observation("A", at(1), true)).await?;
    db.append(&full_observation("A", at(3), false)).await?;
    db.append(&full_observation("A", at(2), true)).await?;
    db.append(&full_observation("B", at(1), true)).await?;

    let latest = db.latest_per_site().await?;
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].site_name, "A");
    assert_eq!(latest[0].timestamp, at(3));
    assert!(!latest[0].overall_success);
    assert_eq!(latest[1].site_name, "B");

    let counts = db.status_counts().await?;
    assert_eq!(counts.total_sites, 2);
    assert_eq!(counts.sites_up, 1);
    Ok(())
}

#[tokio::test]
async fn test_latest_per_site_empty_store() -> Result<()> {
    let (db, _dir) = create_test_database().await?;
    assert!(db.latest_per_site().await?.is_empty());
    assert_eq!(db.status_counts().await?.total_sites, 0);
    Ok(())
}

#[tokio::test]
async fn test_prune_is_idempotent() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    let now = Utc::now();
    db.append(&full_observation("A", now - Duration::days(40), true)).await?;
    db.append(&full_observation("A", now - Duration::days(31), true)).await?;
    db.append(&full_observation("A", now - Duration::days(1), true)).await?;

    assert_eq!(db.prune_older_than(Duration::days(30)).await?, 2);
    assert_eq!(db.prune_older_than(Duration::days(30)).await?, 0);
    assert_eq!(db.count_all().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_prune_before_keeps_cutoff_row() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    db.append(&full_observation("A", at(10), true)).await?;
    db.append(&full_observation("A", at(20), true)).await?;

    assert_eq!(db.prune_before(at(20)).await?, 1);
    assert_eq!(db.query_range(None, None, None).await?[0].timestamp, at(20));
    Ok(())
}

#[tokio::test]
async fn test_site_summary() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    db.append(&full_observation("A", at(1), true)).await?;
    db.append(&full_observation("A", at(2), false)).await?;
    db.append(&full_observation("B", at(1), true)).await?;
    db.append(&full_observation("B", at(2), true)).await?;
    db.append(&full_observation("Old", at(0) - Duration::days(1), true)).await?;

    let summary = db.site_summary(at(0)).await?;
    assert_eq!(summary.len(), 2);

    assert_eq!(summary[0].site_name, "B");
    assert_eq!(summary[0].uptime_percent, 100.0);
    assert_eq!(summary[0].avg_packet_loss_percent, Some(0.0));

    assert_eq!(summary[1].site_name, "A");
    assert_eq!(summary[1].total_checks, 2);
    assert_eq!(summary[1].successful_checks, 1);
    assert_eq!(summary[1].uptime_percent, 50.0);
    assert_eq!(summary[1].avg_ping_latency_ms, Some(12.5));
    Ok(())
}

#[tokio::test]
async fn test_counts() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    db.append(&full_observation("A", at(1), true)).await?;
    db.append(&full_observation("A", at(9), true)).await?;

    assert_eq!(db.count_all().await?, 2);
    assert_eq!(db.count_since(at(5)).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_appends_and_reads() -> Result<()> {
    let (db, _dir) = create_test_database().await?;
    let db = Arc::new(db);

    let mut handles = Vec::new();
    for i in 0..20u32 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let obs = full_observation(&format!("site-{}", i % 4), at(i), i % 2 == 0);
            db.append(&obs).await
        }));
    }
    let reader = {
        let db = db.clone();
        tokio::spawn(async move { db.latest_per_site().await })
    };

    for handle in handles {
        handle.await??;
    }
    reader.await??;

    assert_eq!(db.count_all().await?, 20);
    assert_eq!(db.latest_per_site().await?.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_site_repository_crud() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    let id = db
        .save_site(&SiteRecord::new("Router", Some("http://192.168.1.1".into()), Some("192.168.1.1".into())))
        .await?;
    db.save_site(&SiteRecord::new("DNS", None, Some("8.8.4.4".into()))).await?;

    let sites = db.list_sites().await?;
    assert_eq!(sites.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["DNS", "Router"]);

    let mut router = sites.into_iter().find(|s| s.id == Some(id)).unwrap();
    router.enabled = false;
    db.save_site(&router).await?;

    let enabled = db.enabled_sites().await?;
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].name, "DNS");

    db.delete_site(id).await?;
    assert_eq!(db.list_sites().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_site_repository_rejects_invalid_and_duplicates() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    let mut invalid = SiteRecord::new("Nothing", None, None);
    invalid.enable_http = false;
    invalid.enable_ping = false;
    assert!(db.save_site(&invalid).await.is_err());

    db.save_site(&SiteRecord::new("A", Some("https://a.example".into()), None)).await?;
    assert!(db.save_site(&SiteRecord::new("A", None, Some("1.1.1.1".into()))).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_seed_only_into_empty_table() -> Result<()> {
    let (db, _dir) = create_test_database().await?;

    let seed = vec![
        SiteRecord::new("A", Some("https://a.example".into()), None),
        SiteRecord::new("B", None, Some("1.1.1.1".into())),
    ];

    assert_eq!(db.seed_sites(&seed).await?, 2);
    assert_eq!(db.seed_sites(&seed).await?, 0);
    assert_eq!(db.list_sites().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_reopen_keeps_data() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("durable.db");

    {
        let db = DatabaseImpl::open(&path).await?;
        db.append(&full_observation("A", at(1), true)).await?;
    }

    let db = DatabaseImpl::open(&path).await?;
    assert_eq!(db.count_all().await?, 1);
    Ok(())
}

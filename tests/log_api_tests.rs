use chrono::{DateTime, TimeZone, Utc};
use gossiplog::storage::codec;
use gossiplog::{
    AppendOnly, Clock, Entry, Log, LogBuilder, LogConfig, LogError, MAX_DURATION, ManualClock, NotificationLog,
    Receiver, Tombstoning,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
}

fn secs(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

fn append_only_log(clock: Arc<ManualClock>, retention: Duration) -> Log<String, String> {
    LogBuilder::new(LogConfig::new().retention(retention), AppendOnly)
        .clock(clock)
        .build()
        .unwrap()
}

fn capture_broadcasts<M: gossiplog::MergePolicy>(log: &Log<String, String, M>) -> Arc<Mutex<Vec<Vec<u8>>>> {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&sent);
    log.set_broadcast(move |bytes| {
        sink.lock().unwrap().push(bytes);
        Ok(())
    })
    .unwrap();
    sent
}

#[test]
fn older_write_is_noop_and_gc_removes_after_expiry() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock.clone(), Duration::from_secs(60));
    let sent = capture_broadcasts(&log);
    let a = "A".to_string();

    log.log(a.clone(), "P1".into(), t0(), None).unwrap();
    assert_eq!(log.query(&a).unwrap().payload, "P1");

    log.log(a.clone(), "P2".into(), t0() - secs(1), None).unwrap();
    assert_eq!(log.query(&a).unwrap().payload, "P1");
    assert_eq!(sent.lock().unwrap().len(), 1, "stale write must not broadcast");

    clock.advance(Duration::from_secs(61));
    assert_eq!(log.gc().unwrap(), 1);
    assert!(matches!(log.query(&a), Err(LogError::NotFound)));
}

#[test]
fn query_returns_expired_entry_until_gc_runs() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock.clone(), Duration::from_secs(60));
    let a = "A".to_string();

    log.log(a.clone(), "P1".into(), t0(), None).unwrap();
    clock.advance(Duration::from_secs(120));

    let stale = log.query(&a).unwrap();
    assert!(stale.is_expired(clock.now()));
    assert_eq!(stale.payload, "P1");

    log.gc().unwrap();
    assert!(log.query(&a).unwrap_err().is_not_found());
}

#[test]
fn expired_held_entry_does_not_block_older_write() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock.clone(), Duration::from_secs(60));
    let sent = capture_broadcasts(&log);
    let a = "A".to_string();

    log.log(a.clone(), "P1".into(), t0(), Some(Duration::from_secs(10)))
        .unwrap();
    clock.advance(Duration::from_secs(20));
    log.log(a.clone(), "P2".into(), t0() - secs(5), None).unwrap();

    let entry = log.query(&a).unwrap();
    assert_eq!(entry.payload, "P2");
    assert_eq!(entry.timestamp, t0() - secs(5));
    assert_eq!(entry.expires_at, Some(t0() + secs(80)));
    assert_eq!(sent.lock().unwrap().len(), 2);

    assert_eq!(log.gc().unwrap(), 0);
    assert_eq!(log.query(&a).unwrap().payload, "P2");
}

#[test]
fn held_entry_blocks_older_write_until_its_expiry_instant() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock.clone(), Duration::from_secs(60));
    let a = "A".to_string();

    log.log(a.clone(), "P1".into(), t0(), Some(Duration::from_secs(10)))
        .unwrap();

    clock.advance(Duration::from_secs(9));
    log.log(a.clone(), "P2".into(), t0() - secs(1), None).unwrap();
    assert_eq!(log.query(&a).unwrap().payload, "P1");

    // Expiry is inclusive: at exactly T0+10s the held entry is gone.
    clock.advance(Duration::from_secs(1));
    log.log(a.clone(), "P3".into(), t0() - secs(1), None).unwrap();
    assert_eq!(log.query(&a).unwrap().payload, "P3");
}

#[test]
fn expired_held_entry_still_honours_newer_tombstone() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log: Log<String, String, Tombstoning> =
        LogBuilder::new(LogConfig::new().retention(Duration::from_secs(60)), Tombstoning::new())
            .clock(clock.clone())
            .build()
            .unwrap();
    let sent = capture_broadcasts(&log);
    let a = "A".to_string();

    log.log(a.clone(), "P1".into(), t0(), Some(Duration::from_secs(10)))
        .unwrap();
    let tomb = Entry::tombstone(a.clone(), String::new(), t0() - secs(1));
    assert_eq!(log.merge(&codec::encode(&tomb).unwrap()).unwrap(), 1);
    assert_eq!(log.query(&a).unwrap().payload, "P1");

    clock.advance(Duration::from_secs(20));
    let before = sent.lock().unwrap().len();
    log.log(a.clone(), "P2".into(), t0() - secs(2), None).unwrap();

    assert_eq!(log.query(&a).unwrap().payload, "P1");
    assert_eq!(sent.lock().unwrap().len(), before);
}

#[test]
fn expiry_counts_from_later_of_timestamp_and_now() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock, Duration::from_secs(60));

    log.log("past".into(), "x".into(), t0() - secs(30), None).unwrap();
    log.log("future".into(), "y".into(), t0() + secs(30), None).unwrap();

    assert_eq!(log.query(&"past".to_string()).unwrap().expires_at, Some(t0() + secs(60)));
    assert_eq!(log.query(&"future".to_string()).unwrap().expires_at, Some(t0() + secs(90)));
}

#[test]
fn timestamp_at_end_of_date_range_is_rejected() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock, Duration::from_secs(3 * 24 * 60 * 60));
    let sent = capture_broadcasts(&log);

    let near_end = DateTime::<Utc>::MAX_UTC - chrono::Duration::days(1);
    let err = log.log("A".into(), "P".into(), near_end, None).unwrap_err();

    assert!(matches!(err, LogError::InvalidArgument(_)));
    assert!(log.is_empty().unwrap());
    assert!(sent.lock().unwrap().is_empty());
}

#[test]
fn retention_beyond_supported_range_fails_construction() {
    let err = LogConfig::from_json_str(r#"{"retention_ms": 100000000000000000}"#).unwrap_err();
    assert!(matches!(err, LogError::InvalidArgument(_)));

    let config = LogConfig {
        retention_ms: 100_000_000_000_000_000,
        ..LogConfig::default()
    };
    let err = Log::<String, String>::new(config, AppendOnly).unwrap_err();
    assert!(matches!(err, LogError::InvalidArgument(_)));

    let widest = append_only_log(Arc::new(ManualClock::new(t0())), MAX_DURATION);
    widest.log("A".into(), "P".into(), t0(), None).unwrap();
    assert!(widest.query(&"A".to_string()).unwrap().expires_at.unwrap() > t0());
}

#[test]
fn gc_keeps_entries_that_have_not_expired() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock.clone(), Duration::from_secs(60));

    log.log("short".into(), "x".into(), t0(), Some(Duration::from_secs(10)))
        .unwrap();
    log.log("long".into(), "y".into(), t0(), None).unwrap();

    clock.advance(Duration::from_secs(10));
    assert_eq!(log.gc().unwrap(), 1);
    assert_eq!(log.len().unwrap(), 1);
    assert!(log.query(&"long".to_string()).is_ok());
}

#[test]
fn newer_write_replaces_and_broadcasts() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock.clone(), Duration::from_secs(60));
    let sent = capture_broadcasts(&log);
    let a = "A".to_string();

    log.log(a.clone(), "P1".into(), t0(), None).unwrap();
    clock.advance(Duration::from_secs(5));
    log.log(a.clone(), "P2".into(), clock.now(), None).unwrap();

    let entry = log.query(&a).unwrap();
    assert_eq!(entry.payload, "P2");
    assert_eq!(entry.timestamp, t0() + secs(5));
    assert_eq!(entry.expires_at, Some(t0() + secs(65)));
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[test]
fn append_only_never_refreshes() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock.clone(), Duration::from_secs(60));
    let a = "A".to_string();

    log.log(a.clone(), "P1".into(), t0(), None).unwrap();
    clock.advance(Duration::from_secs(59));
    log.log(a.clone(), "P1".into(), t0(), None).unwrap();

    assert_eq!(log.query(&a).unwrap().expires_at, Some(t0() + secs(60)));
}

#[test]
fn tombstoning_refresh_extends_expiry() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log: Log<String, String, Tombstoning> = LogBuilder::new(
        LogConfig::new().retention(Duration::from_secs(60)),
        Tombstoning::with_refresh_window(Duration::from_secs(20)),
    )
    .clock(clock.clone())
    .build()
    .unwrap();
    let a = "A".to_string();

    log.log(a.clone(), "P1".into(), t0(), None).unwrap();
    clock.advance(Duration::from_secs(45));
    log.log(a.clone(), "P1".into(), t0(), None).unwrap();

    let entry = log.query(&a).unwrap();
    assert_eq!(entry.timestamp, t0());
    assert_eq!(entry.expires_at, Some(t0() + secs(105)));

    clock.advance(Duration::from_secs(30));
    assert_eq!(log.gc().unwrap(), 0, "refreshed entry must survive its original expiry");
}

#[test]
fn broadcast_failure_is_returned_but_state_is_kept() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock, Duration::from_secs(60));
    log.set_broadcast(|_| Err(LogError::Broadcast("cluster unreachable".into())))
        .unwrap();

    let err = log.log("A".into(), "P1".into(), t0(), None).unwrap_err();
    assert!(matches!(err, LogError::Broadcast(_)));
    assert!(log.query(&"A".to_string()).is_ok());
}

#[test]
fn query_metrics_count_misses() {
    let clock = Arc::new(ManualClock::new(t0()));
    let log = append_only_log(clock, Duration::from_secs(60));

    log.log("A".into(), "P1".into(), t0(), None).unwrap();
    log.query(&"A".to_string()).unwrap();
    let _ = log.query(&"missing".to_string());

    let metrics = log.metrics().snapshot();
    assert_eq!(metrics.queries_total, 2);
    assert_eq!(metrics.query_errors_total, 1);
}

#[test]
fn notification_log_dedup_helpers() {
    let log: NotificationLog = LogBuilder::new(LogConfig::new(), AppendOnly)
        .clock(Arc::new(ManualClock::new(t0())))
        .build()
        .unwrap();
    let receiver = Receiver::new("team-db", "pagerduty", 0);

    log.log_notification(&receiver, "{}:{service=\"db\"}", vec![11, 12], vec![10], None)
        .unwrap();

    let entry = log.query_notification(&receiver, "{}:{service=\"db\"}").unwrap();
    let firing = [11, 12, 13].into_iter().collect();
    assert!(entry.payload.is_firing_subset(&firing));
    assert!(!entry.payload.is_resolved_subset(&firing));
    assert_eq!(entry.timestamp, t0());
}

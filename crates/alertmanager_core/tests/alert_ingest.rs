mod common;

use alertmanager_core::db::{open_db, open_db_in_memory};
use alertmanager_core::{
    Actor, AlertCandidate, AlertId, AlertManagerConfig, AlertService, AlertServiceError,
    AlertState, AlertValidationError, EventLog, InMemoryEventLog, NoopNotifier, SqliteEventLog,
};
use chrono::Duration;
use common::{at, config, FailingNotifier, RacingLog, RecordingNotifier, RivalWrite};
use std::sync::Arc;

fn candidate(subject: &str) -> AlertCandidate {
    AlertCandidate::new(subject, format!("{subject} details"), at(12, 0))
}

fn active_subjects<L: EventLog, N: alertmanager_core::Notifier>(
    service: &AlertService<L, N>,
) -> Vec<String> {
    service
        .list_active_alerts()
        .unwrap()
        .into_iter()
        .map(|alert| alert.subject)
        .collect()
}

#[test]
fn dedup_and_capacity_scenario() {
    let conn = open_db_in_memory().unwrap();
    let notifier = RecordingNotifier::default();
    let service = AlertService::new(SqliteEventLog::new(&conn, "alerts"), &notifier, &config(2));

    assert!(service.ingest_one(candidate("disk-full")).unwrap());

    let created = service
        .ingest(&[candidate("disk-full"), candidate("net-down"), candidate("cpu-high")])
        .unwrap();

    assert!(created);
    assert_eq!(active_subjects(&service), vec!["disk-full", "net-down"]);
    assert_eq!(notifier.subjects(), vec!["disk-full", "net-down"]);
}

#[test]
fn committed_alerts_keep_candidate_fields_and_get_sequential_keys() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(
        SqliteEventLog::new(&conn, "alerts"),
        NoopNotifier,
        &config(5),
    );

    let committed = service
        .ingest_committed(&[candidate("disk-full"), candidate("net-down")])
        .unwrap();
    let listed = service.list_active_alerts().unwrap();

    assert_eq!(committed, listed);
    assert_eq!(listed[0].id, AlertId(1));
    assert_eq!(listed[1].id, AlertId(2));
    assert_eq!(listed[1].details, "net-down details");
    assert_eq!(listed[1].timestamp, at(12, 0));
}

#[test]
fn same_subject_is_committed_at_most_once() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(
        SqliteEventLog::new(&conn, "alerts"),
        NoopNotifier,
        &config(5),
    );

    assert!(service
        .ingest(&[candidate("net-down"), candidate("net-down")])
        .unwrap());
    assert_eq!(active_subjects(&service), vec!["net-down"]);

    let log = SqliteEventLog::new(&conn, "alerts");
    let version_before = log.current_version().unwrap();
    assert!(!service.ingest_one(candidate("net-down")).unwrap());
    assert_eq!(log.current_version().unwrap(), version_before);
}

#[test]
fn reingesting_after_acknowledge_creates_a_new_identity() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(
        SqliteEventLog::new(&conn, "alerts"),
        NoopNotifier,
        &config(5),
    );

    let first = service.ingest_committed(&[candidate("backup")]).unwrap();
    service.acknowledge(first[0].id, Actor::System).unwrap();

    let second = service.ingest_committed(&[candidate("backup")]).unwrap();
    assert_eq!(second.len(), 1);
    assert_ne!(second[0].id, first[0].id);
    assert!(second[0].id > first[0].id);
    assert_eq!(service.list_active_alerts().unwrap(), second);
}

#[test]
fn empty_batch_and_full_capacity_do_not_touch_the_log() {
    let log = InMemoryEventLog::new("alerts");
    let service = AlertService::new(&log, NoopNotifier, &config(1));

    assert!(!service.ingest(&[]).unwrap());
    assert_eq!(log.current_version().unwrap(), 0);

    assert!(service.ingest_one(candidate("a")).unwrap());
    assert!(!service.ingest(&[candidate("b"), candidate("c")]).unwrap());
    assert_eq!(log.current_version().unwrap(), 1);
}

#[test]
fn invalid_candidate_rejects_the_whole_batch() {
    let log = InMemoryEventLog::new("alerts");
    let service = AlertService::new(&log, NoopNotifier, &config(5));

    let err = service
        .ingest(&[candidate("disk-full"), candidate("   ")])
        .unwrap_err();
    assert!(matches!(
        err,
        AlertServiceError::InvalidCandidate {
            index: 1,
            source: AlertValidationError::EmptySubject
        }
    ));
    assert!(err.is_client_error());
    assert_eq!(log.current_version().unwrap(), 0);
}

#[test]
fn notification_failure_does_not_fail_ingestion() {
    let log = InMemoryEventLog::new("alerts");
    let service = AlertService::new(&log, FailingNotifier, &config(5));

    assert!(service.ingest_one(candidate("disk-full")).unwrap());
    assert_eq!(active_subjects(&service), vec!["disk-full"]);
}

#[test]
fn notifications_carry_ack_links_when_endpoint_is_configured() {
    let log = InMemoryEventLog::new("alerts");
    let notifier = RecordingNotifier::default();
    let config = AlertManagerConfig {
        api_endpoint: Some("https://am.example.com".to_string()),
        ..AlertManagerConfig::default()
    };
    let service = AlertService::new(&log, &notifier, &config);

    service.ingest_one(candidate("disk-full")).unwrap();

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].alert_key, AlertId(1));
    assert_eq!(
        sent[0].ack_link.as_deref(),
        Some("https://am.example.com/alerts/acknowledge?key=1")
    );
}

#[test]
fn conflict_is_retried_against_fresh_state() {
    let log = RacingLog::new(vec![RivalWrite::Raise("net-down")]);
    let notifier = RecordingNotifier::default();
    let service = AlertService::new(&log, &notifier, &config(3));

    let committed = service
        .ingest_committed(&[candidate("net-down"), candidate("cpu-high")])
        .unwrap();

    let subjects: Vec<&str> = committed.iter().map(|alert| alert.subject.as_str()).collect();
    assert_eq!(subjects, vec!["cpu-high"]);
    assert_eq!(committed[0].id, AlertId(2));
    assert_eq!(active_subjects(&service), vec!["net-down", "cpu-high"]);
    assert_eq!(notifier.subjects(), vec!["cpu-high"]);
}

#[test]
fn conflict_retries_are_bounded() {
    let log = RacingLog::new(vec![
        RivalWrite::Raise("rival-1"),
        RivalWrite::Raise("rival-2"),
        RivalWrite::Raise("rival-3"),
    ]);
    let notifier = RecordingNotifier::default();
    let config = AlertManagerConfig {
        max_active_alerts: 10,
        max_write_attempts: 3,
        ..AlertManagerConfig::default()
    };
    let service = AlertService::new(&log, &notifier, &config);

    let err = service.ingest_one(candidate("disk-full")).unwrap_err();
    assert!(matches!(
        err,
        AlertServiceError::ConflictRetriesExhausted { attempts: 3 }
    ));
    assert!(!err.is_client_error());
    assert!(notifier.subjects().is_empty());
    assert!(!active_subjects(&service).contains(&"disk-full".to_string()));
}

#[test]
fn replaying_the_log_reproduces_the_live_projection() {
    let conn = open_db_in_memory().unwrap();
    let log = SqliteEventLog::new(&conn, "alerts");
    let service = AlertService::new(&log, NoopNotifier, &config(4));

    let mut live = AlertState::new();
    for round in 0..6 {
        let batch: Vec<AlertCandidate> = (0..3)
            .map(|offset| candidate(&format!("subject-{}", (round + offset) % 5)))
            .collect();
        service.ingest(&batch).unwrap();
        if let Some(oldest) = service.list_active_alerts().unwrap().first() {
            service.acknowledge(oldest.id, Actor::System).unwrap();
        }
        live.refresh(&log).unwrap();
    }

    let replayed = AlertState::fold(&log.read_from(0).unwrap());
    assert_eq!(replayed, live);
    assert_eq!(replayed.active_alerts(), service.list_active_alerts().unwrap());
}

#[test]
fn concurrent_ingest_on_shared_memory_log_respects_capacity() {
    let log = Arc::new(InMemoryEventLog::new("alerts"));
    let config = AlertManagerConfig {
        max_active_alerts: 3,
        max_write_attempts: 50,
        ..AlertManagerConfig::default()
    };
    AlertService::new(Arc::clone(&log), NoopNotifier, &config)
        .ingest_one(candidate("already-firing"))
        .unwrap();

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let log = Arc::clone(&log);
            let config = config.clone();
            scope.spawn(move || {
                let service = AlertService::new(log, NoopNotifier, &config);
                service
                    .ingest_one(candidate(&format!("worker-{worker}")))
                    .unwrap();
            });
        }
    });

    let state = AlertState::load(&log).unwrap();
    assert_eq!(state.active_count(), 3);
    assert!(state.find_by_subject("already-firing").is_some());
}

#[test]
fn concurrent_ingest_across_sqlite_connections_respects_capacity_and_dedup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.db");
    drop(open_db(&path).unwrap());

    let config = AlertManagerConfig {
        max_active_alerts: 4,
        max_write_attempts: 50,
        ..AlertManagerConfig::default()
    };

    std::thread::scope(|scope| {
        for worker in 0..6 {
            let path = path.clone();
            let config = config.clone();
            scope.spawn(move || {
                let conn = open_db(&path).unwrap();
                let service =
                    AlertService::new(SqliteEventLog::new(&conn, "alerts"), NoopNotifier, &config);
                service
                    .ingest(&[candidate("shared"), candidate(&format!("worker-{worker}"))])
                    .unwrap();
            });
        }
    });

    let conn = open_db(&path).unwrap();
    let state = AlertState::load(&SqliteEventLog::new(&conn, "alerts")).unwrap();
    assert_eq!(state.active_count(), 4);
    let shared = state
        .active_alerts()
        .into_iter()
        .filter(|alert| alert.subject == "shared")
        .count();
    assert_eq!(shared, 1);
}

#[test]
fn committed_alert_matches_stored_alert_at_sub_millisecond_input() {
    let conn = open_db_in_memory().unwrap();
    let notifier = RecordingNotifier::default();
    let service = AlertService::new(SqliteEventLog::new(&conn, "alerts"), &notifier, &config(5));
    let timestamp = at(12, 0) + Duration::nanoseconds(123_456_789);

    let committed = service
        .ingest_committed(&[AlertCandidate::new("disk-full", "95%", timestamp)])
        .unwrap();
    let listed = service.list_active_alerts().unwrap();

    assert_eq!(committed, listed);
    assert_eq!(committed[0].timestamp, at(12, 0) + Duration::milliseconds(123));
    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent[0].timestamp, listed[0].timestamp);
}

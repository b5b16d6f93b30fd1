//! Integration tests for starting batches of sessions.

mod common;

use anyhow::Result;
use common::{FakeDriver, drain, drain_logs, manager};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamdock_core::{Config, Error, SessionEvent, SessionStatus, StreamRequest};
use streamdock_docker::VolumeMode;

#[tokio::test]
async fn test_file_batch_end_to_end() -> Result<()> {
    let driver = FakeDriver::new();
    let (manager, mut events) = manager(&driver, Config::default());

    let request = StreamRequest::new("https://kick.com/somechannel", "480p")
        .to_directory("/tmp/out")
        .with_count(3);
    let report = manager.start_batch(&request).await?;

    assert_eq!(report.started.len(), 3);
    assert!(report.failures.is_empty());

    let runs = driver.runs();
    assert_eq!(runs.len(), 3);
    for (i, spec) in runs.iter().enumerate() {
        assert_eq!(spec.name, format!("streamlink-session-{i}"));
        assert_eq!(spec.image, "streamlink-tor");
        assert!(spec.auto_remove);
        assert_eq!(spec.environment["STREAM_URL"], "https://kick.com/somechannel");
        assert_eq!(spec.environment["STREAM_QUALITY"], "480p");
        assert_eq!(
            spec.environment["OUTPUT_FILE"],
            format!("/output/stream_session_{i}.mp4")
        );

        let binding = spec.volumes.get("/tmp/out").expect("output directory bound");
        assert_eq!(binding.container_path, "/output");
        assert_eq!(binding.mode, VolumeMode::ReadWrite);
        assert_eq!(spec.volumes.len(), 1);
    }

    let sessions = manager.sessions();
    assert_eq!(sessions.len(), 3);
    for (i, session) in (0u64..).zip(&sessions) {
        assert_eq!(session.sequence, i);
        assert_eq!(session.runtime_status, SessionStatus::Running);
        assert_eq!(session.output_target, format!("/output/stream_session_{i}.mp4"));
        assert_eq!(session.source_url, "https://kick.com/somechannel");
    }

    let created: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::Created(session) => Some(session.name),
            _ => None,
        })
        .collect();
    assert_eq!(
        created,
        ["streamlink-session-0", "streamlink-session-1", "streamlink-session-2"]
    );

    println!("✓ three sessions started with file output");
    Ok(())
}

#[tokio::test]
async fn test_single_file_session_writes_stream_mp4() -> Result<()> {
    let driver = FakeDriver::new();
    let (manager, _events) = manager(&driver, Config::default());

    let request = StreamRequest::new("https://kick.com/x", "720p").to_directory("/data");
    let report = manager.start_batch(&request).await?;

    assert_eq!(report.started[0].output_target, "/output/stream.mp4");
    assert_eq!(driver.runs()[0].environment["OUTPUT_FILE"], "/output/stream.mp4");
    Ok(())
}

#[tokio::test]
async fn test_stdout_session_has_no_volume() -> Result<()> {
    let driver = FakeDriver::new();
    let (manager, _events) = manager(&driver, Config::default());

    let report = manager
        .start_batch(&StreamRequest::new("https://kick.com/x", "best"))
        .await?;

    let spec = &driver.runs()[0];
    assert_eq!(spec.environment["OUTPUT_FILE"], "-");
    assert!(spec.volumes.is_empty());
    assert!(report.started[0].writes_to_stdout());
    Ok(())
}

#[tokio::test]
async fn test_file_mode_without_directory_falls_back_to_stdout() -> Result<()> {
    let driver = FakeDriver::new();
    let (manager, _events) = manager(&driver, Config::default());

    let request = StreamRequest::new("https://kick.com/x", "best").to_directory("   ");
    manager.start_batch(&request).await?;

    let spec = &driver.runs()[0];
    assert_eq!(spec.environment["OUTPUT_FILE"], "-");
    assert!(spec.volumes.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_partial_failure_keeps_going() -> Result<()> {
    let driver = FakeDriver::new();
    driver.fail_run(1);
    let (manager, mut events) = manager(&driver, Config::default());

    let request = StreamRequest::new("https://kick.com/x", "480p").with_count(4);
    let report = manager.start_batch(&request).await?;

    assert_eq!(driver.runs().len(), 4, "every index is attempted");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, 1);

    let names: Vec<String> = manager.sessions().into_iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        [
            "streamlink-session-0",
            "streamlink-session-2",
            "streamlink-session-3"
        ]
    );

    let logs = drain_logs(&mut events);
    assert!(logs.iter().any(|l| l.starts_with("Error starting container 2")));
    assert_eq!(logs.last().map(String::as_str), Some("Started 3 of 4 container(s)"));
    Ok(())
}

#[tokio::test]
async fn test_sequence_numbers_are_never_reused() -> Result<()> {
    let driver = FakeDriver::new();
    let (manager, _events) = manager(&driver, Config::default());
    let request = StreamRequest::new("https://kick.com/x", "480p").with_count(2);

    let first = manager.start_batch(&request).await?;
    for session in &first.started {
        manager.stop_session(&session.id).await?;
    }
    assert!(manager.registry().is_empty());

    let second = manager.start_batch(&request).await?;
    let sequences: Vec<u64> = second.started.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, [2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_batches_get_unique_names() -> Result<()> {
    let driver = FakeDriver::new();
    let (manager, _events) = manager(&driver, Config::default());
    let manager = Arc::new(manager);
    let request = StreamRequest::new("https://kick.com/x", "480p").with_count(5);

    let a = tokio::spawn({
        let manager = Arc::clone(&manager);
        let request = request.clone();
        async move { manager.start_batch(&request).await }
    });
    let b = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.start_batch(&request).await }
    });
    a.await??;
    b.await??;

    let sessions = manager.sessions();
    assert_eq!(sessions.len(), 10);
    let names: HashSet<String> = sessions.iter().map(|s| s.name.clone()).collect();
    assert_eq!(names.len(), 10);
    let sequences: HashSet<u64> = sessions.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, (0..10).collect::<HashSet<u64>>());
    Ok(())
}

#[tokio::test]
async fn test_custom_prefix_and_auto_remove() -> Result<()> {
    let driver = FakeDriver::new();
    let config = Config {
        container_prefix: "capture".to_string(),
        auto_remove_containers: false,
        ..Config::default()
    };
    let (manager, _events) = manager(&driver, config);

    manager
        .start_batch(&StreamRequest::new("https://kick.com/x", "480p").with_count(2))
        .await?;

    let runs = driver.runs();
    assert_eq!(runs[0].name, "capture-0");
    assert_eq!(runs[1].name, "capture-1");
    assert!(runs.iter().all(|spec| !spec.auto_remove));
    Ok(())
}

#[tokio::test]
async fn test_invalid_request_starts_nothing() -> Result<()> {
    let driver = FakeDriver::new();
    let (manager, _events) = manager(&driver, Config::default());

    let zero = StreamRequest::new("https://kick.com/x", "480p").with_count(0);
    assert!(matches!(manager.start_batch(&zero).await, Err(Error::Config(_))));

    let blank = StreamRequest::new("  ", "480p");
    assert!(matches!(manager.start_batch(&blank).await, Err(Error::Config(_))));

    let no_image = {
        let config = Config {
            docker_image: " ".to_string(),
            ..Config::default()
        };
        let (manager, _events) = common::manager(&driver, config);
        manager
            .start_batch(&StreamRequest::new("https://kick.com/x", "480p"))
            .await
    };
    assert!(matches!(no_image, Err(Error::Config(_))));

    assert!(driver.runs().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_container_id_is_fatal() -> Result<()> {
    let driver = FakeDriver::new();
    driver.repeat_id("abc123");
    let (manager, mut events) = manager(&driver, Config::default());

    let result = manager
        .start_batch(&StreamRequest::new("https://kick.com/x", "480p").with_count(3))
        .await;

    assert!(matches!(result, Err(Error::DuplicateId(_))));
    assert_eq!(driver.runs().len(), 2, "batch stops at the duplicate");
    assert_eq!(manager.registry().len(), 1);
    assert!(
        drain_logs(&mut events)
            .last()
            .is_some_and(|l| l.starts_with("Stopped starting containers:"))
    );
    Ok(())
}

#[tokio::test]
async fn test_unavailable_runtime_ends_batch_at_once() -> Result<()> {
    let driver = FakeDriver::new();
    driver.set_unavailable(true);
    let (manager, mut events) = manager(&driver, Config::default());
    let manager = manager.with_launch_delay(Duration::from_millis(300));

    let started = Instant::now();
    let result = manager
        .start_batch(&StreamRequest::new("https://kick.com/x", "480p").with_count(5))
        .await;

    assert!(result.is_err_and(|e| e.is_unavailable()));
    assert_eq!(driver.run_attempts(), 1);
    assert!(started.elapsed() < Duration::from_millis(300), "no launch delay was slept");
    assert!(manager.registry().is_empty());

    let logs = drain_logs(&mut events);
    assert_eq!(logs.iter().filter(|l| l.starts_with("Docker error:")).count(), 1);
    assert_eq!(logs.last().map(String::as_str), Some("Started 0 of 5 container(s)"));
    Ok(())
}

#[tokio::test]
async fn test_daemon_lost_mid_batch_keeps_started_sessions() -> Result<()> {
    let driver = FakeDriver::new();
    driver.go_down_after(2);
    let (manager, _events) = manager(&driver, Config::default());

    let result = manager
        .start_batch(&StreamRequest::new("https://kick.com/x", "480p").with_count(4))
        .await;

    assert!(matches!(result, Err(Error::RuntimeUnavailable(_))));
    assert_eq!(driver.run_attempts(), 3);
    let names: Vec<String> = manager.sessions().into_iter().map(|s| s.name).collect();
    assert_eq!(names, ["streamlink-session-0", "streamlink-session-1"]);
    Ok(())
}

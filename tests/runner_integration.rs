//! Runner and delivery integration tests.
//!
//! These spawn real processes through `sh`, so they only run on Unix.
#![cfg(unix)]

use std::path::Path;
use std::time::{Duration, Instant};

use shell_relay::execution::{deliver, CommandRunner, DeliveryMode, StreamFrame};
use shell_relay::{CommandRequest, CommandResult, RelayError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Wait until `path` exists and parse the pid written into it.
async fn read_pid(path: &Path) -> u32 {
    let start = Instant::now();
    loop {
        if let Ok(text) = std::fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        assert!(start.elapsed() < Duration::from_secs(5), "pid file never appeared");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Collect every frame until the sender side is gone.
async fn drain(mut rx: mpsc::Receiver<StreamFrame>) -> Vec<StreamFrame> {
    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}

// ============================================================================
// Command Runner
// ============================================================================

#[tokio::test]
async fn test_echo_hello() {
    let runner = CommandRunner::default();
    let request = CommandRequest::new("echo hello").working_directory(".");

    let result = runner.run(&request, &CancellationToken::new()).await;

    assert_eq!(result, CommandResult::new("hello\n", "", 0));
}

#[tokio::test]
async fn test_exit_codes_are_preserved() {
    let runner = CommandRunner::default();
    for code in [0, 1, 2, 7, 42, 255] {
        let request = CommandRequest::new(format!("exit {code}"));
        let result = runner.run(&request, &CancellationToken::new()).await;
        assert_eq!(result.exit_status, code);
    }
}

#[tokio::test]
async fn test_output_and_failure_together() {
    let runner = CommandRunner::default();
    let request = CommandRequest::new("echo partial; echo oops >&2; exit 3");

    let result = runner.run(&request, &CancellationToken::new()).await;

    assert_eq!(result, CommandResult::new("partial\n", "oops\n", 3));
}

#[tokio::test]
async fn test_killed_by_signal_reports_failure() {
    let runner = CommandRunner::default();
    let request = CommandRequest::new("kill -9 $$");

    let result = runner.run(&request, &CancellationToken::new()).await;

    assert_eq!(result.exit_status, 1);
}

#[tokio::test]
async fn test_cancel_kills_process() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let request = CommandRequest::new("echo $$ > pid; exec sleep 30")
        .working_directory(dir.path().to_string_lossy());

    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        CommandRunner::default().run(&request, &task_cancel).await
    });

    let pid = read_pid(&pid_file).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("run did not return after cancellation")
        .unwrap();

    assert_eq!(result, CommandResult::cancelled());
    assert!(!process_alive(pid));
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let runner = CommandRunner::default();
    let cancel = CancellationToken::new();

    let a = CommandRequest::new("sleep 0.2; echo first");
    let b = CommandRequest::new("echo second; exit 5");
    let (ra, rb) = tokio::join!(runner.run(&a, &cancel), runner.run(&b, &cancel));

    assert_eq!(ra, CommandResult::new("first\n", "", 0));
    assert_eq!(rb, CommandResult::new("second\n", "", 5));
}

// ============================================================================
// Live Resend
// ============================================================================

#[tokio::test]
async fn test_live_resend_sends_progress_then_one_final() {
    let (tx, rx) = mpsc::channel(64);
    let mode = DeliveryMode::LiveResend {
        interval: Duration::from_millis(100),
    };
    let request = CommandRequest::new("echo start; sleep 1; echo done; exit 4");

    deliver(&CommandRunner::default(), mode, &request, &CancellationToken::new(), &tx)
        .await
        .unwrap();
    drop(tx);

    let frames = drain(rx).await;
    let (last, progress) = frames.split_last().unwrap();

    assert!(!progress.is_empty());
    assert!(progress.iter().all(|f| !f.is_final));
    assert!(progress.iter().any(|f| f.result.stdout == "start\n"));
    assert!(last.is_final);
    assert_eq!(last.result, CommandResult::new("start\ndone\n", "", 4));
}

#[tokio::test]
async fn test_live_resend_cancel_sends_sentinel() {
    let (tx, rx) = mpsc::channel(64);
    let mode = DeliveryMode::LiveResend {
        interval: Duration::from_millis(50),
    };
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        let request = CommandRequest::new("sleep 30");
        deliver(&CommandRunner::default(), mode, &request, &task_cancel, &tx).await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_ok());

    let frames = drain(rx).await;
    let last = frames.last().unwrap();
    assert!(last.is_final);
    assert_eq!(last.result, CommandResult::cancelled());
}

#[tokio::test]
async fn test_live_resend_receiver_gone_kills_child() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let request = CommandRequest::new("echo $$ > pid; exec sleep 30")
        .working_directory(dir.path().to_string_lossy());

    let (tx, mut rx) = mpsc::channel(1);
    let mode = DeliveryMode::LiveResend {
        interval: Duration::from_millis(50),
    };
    let task = tokio::spawn(async move {
        deliver(&CommandRunner::default(), mode, &request, &CancellationToken::new(), &tx).await
    });

    assert!(rx.recv().await.is_some());
    let pid = read_pid(&pid_file).await;
    drop(rx);

    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, Err(RelayError::ChannelClosed)));
    assert!(!process_alive(pid));
}

// ============================================================================
// Repeated Poll
// ============================================================================

#[tokio::test]
async fn test_poll_runs_fresh_each_interval() {
    let dir = tempfile::tempdir().unwrap();
    let request = CommandRequest::new("echo x >> runs; wc -l < runs")
        .working_directory(dir.path().to_string_lossy());

    let (tx, mut rx) = mpsc::channel(8);
    let mode = DeliveryMode::RepeatedPoll {
        interval: Duration::from_millis(200),
    };
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        deliver(&CommandRunner::default(), mode, &request, &task_cancel, &tx).await
    });

    let start = Instant::now();
    let mut counts = Vec::new();
    for _ in 0..3 {
        let frame = rx.recv().await.unwrap();
        assert!(!frame.is_final);
        assert_eq!(frame.result.exit_status, 0);
        counts.push(frame.result.stdout.trim().to_string());
    }
    let elapsed = start.elapsed();

    // Each result is its own run, not a growing buffer
    assert_eq!(counts, ["1", "2", "3"]);
    assert!(elapsed >= Duration::from_millis(350));

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_poll_stops_when_caller_disconnects() {
    let (tx, mut rx) = mpsc::channel(1);
    let mode = DeliveryMode::RepeatedPoll {
        interval: Duration::from_millis(50),
    };
    let task = tokio::spawn(async move {
        let request = CommandRequest::new("echo tick");
        deliver(&CommandRunner::default(), mode, &request, &CancellationToken::new(), &tx).await
    });

    assert_eq!(rx.recv().await.unwrap().result.stdout, "tick\n");
    drop(rx);

    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, Err(RelayError::ChannelClosed)));
}

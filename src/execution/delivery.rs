//! Result delivery policies layered over [`CommandRunner`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::request::CommandRequest;
use super::result::{CommandResult, StreamFrame};
use super::runner::CommandRunner;
use crate::error::RelayError;
use crate::Result;

/// Default resend interval for [`DeliveryMode::LiveResend`].
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(500);

/// Default re-run interval for [`DeliveryMode::RepeatedPoll`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Mode name as it appears on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    /// One run, one reply.
    #[default]
    Single,
    /// One run, current buffers resent on a timer until it exits.
    Stream,
    /// The command is re-run from scratch on a timer, forever.
    Poll,
}

/// How the results of a request reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Single,
    LiveResend { interval: Duration },
    RepeatedPoll { interval: Duration },
}

impl DeliveryMode {
    /// Resolve a wire mode against the configured intervals.
    pub fn from_kind(kind: DeliveryKind, resend: Duration, poll: Duration) -> Self {
        match kind {
            DeliveryKind::Single => Self::Single,
            DeliveryKind::Stream => Self::LiveResend { interval: resend },
            DeliveryKind::Poll => Self::RepeatedPoll { interval: poll },
        }
    }

    pub fn kind(&self) -> DeliveryKind {
        match self {
            Self::Single => DeliveryKind::Single,
            Self::LiveResend { .. } => DeliveryKind::Stream,
            Self::RepeatedPoll { .. } => DeliveryKind::Poll,
        }
    }
}

async fn send(tx: &mpsc::Sender<StreamFrame>, frame: StreamFrame) -> Result<()> {
    tx.send(frame).await.map_err(|_| RelayError::ChannelClosed)
}

/// Drive `request` through `mode`, pushing frames into `tx`.
///
/// Returns `Err(RelayError::ChannelClosed)` when the receiver goes away
/// mid-stream; any child still running at that point is killed first.
/// Cancellation ends delivery with `Ok(())`.
pub async fn deliver(
    runner: &CommandRunner,
    mode: DeliveryMode,
    request: &CommandRequest,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<StreamFrame>,
) -> Result<()> {
    match mode {
        DeliveryMode::Single => {
            let result = runner.run(request, cancel).await;
            send(tx, StreamFrame::finished(result)).await
        }
        DeliveryMode::LiveResend { interval } => {
            live_resend(runner, interval, request, cancel, tx).await
        }
        DeliveryMode::RepeatedPoll { interval } => {
            repeated_poll(runner, interval, request, cancel, tx).await
        }
    }
}

/// Run once; resend the accumulated buffers every `every` until exit, then
/// send the final result.
///
/// Every frame carries the whole output so far, not the delta since the
/// previous frame.
async fn live_resend(
    runner: &CommandRunner,
    every: Duration,
    request: &CommandRequest,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<StreamFrame>,
) -> Result<()> {
    let mut running = match runner.spawn(request) {
        Ok(running) => running,
        Err(e) => {
            warn!(command = %request.command, "{}", e);
            return send(tx, StreamFrame::finished(CommandResult::spawn_failed(&e))).await;
        }
    };
    let output = running.output();

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = {
        let completion = running.wait_or_cancel(cancel);
        tokio::pin!(completion);

        loop {
            tokio::select! {
                result = &mut completion => break Ok(result),
                _ = ticker.tick() => {
                    if send(tx, StreamFrame::progress(output.snapshot())).await.is_err() {
                        break Err(RelayError::ChannelClosed);
                    }
                    debug!(
                        bytes = output.stdout.len() + output.stderr.len(),
                        "resent buffered output"
                    );
                }
            }
        }
    };

    match outcome {
        Ok(result) if cancel.is_cancelled() => {
            // Caller is most likely gone already
            let _ = tx.send(StreamFrame::finished(result)).await;
            Ok(())
        }
        Ok(result) => send(tx, StreamFrame::finished(result)).await,
        Err(e) => {
            warn!("stream receiver dropped, killing child");
            running.kill().await;
            Err(e)
        }
    }
}

/// Re-run the command from scratch every `every`, sending each result,
/// until cancelled or the receiver goes away.
async fn repeated_poll(
    runner: &CommandRunner,
    every: Duration,
    request: &CommandRequest,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<StreamFrame>,
) -> Result<()> {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tx.closed() => return Err(RelayError::ChannelClosed),
            _ = ticker.tick() => {}
        }

        let result = runner.run(request, cancel).await;
        if cancel.is_cancelled() {
            return Ok(());
        }
        send(tx, StreamFrame::progress(result)).await?;
    }
}

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, SinkExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::error::Result;
use crate::measurement::LoopExit;

// ─── Close side of the channel ───────────────────────────────────

/// Write half able to start the cooperative close handshake.
#[async_trait]
pub trait CloseChannel: Send {
    async fn send_close(&mut self) -> Result<()>;
}

/// Wraps the write half of a split WebSocket.
pub struct WsCloser<S>(pub S);

#[async_trait]
impl<S> CloseChannel for WsCloser<S>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin + Send,
{
    async fn send_close(&mut self) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        self.0.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}

// ─── Coordinator ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ClosingInitiated,
    Finalized,
}

/// Which leg of the race ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    Interrupted,
    Completed,
}

#[derive(Debug)]
pub struct ShutdownOutcome {
    pub cause: ShutdownCause,
    /// `None` when the reader was abandoned or panicked.
    pub loop_exit: Option<LoopExit>,
    pub close_sent: bool,
    pub grace_expired: bool,
    pub state: ShutdownState,
}

impl ShutdownOutcome {
    /// Operator-facing line describing why the connection was closed.
    pub fn closing_message(&self) -> &'static str {
        match (self.cause, &self.loop_exit) {
            (ShutdownCause::Interrupted, _) => {
                "Interrupt signal received, closing connection..."
            }
            (ShutdownCause::Completed, Some(LoopExit::CapReached { .. })) => {
                "Reached max number of tests, closing connection..."
            }
            (ShutdownCause::Completed, _) => "Connection ended, closing connection...",
        }
    }
}

/// Races an interrupt against the reader task, then closes the channel.
pub struct ShutdownCoordinator {
    grace: Duration,
    state: ShutdownState,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            state: ShutdownState::Running,
        }
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// `Running → ClosingInitiated`; returns `false` on any later call.
    fn initiate_close(&mut self) -> bool {
        if self.state != ShutdownState::Running {
            return false;
        }
        self.state = ShutdownState::ClosingInitiated;
        true
    }

    /// Wait for whichever comes first: `interrupt` or the reader task.
    ///
    /// After an interrupt the reader gets `grace` to observe the close
    /// and exit; past that it is aborted and the run finalizes with the
    /// samples collected so far. When the reader finishes first the
    /// interrupt future is dropped.
    pub async fn run<I, C>(
        mut self,
        interrupt: I,
        mut reader: JoinHandle<LoopExit>,
        closer: &mut C,
    ) -> ShutdownOutcome
    where
        I: Future<Output = ()>,
        C: CloseChannel + ?Sized,
    {
        let (cause, mut loop_exit) = tokio::select! {
            _ = interrupt => (ShutdownCause::Interrupted, None),
            joined = &mut reader => (ShutdownCause::Completed, joined_exit(joined)),
        };
        tracing::debug!(?cause, "closing connection");

        let mut close_sent = false;
        if self.initiate_close() {
            match closer.send_close().await {
                Ok(()) => close_sent = true,
                Err(e) => tracing::warn!(error = %e, "failed to send close frame"),
            }
        }

        let mut grace_expired = false;
        if cause == ShutdownCause::Interrupted {
            match tokio::time::timeout(self.grace, &mut reader).await {
                Ok(joined) => loop_exit = joined_exit(joined),
                Err(_) => {
                    tracing::info!(
                        grace_ms = self.grace.as_millis() as u64,
                        "reader still running after grace period, finalizing with partial results"
                    );
                    reader.abort();
                    grace_expired = true;
                }
            }
        }

        self.state = ShutdownState::Finalized;
        ShutdownOutcome {
            cause,
            loop_exit,
            close_sent,
            grace_expired,
            state: self.state,
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
///
/// If a handler cannot be installed that leg never fires.
pub async fn interrupt_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn joined_exit(joined: std::result::Result<LoopExit, tokio::task::JoinError>) -> Option<LoopExit> {
    match joined {
        Ok(exit) => Some(exit),
        Err(e) => {
            tracing::warn!(error = %e, "measurement task did not complete");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LatencyError;
    use tokio::sync::oneshot;

    /// Records close calls; optionally fails or wakes the fake reader.
    #[derive(Default)]
    struct FakeCloser {
        calls: usize,
        fail: bool,
        wake_reader: Option<oneshot::Sender<()>>,
    }

    #[async_trait]
    impl CloseChannel for FakeCloser {
        async fn send_close(&mut self) -> Result<()> {
            self.calls += 1;
            if let Some(tx) = self.wake_reader.take() {
                let _ = tx.send(());
            }
            if self.fail {
                return Err(LatencyError::ChannelClosed);
            }
            Ok(())
        }
    }

    fn stalled_reader() -> JoinHandle<LoopExit> {
        tokio::spawn(std::future::pending::<LoopExit>())
    }

    #[test]
    fn close_is_initiated_once() {
        let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        assert_eq!(coordinator.state(), ShutdownState::Running);
        assert!(coordinator.initiate_close());
        assert!(!coordinator.initiate_close());
        assert_eq!(coordinator.state(), ShutdownState::ClosingInitiated);
    }

    #[tokio::test]
    async fn completion_wins_and_interrupt_is_abandoned() {
        let reader = tokio::spawn(async { LoopExit::CapReached { processed: 5 } });
        let mut closer = FakeCloser::default();

        let outcome = ShutdownCoordinator::new(Duration::from_secs(1))
            .run(std::future::pending::<()>(), reader, &mut closer)
            .await;

        assert_eq!(outcome.cause, ShutdownCause::Completed);
        assert_eq!(outcome.loop_exit, Some(LoopExit::CapReached { processed: 5 }));
        assert_eq!(outcome.state, ShutdownState::Finalized);
        assert!(outcome.close_sent);
        assert!(!outcome.grace_expired);
        assert_eq!(closer.calls, 1);
        assert_eq!(
            outcome.closing_message(),
            "Reached max number of tests, closing connection..."
        );
    }

    #[tokio::test]
    async fn interrupt_waits_for_reader_to_observe_close() {
        let (tx, rx) = oneshot::channel();
        let reader = tokio::spawn(async move {
            let _ = rx.await;
            LoopExit::StreamEnded {
                processed: 0,
                reason: "channel closed by peer".into(),
            }
        });
        let mut closer = FakeCloser {
            wake_reader: Some(tx),
            ..Default::default()
        };

        let outcome = ShutdownCoordinator::new(Duration::from_secs(1))
            .run(std::future::ready(()), reader, &mut closer)
            .await;

        assert_eq!(outcome.cause, ShutdownCause::Interrupted);
        assert!(matches!(
            outcome.loop_exit,
            Some(LoopExit::StreamEnded { processed: 0, .. })
        ));
        assert!(!outcome.grace_expired);
        assert_eq!(closer.calls, 1);
        assert_eq!(
            outcome.closing_message(),
            "Interrupt signal received, closing connection..."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn grace_period_expiry_finalizes_with_partial_results() {
        let mut closer = FakeCloser::default();
        let started = tokio::time::Instant::now();

        let outcome = ShutdownCoordinator::new(Duration::from_secs(1))
            .run(std::future::ready(()), stalled_reader(), &mut closer)
            .await;

        assert!(outcome.grace_expired);
        assert!(outcome.loop_exit.is_none());
        assert_eq!(outcome.state, ShutdownState::Finalized);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_close_is_not_escalated() {
        let mut closer = FakeCloser {
            fail: true,
            ..Default::default()
        };

        let outcome = ShutdownCoordinator::new(Duration::from_millis(200))
            .run(std::future::ready(()), stalled_reader(), &mut closer)
            .await;

        assert!(!outcome.close_sent);
        assert!(outcome.grace_expired);
        assert_eq!(closer.calls, 1);
    }
}

//! Message loop supervision.
//!
//! # Responsibilities
//! - Run the transport's poll loop as its own task
//! - Race it against the shutdown signal
//! - Cancel whichever side is still pending
//! - Close the transport session exactly once, on every path

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;

use crate::lifecycle::Shutdown;
use crate::transport::{Transport, TransportError};

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The shutdown signal fired and the loop was cancelled.
    ShutdownRequested,
    /// The loop returned on its own.
    LoopFinished,
}

/// Fatal failures of the message loop.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("message loop failed: {0}")]
    Transport(#[from] TransportError),

    #[error("message loop panicked")]
    LoopPanicked,
}

/// Drive `transport` until its loop ends or `shutdown` fires, then close the
/// session.
pub async fn run_until_shutdown<T>(transport: Arc<T>, shutdown: &Shutdown) -> Result<RunOutcome, LifecycleError>
where
    T: Transport + ?Sized,
{
    let poller = Arc::clone(&transport);
    let mut polling = tokio::spawn(async move { poller.start_polling().await });

    let outcome = tokio::select! {
        joined = &mut polling => loop_outcome(joined),
        _ = shutdown.wait() => {
            tracing::info!("Stopping message loop");
            polling.abort();
            match polling.await {
                Err(e) if e.is_cancelled() => Ok(RunOutcome::ShutdownRequested),
                // Finished on its own just before the abort landed.
                joined => loop_outcome(joined).map(|_| RunOutcome::ShutdownRequested),
            }
        }
    };

    if let Err(e) = transport.close().await {
        tracing::warn!(error = %e, "Transport session did not close cleanly");
    }

    outcome
}

fn loop_outcome(joined: Result<Result<(), TransportError>, JoinError>) -> Result<RunOutcome, LifecycleError> {
    match joined {
        Ok(Ok(())) => Ok(RunOutcome::LoopFinished),
        Ok(Err(e)) => Err(LifecycleError::Transport(e)),
        Err(e) if e.is_panic() => Err(LifecycleError::LoopPanicked),
        Err(_) => Ok(RunOutcome::LoopFinished),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Behavior {
        Forever,
        Finish,
        Fail,
        Panic,
    }

    struct ScriptedTransport {
        behavior: Behavior,
        events: Mutex<Vec<&'static str>>,
    }

    impl ScriptedTransport {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self { behavior, events: Mutex::new(Vec::new()) })
        }

        fn record(&self, event: &'static str) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }
    }

    /// Records the loop being dropped, i.e. cancelled or returned.
    struct DropProbe<'a>(&'a ScriptedTransport);

    impl Drop for DropProbe<'_> {
        fn drop(&mut self) {
            self.0.record("loop_dropped");
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn start_polling(&self) -> Result<(), TransportError> {
            self.record("loop_started");
            let _probe = DropProbe(self);
            match self.behavior {
                Behavior::Forever => loop {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                },
                Behavior::Finish => Ok(()),
                Behavior::Fail => Err(TransportError::Unauthorized),
                Behavior::Panic => panic!("poll loop blew up"),
            }
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.record("session_closed");
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_cancels_loop_then_closes() {
        let transport = ScriptedTransport::new(Behavior::Forever);
        let shutdown = Shutdown::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let outcome = run_until_shutdown(Arc::clone(&transport), &shutdown).await.unwrap();

        assert_eq!(outcome, RunOutcome::ShutdownRequested);
        assert_eq!(transport.events(), vec!["loop_started", "loop_dropped", "session_closed"]);
    }

    #[tokio::test]
    async fn loop_finishing_first_still_closes() {
        let transport = ScriptedTransport::new(Behavior::Finish);
        let shutdown = Shutdown::new();

        let outcome = run_until_shutdown(Arc::clone(&transport), &shutdown).await.unwrap();

        assert_eq!(outcome, RunOutcome::LoopFinished);
        assert_eq!(transport.events().last(), Some(&"session_closed"));
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn loop_error_is_returned_after_close() {
        let transport = ScriptedTransport::new(Behavior::Fail);
        let err = run_until_shutdown(Arc::clone(&transport), &Shutdown::new()).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Transport(TransportError::Unauthorized)));
        assert_eq!(transport.events().iter().filter(|e| **e == "session_closed").count(), 1);
    }

    #[tokio::test]
    async fn loop_panic_is_contained() {
        let transport = ScriptedTransport::new(Behavior::Panic);
        let err = run_until_shutdown(Arc::clone(&transport), &Shutdown::new()).await.unwrap_err();

        assert!(matches!(err, LifecycleError::LoopPanicked));
        assert_eq!(transport.events().last(), Some(&"session_closed"));
    }

    #[tokio::test]
    async fn already_triggered_shutdown_stops_immediately() {
        let transport = ScriptedTransport::new(Behavior::Forever);
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            run_until_shutdown(Arc::clone(&transport), &shutdown),
        )
        .await
        .expect("coordinator hung")
        .unwrap();

        assert_eq!(outcome, RunOutcome::ShutdownRequested);
        assert_eq!(transport.events().last(), Some(&"session_closed"));
    }
}

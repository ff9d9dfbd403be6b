//! Coordinated shutdown for the node's background tasks.
//!
//! A [`ShutdownController`] fans one shutdown event out to every
//! subscriber. The event can come from the process environment (SIGINT or
//! SIGTERM) or from a [`shutdown`](ShutdownController::shutdown) call;
//! both paths end in the same broadcast, so a subsystem only ever watches
//! one channel.

use tokio::signal;
use tokio::sync::broadcast;

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// A receiver that resolves once shutdown has been requested.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Request shutdown. Idempotent; every live subscriber sees it.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }

    /// Resolve once shutdown is requested, whether by an OS signal or a
    /// [`shutdown`](Self::shutdown) call. An OS signal is folded into the
    /// broadcast so other subscribers observe it too.
    pub async fn wait(&self) {
        let mut requested = self.subscribe();
        tokio::select! {
            _ = requested.recv() => {}
            signal = os_signal() => {
                tracing::info!(signal, "received termination signal");
                self.shutdown();
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for SIGINT or SIGTERM, reporting which one fired.
async fn os_signal() -> &'static str {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn programmatic_shutdown_notifies_subscribers() {
        let controller = ShutdownController::new();
        let mut rx1 = controller.subscribe();
        let mut rx2 = controller.subscribe();
        controller.shutdown();
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn wait_resolves_on_programmatic_shutdown() {
        let controller = Arc::new(ShutdownController::new());
        let waiter = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.wait().await })
        };
        for _ in 0..400 {
            controller.shutdown();
            if waiter.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(waiter.is_finished());
        waiter.await.unwrap();
    }
}

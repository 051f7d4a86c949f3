//! Periodic background drain
//!
//! One task per batcher: every `send_batch_interval_ms` it pings the
//! watchdog and runs a drain pass. Failures inside the pass go to the
//! error callback and never stop the loop; the task itself stops only
//! through its cancellation token.

use std::sync::Arc;
use std::time::Duration;

use bandit_protocol::{EventSerializer, TelemetryEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::batcher::BatcherCore;
use crate::watchdog::Watchdog;

pub(crate) struct BackgroundFlusher {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundFlusher {
    pub(crate) fn spawn<E, S>(
        core: Arc<BatcherCore<E, S>>,
        interval: Duration,
        watchdog: Arc<Watchdog>,
    ) -> Self
    where
        E: TelemetryEvent,
        S: EventSerializer<E> + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        watchdog.ping();
                        core.run_iteration().await;
                    }
                }
            }
            tracing::debug!("background flusher stopped");
        });
        Self { token, handle }
    }

    /// Cancel the loop and wait for the task to finish its current pass.
    pub(crate) async fn stop(self) {
        self.token.cancel();
        if let Err(error) = self.handle.await {
            if error.is_panic() {
                tracing::error!(%error, "background flusher panicked");
            }
        }
    }

    /// Cancel without waiting; used on drop.
    pub(crate) fn abort(&self) {
        self.token.cancel();
        self.handle.abort();
    }
}

//! The polling loop around [`EventSubscriptionProcessor`].

use std::sync::Arc;

use ordering_core::config::PublisherConfig;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::processor::{EventSubscriptionProcessor, TickOutcome};

/// Runs a processor on a fixed interval until told to stop.
///
/// Each tick runs on its own task so a panicking handler costs one tick and
/// not the loop.
pub struct PollingPublisher {
    processor: Arc<EventSubscriptionProcessor>,
    config: PublisherConfig,
}

/// Handle to a spawned [`PollingPublisher`]. Dropping it also stops the loop.
#[derive(Debug)]
pub struct PublisherHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PublisherHandle {
    /// Signals the loop to stop and waits for the in-flight tick to finish.
    ///
    /// # Errors
    ///
    /// Returns the loop task's `JoinError` if it panicked or was aborted.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(true);
        self.join.await
    }

    /// Whether the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl PollingPublisher {
    /// Creates a publisher around `processor`.
    #[must_use]
    pub fn new(processor: EventSubscriptionProcessor, config: PublisherConfig) -> Self {
        Self {
            processor: Arc::new(processor),
            config,
        }
    }

    /// Spawns the loop on the current runtime.
    #[must_use]
    pub fn spawn(self) -> PublisherHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        PublisherHandle { shutdown, join }
    }

    /// Polls until `shutdown` turns `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let subscription = self.processor.subscription_name().to_owned();
        info!(
            subscription = %subscription,
            poll_interval_ms = self.config.poll_interval.as_millis(),
            "polling publisher started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }
            self.supervise_tick(&subscription).await;
        }

        info!(subscription = %subscription, "polling publisher stopped");
    }

    async fn supervise_tick(&self, subscription: &str) {
        let processor = Arc::clone(&self.processor);
        match tokio::spawn(async move { processor.process_tick().await }).await {
            Ok(Ok(outcome)) => {
                if let TickOutcome::Dispatched { count, checkpoint } = outcome {
                    info!(subscription, count, checkpoint = %checkpoint, "published events");
                } else {
                    debug!(subscription, ?outcome, "tick finished");
                }
            }
            Ok(Err(err)) => {
                warn!(
                    subscription,
                    state = %err.state,
                    error = %err.source,
                    "tick failed, events will be redelivered"
                );
            }
            Err(join_err) if join_err.is_panic() => {
                error!(subscription, "tick panicked, continuing with next tick");
            }
            Err(join_err) => {
                error!(subscription, error = %join_err, "tick task was cancelled");
            }
        }
    }
}

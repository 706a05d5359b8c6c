//! Per-analysis subscriber registry with bounded, pruning broadcast.
//!
//! Every subscription owns a bounded `mpsc` channel. [`NotificationHub::broadcast`]
//! snapshots the sinks registered for one analysis, attempts delivery to all
//! of them concurrently with a per-sink timeout, then removes every sink that
//! was closed or did not accept the event in time. The registry lock is never
//! held while delivering, so a stalled subscriber cannot block subscribe,
//! unsubscribe or broadcasts for other analyses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use researcher_core::types::DbId;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, RwLock};

use crate::message::HubEvent;

/// Default per-subscription buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default bound on a single delivery attempt.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Tuning for [`NotificationHub`].
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Events buffered per subscriber before delivery starts to wait.
    pub channel_capacity: usize,
    /// How long one delivery may wait for buffer space before the sink is
    /// considered hung and pruned.
    pub send_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Identifies one subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub job_id: DbId,
    pub subscriber_id: u64,
}

/// A live subscription: the handle plus the receiving end of its channel.
///
/// The first event received is always [`HubEvent::ConnectionStatus`].
/// `recv` returns `None` once the hub drops the sink (unsubscribe, prune
/// or shutdown).
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub events: mpsc::Receiver<HubEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.events.recv().await
    }
}

type Sinks = HashMap<u64, mpsc::Sender<HubEvent>>;

/// Fan-out hub keyed by analysis id.
///
/// Designed to be wrapped in `Arc` and shared by the pipeline and the
/// WebSocket layer.
pub struct NotificationHub {
    subscribers: RwLock<HashMap<DbId, Sinks>>,
    next_subscriber_id: AtomicU64,
    config: HubConfig,
}

impl NotificationHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn config(&self) -> HubConfig {
        self.config
    }

    /// Register a new subscriber for `job_id`.
    ///
    /// Creates the job's subscriber set on first use. The returned channel
    /// already holds a `connection_status` event.
    pub async fn subscribe(&self, job_id: DbId) -> Subscription {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        // Fresh channel with capacity >= 1: this cannot fail.
        let _ = tx.try_send(HubEvent::connected(job_id));

        let subscriber_id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut subscribers = self.subscribers.write().await;
            let sinks = subscribers.entry(job_id).or_default();
            sinks.insert(subscriber_id, tx);
            sinks.len()
        };
        tracing::info!(job_id, subscriber_id, count, "Subscriber connected");

        Subscription {
            handle: SubscriptionHandle {
                job_id,
                subscriber_id,
            },
            events: rx,
        }
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self.remove_sinks(handle.job_id, &[handle.subscriber_id]).await;
        if removed > 0 {
            tracing::info!(
                job_id = handle.job_id,
                subscriber_id = handle.subscriber_id,
                "Subscriber disconnected",
            );
        }
        removed > 0
    }

    /// Deliver `event` to every subscriber of `job_id`.
    ///
    /// Never fails. Sinks that are closed or stay full for longer than
    /// `send_timeout` are removed. Returns the number of subscribers that
    /// accepted the event.
    pub async fn broadcast(&self, job_id: DbId, event: HubEvent) -> usize {
        let sinks: Vec<(u64, mpsc::Sender<HubEvent>)> = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(&job_id) {
                Some(sinks) => sinks.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => return 0,
            }
        };

        let timeout = self.config.send_timeout;
        let attempts = sinks.iter().map(|(id, tx)| {
            let event = event.clone();
            async move { (*id, tx.send_timeout(event, timeout).await) }
        });
        let results = futures::future::join_all(attempts).await;

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (subscriber_id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(SendTimeoutError::Closed(_)) => {
                    tracing::debug!(job_id, subscriber_id, "Subscriber channel closed");
                    dead.push(subscriber_id);
                }
                Err(SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(
                        job_id,
                        subscriber_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Subscriber did not accept event in time, dropping it",
                    );
                    dead.push(subscriber_id);
                }
            }
        }

        if !dead.is_empty() {
            self.remove_sinks(job_id, &dead).await;
        }

        tracing::debug!(job_id, kind = event.kind(), delivered, pruned = dead.len(), "Broadcast");
        delivered
    }

    /// Number of live subscribers for `job_id`.
    pub async fn subscriber_count(&self, job_id: DbId) -> usize {
        self.subscribers
            .read()
            .await
            .get(&job_id)
            .map_or(0, HashMap::len)
    }

    /// Number of analyses with at least one subscriber.
    pub async fn job_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Drop every sink so all subscription receivers end.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut subscribers = self.subscribers.write().await;
        let count: usize = subscribers.values().map(HashMap::len).sum();
        subscribers.clear();
        tracing::info!(count, "Closed all analysis subscriptions");
    }

    /// Remove `ids` from the job's set, dropping the set once it is empty.
    async fn remove_sinks(&self, job_id: DbId, ids: &[u64]) -> usize {
        let mut subscribers = self.subscribers.write().await;
        let Some(sinks) = subscribers.get_mut(&job_id) else {
            return 0;
        };
        let removed = ids.iter().filter(|id| sinks.remove(*id).is_some()).count();
        if sinks.is_empty() {
            subscribers.remove(&job_id);
        }
        removed
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use researcher_core::analysis::{Analysis, AnalysisStatus, NewAnalysis};
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;

    fn update(job_id: DbId, status: AnalysisStatus) -> HubEvent {
        let mut analysis =
            Analysis::from_new(job_id, NewAnalysis::from_topic("topic"), chrono::Utc::now());
        analysis.status = status;
        HubEvent::update(&analysis)
    }

    async fn expect_connected(sub: &mut Subscription) {
        let first = sub.recv().await.expect("connected event");
        assert_eq!(first, HubEvent::connected(sub.handle.job_id));
    }

    #[tokio::test]
    async fn subscribe_sends_connected_first() {
        let hub = NotificationHub::default();
        let mut sub = hub.subscribe(42).await;

        expect_connected(&mut sub).await;
        assert_eq!(hub.subscriber_count(42).await, 1);
        assert_eq!(hub.job_count().await, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let hub = NotificationHub::default();
        let mut subs = Vec::new();
        for _ in 0..3 {
            let mut sub = hub.subscribe(42).await;
            expect_connected(&mut sub).await;
            subs.push(sub);
        }

        let event = update(42, AnalysisStatus::Researching);
        assert_eq!(hub.broadcast(42, event.clone()).await, 3);

        for sub in &mut subs {
            assert_eq!(sub.recv().await, Some(event.clone()));
        }
    }

    #[tokio::test]
    async fn broadcast_is_scoped_to_job() {
        let hub = NotificationHub::default();
        let mut a = hub.subscribe(1).await;
        let mut b = hub.subscribe(2).await;
        expect_connected(&mut a).await;
        expect_connected(&mut b).await;

        hub.broadcast(1, update(1, AnalysisStatus::Researching)).await;

        assert!(a.events.try_recv().is_ok());
        assert_eq!(b.events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned_and_others_still_receive() {
        let hub = NotificationHub::default();
        let mut first = hub.subscribe(42).await;
        let closed = hub.subscribe(42).await;
        let mut third = hub.subscribe(42).await;
        expect_connected(&mut first).await;
        expect_connected(&mut third).await;
        drop(closed);

        let event = update(42, AnalysisStatus::Completed);
        assert_eq!(hub.broadcast(42, event.clone()).await, 2);

        assert_eq!(first.recv().await, Some(event.clone()));
        assert_eq!(third.recv().await, Some(event));
        assert_eq!(hub.subscriber_count(42).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_subscriber_times_out_without_blocking_others() {
        let hub = NotificationHub::new(HubConfig {
            channel_capacity: 1,
            send_timeout: Duration::from_millis(100),
        });
        // Never read: its single slot is taken by the connected event.
        let _hung = hub.subscribe(7).await;
        let mut live = hub.subscribe(7).await;
        expect_connected(&mut live).await;

        let event = update(7, AnalysisStatus::Researching);
        assert_eq!(hub.broadcast(7, event.clone()).await, 1);

        assert_eq!(live.recv().await, Some(event));
        assert_eq!(hub.subscriber_count(7).await, 1);
    }

    #[tokio::test]
    async fn second_subscription_does_not_duplicate_events() {
        let hub = NotificationHub::default();
        let mut first = hub.subscribe(9).await;
        let mut second = hub.subscribe(9).await;
        expect_connected(&mut first).await;
        expect_connected(&mut second).await;

        let event = update(9, AnalysisStatus::Analyzing);
        hub.broadcast(9, event.clone()).await;

        assert_eq!(first.recv().await, Some(event.clone()));
        assert_eq!(first.events.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(second.recv().await, Some(event));
        assert_ne!(first.handle, second.handle);
    }

    #[tokio::test]
    async fn events_arrive_in_broadcast_order() {
        let hub = NotificationHub::default();
        let mut sub = hub.subscribe(3).await;
        expect_connected(&mut sub).await;

        let sequence = [
            AnalysisStatus::Pending,
            AnalysisStatus::Researching,
            AnalysisStatus::Analyzing,
            AnalysisStatus::Completed,
        ];
        for status in sequence {
            hub.broadcast(3, update(3, status)).await;
        }

        for status in sequence {
            match sub.recv().await {
                Some(HubEvent::AnalysisUpdate { status: got, .. }) => assert_eq!(got, status),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn last_unsubscribe_removes_job_entry() {
        let hub = NotificationHub::default();
        let a = hub.subscribe(5).await;
        let b = hub.subscribe(5).await;

        assert!(hub.unsubscribe(&a.handle).await);
        assert_eq!(hub.job_count().await, 1);
        assert!(!hub.unsubscribe(&a.handle).await);

        assert!(hub.unsubscribe(&b.handle).await);
        assert_eq!(hub.job_count().await, 0);
        assert_eq!(hub.subscriber_count(5).await, 0);
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_noop() {
        let hub = NotificationHub::default();
        assert_eq!(hub.broadcast(1, update(1, AnalysisStatus::Pending)).await, 0);
        assert_eq!(hub.job_count().await, 0);
    }

    #[tokio::test]
    async fn shutdown_all_ends_every_subscription() {
        let hub = NotificationHub::default();
        let mut a = hub.subscribe(1).await;
        let mut b = hub.subscribe(2).await;

        hub.shutdown_all().await;

        assert_eq!(hub.job_count().await, 0);
        expect_connected(&mut a).await;
        assert!(a.recv().await.is_none());
        expect_connected(&mut b).await;
        assert!(b.recv().await.is_none());
    }
}

//! Repeating fetch of an async operation with manual refresh.
//!
//! A [`Poller`] issues one call as soon as it is enabled and then one call per
//! interval, measured from call issue. Calls run as independent tasks, so a
//! slow call may still be in flight when the next tick fires. Every call gets a
//! sequence number and only a completion newer than the last applied one is
//! written to the state. Disabling or dropping the poller cancels the schedule
//! and any in-flight call before it can touch the state.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollError {
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

#[async_trait]
pub trait PollOperation<T>: Send + Sync {
    async fn call(&self) -> anyhow::Result<T>;
}

#[async_trait]
impl<T, F, Fut> PollOperation<T> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send,
    T: Send + 'static,
{
    async fn call(&self) -> anyhow::Result<T> {
        (self)().await
    }
}

/// Latest observed outcome. `data` keeps the last success even when a later call fails.
#[derive(Debug, Clone)]
pub struct PollState<T> {
    pub data: Option<T>,
    pub error: Option<Arc<anyhow::Error>>,
    pub loading: bool,
    /// Sequence number of the call whose outcome is shown, 0 before the first one settles.
    pub sequence: u64,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
            sequence: 0,
        }
    }
}

impl<T> PollState<T> {
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

struct Shared<T> {
    state: watch::Sender<PollState<T>>,
    root: CancellationToken,
    issued: AtomicU64,
    applied: AtomicU64,
    in_flight: AtomicUsize,
}

impl<T> Shared<T> {
    /// Cancels every call for good. Cancelled calls never settle, so `loading` is reset here.
    fn stop(&self) {
        self.root.cancel();
        self.in_flight.store(0, Ordering::SeqCst);
        self.state.send_if_modified(|state| std::mem::replace(&mut state.loading, false));
    }
}

impl<T> Shared<T>
where
    T: Send + Sync + 'static,
{
    fn settle(&self, seq: u64, outcome: Option<anyhow::Result<T>>, token: &CancellationToken) {
        if self.root.is_cancelled() {
            return;
        }

        self.state.send_modify(|state| {
            let remaining = self
                .in_flight
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
                .unwrap_or_else(|n| n)
                .saturating_sub(1);
            state.loading = remaining > 0;

            let Some(result) = outcome else {
                return;
            };
            if token.is_cancelled() {
                return;
            }
            if seq <= self.applied.load(Ordering::SeqCst) {
                tracing::debug!(seq, "Discarding stale poll result");
                return;
            }
            self.applied.store(seq, Ordering::SeqCst);
            state.sequence = seq;

            match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                }
                Err(e) => {
                    tracing::debug!(seq, error = %e, "Poll call failed");
                    state.error = Some(Arc::new(e));
                }
            }
        });
    }
}

fn spawn_call<T>(
    shared: Arc<Shared<T>>,
    operation: Arc<dyn PollOperation<T>>,
    token: CancellationToken,
) where
    T: Send + Sync + 'static,
{
    let seq = shared.issued.fetch_add(1, Ordering::SeqCst) + 1;
    shared.in_flight.fetch_add(1, Ordering::SeqCst);
    shared.state.send_modify(|state| state.loading = true);

    tokio::spawn(async move {
        let outcome = tokio::select! {
            _ = token.cancelled() => None,
            result = operation.call() => Some(result),
        };
        shared.settle(seq, outcome, &token);
    });
}

struct ActiveSession {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveSession {
    fn cancel(self) {
        self.token.cancel();
        self.task.abort();
    }
}

/// One poll session. Must be created inside a tokio runtime.
pub struct Poller<T> {
    shared: Arc<Shared<T>>,
    operation: Arc<dyn PollOperation<T>>,
    interval: Duration,
    enabled: bool,
    session: Option<ActiveSession>,
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn start<O>(operation: O, interval: Duration, enabled: bool) -> Result<Self, PollError>
    where
        O: PollOperation<T> + 'static,
    {
        if interval.is_zero() {
            return Err(PollError::ZeroInterval);
        }

        let (state, _) = watch::channel(PollState::default());
        let mut poller = Self {
            shared: Arc::new(Shared {
                state,
                root: CancellationToken::new(),
                issued: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
            operation: Arc::new(operation),
            interval,
            enabled,
            session: None,
        };

        if enabled {
            poller.arm();
        }

        Ok(poller)
    }

    pub fn state(&self) -> PollState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.shared.state.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_polling(&self) -> bool {
        self.session.is_some()
    }

    /// Issues one extra call. The schedule, if any, keeps its phase.
    pub fn refresh(&self) {
        if self.shared.root.is_cancelled() {
            return;
        }

        let token = match &self.session {
            Some(session) => session.token.clone(),
            None => self.shared.root.child_token(),
        };
        tracing::debug!("Manual poll refresh");
        spawn_call(Arc::clone(&self.shared), Arc::clone(&self.operation), token);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        self.rearm();
    }

    pub fn set_interval(&mut self, interval: Duration) -> Result<(), PollError> {
        if interval.is_zero() {
            return Err(PollError::ZeroInterval);
        }
        if self.interval != interval {
            self.interval = interval;
            self.rearm();
        }
        Ok(())
    }

    pub fn set_operation<O>(&mut self, operation: O)
    where
        O: PollOperation<T> + 'static,
    {
        self.operation = Arc::new(operation);
        self.rearm();
    }

    /// Cancels the schedule and every in-flight call. Further `refresh` calls are ignored.
    pub fn shutdown(&mut self) {
        self.disarm();
        self.shared.stop();
    }

    fn rearm(&mut self) {
        self.disarm();
        if self.enabled && !self.shared.root.is_cancelled() {
            self.arm();
        }
    }

    fn disarm(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!("Poll session cancelled");
            session.cancel();
        }
    }

    fn arm(&mut self) {
        let token = self.shared.root.child_token();
        let interval = self.interval;

        spawn_call(
            Arc::clone(&self.shared),
            Arc::clone(&self.operation),
            token.clone(),
        );

        let shared = Arc::clone(&self.shared);
        let operation = Arc::clone(&self.operation);
        let loop_token = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        spawn_call(Arc::clone(&shared), Arc::clone(&operation), loop_token.clone());
                    }
                }
            }
        });

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Poll session armed");
        self.session = Some(ActiveSession { token, task });
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
        self.shared.stop();
    }
}

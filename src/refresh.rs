//! Data freshness for views that fetch from the backend.
//!
//! A view's data moves `Idle -> Loading -> Ready | Failed`. Every refresh
//! takes a [`RefreshTicket`]; only the most recently issued ticket may
//! complete, so a slow response that lands after a newer one is dropped.
//! A failed refresh keeps the previous data visible.

use crate::api::{fetch_statuses, LeadSource};
use crate::models::{Event, LeadStatus};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// State of a view's data.
#[derive(Debug, Clone, PartialEq)]
pub enum DataState<T> {
    Idle,
    Loading { previous: Option<T> },
    Ready(T),
    Failed { error: String, previous: Option<T> },
}

impl<T> DataState<T> {
    /// Data to display, stale or not.
    pub fn data(&self) -> Option<&T> {
        match self {
            DataState::Idle => None,
            DataState::Ready(data) => Some(data),
            DataState::Loading { previous } | DataState::Failed { previous, .. } => {
                previous.as_ref()
            }
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DataState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    fn into_data(self) -> Option<T> {
        match self {
            DataState::Idle => None,
            DataState::Ready(data) => Some(data),
            DataState::Loading { previous } | DataState::Failed { previous, .. } => previous,
        }
    }
}

/// Proof that a refresh was started; see [`Freshness::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

/// Freshness state machine for one view.
#[derive(Debug)]
pub struct Freshness<T> {
    state: DataState<T>,
    issued: u64,
}

impl<T> Default for Freshness<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Freshness<T> {
    pub fn new() -> Self {
        Self {
            state: DataState::Idle,
            issued: 0,
        }
    }

    pub fn state(&self) -> &DataState<T> {
        &self.state
    }

    /// Enter `Loading`, carrying whatever is currently displayed.
    pub fn begin(&mut self) -> RefreshTicket {
        self.issued += 1;
        let previous = std::mem::replace(&mut self.state, DataState::Idle).into_data();
        self.state = DataState::Loading { previous };
        RefreshTicket(self.issued)
    }

    /// Apply the outcome of the refresh identified by `ticket`.
    ///
    /// Returns `false`, leaving the state untouched, when a newer refresh
    /// has been started since.
    pub fn complete(&mut self, ticket: RefreshTicket, result: Result<T, String>) -> bool {
        if ticket.0 != self.issued {
            debug!(
                "Ignoring stale refresh #{} (latest is #{})",
                ticket.0, self.issued
            );
            return false;
        }

        let previous = std::mem::replace(&mut self.state, DataState::Idle).into_data();
        self.state = match result {
            Ok(data) => DataState::Ready(data),
            Err(error) => {
                warn!("Refresh failed: {}", error);
                DataState::Failed { error, previous }
            }
        };
        true
    }
}

/// Refresh `state` with the events of `statuses` from `source`.
///
/// The lock is released while the request is in flight so that a newer
/// refresh can start and supersede this one.
pub async fn refresh_events<S: LeadSource>(
    state: &Mutex<Freshness<Vec<Event>>>,
    source: &S,
    statuses: &[LeadStatus],
) -> bool {
    let ticket = state.lock().await.begin();
    let result = fetch_statuses(source, statuses)
        .await
        .map_err(|e| e.to_string());
    state.lock().await.complete(ticket, result)
}

/// Runs a task at a fixed interval until stopped or dropped.
///
/// The first tick fires immediately.
#[derive(Debug)]
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    /// Start polling. Returns `None` for a zero period, which disables polling.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Option<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            return None;
        }

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });

        Some(Self { handle })
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_idle_to_ready() {
        let mut freshness = Freshness::new();
        assert_eq!(freshness.state(), &DataState::Idle);

        let ticket = freshness.begin();
        assert!(matches!(freshness.state(), DataState::Loading { previous: None }));
        assert!(freshness.complete(ticket, Ok(vec![1, 2])));
        assert_eq!(freshness.state(), &DataState::Ready(vec![1, 2]));
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut freshness = Freshness::new();
        let first = freshness.begin();
        freshness.complete(first, Ok("filas"));

        let second = freshness.begin();
        assert_eq!(freshness.state().data(), Some(&"filas"));

        freshness.complete(second, Err("Error al obtener los eventos".to_string()));
        assert_eq!(freshness.state().error(), Some("Error al obtener los eventos"));
        assert_eq!(freshness.state().data(), Some(&"filas"));
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut freshness = Freshness::new();
        let old = freshness.begin();
        let new = freshness.begin();

        assert!(freshness.complete(new, Ok(2)));
        assert!(!freshness.complete(old, Ok(1)));
        assert_eq!(freshness.state(), &DataState::Ready(2));
    }

    /// First call answers slowly, later calls immediately.
    struct SlowThenFast {
        calls: AtomicUsize,
    }

    impl LeadSource for SlowThenFast {
        async fn fetch_events(&self, _status: LeadStatus) -> Result<Vec<Event>, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(vec![Event {
                id: format!("call-{}", call),
                ..Event::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_keep_newest() {
        let state = Mutex::new(Freshness::new());
        let source = SlowThenFast {
            calls: AtomicUsize::new(0),
        };

        let (slow, fast) = tokio::join!(
            refresh_events(&state, &source, &[LeadStatus::Pending]),
            refresh_events(&state, &source, &[LeadStatus::Pending]),
        );

        assert!(!slow);
        assert!(fast);
        let guard = state.lock().await;
        let events = guard.state().data().unwrap();
        assert_eq!(events[0].id, "call-1");
    }

    struct Failing;

    impl LeadSource for Failing {
        async fn fetch_events(&self, _status: LeadStatus) -> Result<Vec<Event>, ApiError> {
            Err(ApiError::Fetch("No se pudo conectar".to_string()))
        }
    }

    #[test]
    fn test_refresh_failure_is_recorded() {
        let state = Mutex::new(Freshness::new());
        let applied =
            tokio_test::block_on(refresh_events(&state, &Failing, &[LeadStatus::Resolved]));
        assert!(applied);

        let guard = state.try_lock().unwrap();
        assert_eq!(guard.state().error(), Some("No se pudo conectar"));
        assert!(guard.state().data().is_none());
    }

    #[tokio::test]
    async fn test_poller_ticks_until_dropped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let poller = Poller::spawn(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(55)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 2);

        poller.stop();
        let stopped_at = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn test_zero_period_disables_polling() {
        let poller = Poller::spawn(Duration::ZERO, || async {});
        assert!(poller.is_none());
    }
}

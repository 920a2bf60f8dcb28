use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::TimeDelta;
use mycoerp_core::ServiceError;
use mycoerp_docstore::{DocumentStore, ErrorHandler, Filter, Record, SnapshotHandler, Subscription};
use tracing::{debug, error};

use crate::clock::Clock;
use crate::config::ReceivingConfig;
use crate::farms::FarmDirectory;
use crate::model::{Alert, DeliveryOrder, DeliveryStatus};
use crate::service::time_window::Countdown;

#[derive(Default)]
struct FeedState {
    alerts: Vec<Alert>,
    countdowns: HashMap<String, Countdown>,
    /// Ids removed locally after a commit, hidden until a snapshot drops them.
    suppressed: HashSet<String>,
    loading: bool,
    last_error: Option<ServiceError>,
}

struct FeedShared {
    state: Mutex<FeedState>,
    live: AtomicBool,
    farms: FarmDirectory,
    window: TimeDelta,
    tick: Duration,
    clock: Arc<dyn Clock>,
}

impl FeedShared {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_snapshot(&self, records: &[Record]) {
        let mut state = self.lock();
        if !self.live.load(Ordering::Acquire) {
            debug!("snapshot after teardown ignored");
            return;
        }

        let now = self.clock.now();
        let orders: Vec<DeliveryOrder> = records
            .iter()
            .map(DeliveryOrder::from_record)
            .filter(|o| o.status == DeliveryStatus::InTransit)
            .collect();

        let present: HashSet<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        state.suppressed.retain(|id| present.contains(id.as_str()));

        let mut alerts: Vec<Alert> = orders
            .iter()
            .filter(|o| !state.suppressed.contains(&o.id))
            .map(|o| Alert::project(o, &self.farms, self.window, now))
            .collect();
        alerts.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));

        // Countdowns follow the alert set; dropping one cancels its ticker.
        let shown: HashSet<&str> = alerts.iter().map(|a| a.id.as_str()).collect();
        state.countdowns.retain(|id, _| shown.contains(id.as_str()));
        for alert in &alerts {
            let stale = state
                .countdowns
                .get(&alert.id)
                .map(|c| c.deadline() != alert.arrival_deadline)
                .unwrap_or(true);
            if stale {
                let countdown = Countdown::start(alert.arrival_deadline, self.tick, Arc::clone(&self.clock));
                state.countdowns.insert(alert.id.clone(), countdown);
            }
        }

        debug!("feed snapshot: {} alerts", alerts.len());
        state.alerts = alerts;
        state.loading = false;
        state.last_error = None;
    }

    fn apply_error(&self, err: &ServiceError) {
        let mut state = self.lock();
        if !self.live.load(Ordering::Acquire) {
            return;
        }
        error!("delivery feed failed: {} ({})", err, err.error_code());
        state.alerts.clear();
        state.countdowns.clear();
        state.loading = false;
        state.last_error = Some(err.clone());
    }
}

/// Live set of in-transit delivery orders, projected to [`Alert`]s.
///
/// Holds exactly one store subscription filtered to `status ==
/// IN_TRANSIT`. Each notification replaces the whole alert set, sorted by
/// send time then id. Errors empty the set and are not retried.
pub struct AlertFeed {
    shared: Arc<FeedShared>,
    subscription: Mutex<Option<Subscription>>,
}

impl AlertFeed {
    /// Subscribe to `config.delivery_collection`. The store delivers the
    /// first snapshot before this returns.
    pub fn mount(
        store: &dyn DocumentStore,
        farms: FarmDirectory,
        config: &ReceivingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shared = Arc::new(FeedShared {
            state: Mutex::new(FeedState {
                loading: true,
                ..Default::default()
            }),
            live: AtomicBool::new(true),
            farms,
            window: config.transit_window(),
            tick: config.countdown_tick(),
            clock,
        });

        // Handlers hold a weak reference so the store never keeps a
        // torn-down feed alive.
        let weak: Weak<FeedShared> = Arc::downgrade(&shared);
        let on_snapshot: SnapshotHandler = Arc::new(move |records: &[Record]| {
            if let Some(shared) = weak.upgrade() {
                shared.apply_snapshot(records);
            }
        });
        let weak: Weak<FeedShared> = Arc::downgrade(&shared);
        let on_error: ErrorHandler = Arc::new(move |err: &ServiceError| {
            if let Some(shared) = weak.upgrade() {
                shared.apply_error(err);
            }
        });

        let subscription = store.subscribe(
            &config.delivery_collection,
            Filter::eq("status", DeliveryStatus::InTransit.as_str()),
            on_snapshot,
            on_error,
        );
        debug!(
            "alert feed mounted on '{}' ({:?})",
            config.delivery_collection,
            subscription.id()
        );

        Self {
            shared,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Current alerts, earliest send time first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.shared.lock().alerts.clone()
    }

    pub fn get(&self, id: &str) -> Option<Alert> {
        self.shared.lock().alerts.iter().find(|a| a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live countdown label of a displayed alert.
    pub fn countdown_label(&self, id: &str) -> Option<String> {
        self.shared.lock().countdowns.get(id).map(Countdown::label)
    }

    /// True until the first snapshot or error arrives.
    pub fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    /// Error that emptied the feed, cleared by the next good snapshot.
    pub fn last_error(&self) -> Option<ServiceError> {
        self.shared.lock().last_error.clone()
    }

    pub fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Drop a reconciled alert right away, without waiting for the store.
    ///
    /// The id stays hidden from later snapshots until one arrives without
    /// it, so a lagging snapshot cannot bring it back.
    pub fn remove_reconciled(&self, id: &str) {
        let mut state = self.shared.lock();
        if !self.is_live() {
            return;
        }
        state.alerts.retain(|a| a.id != id);
        state.countdowns.remove(id);
        state.suppressed.insert(id.to_string());
        debug!("alert {} removed locally", id);
    }

    /// Cancel the subscription and every countdown. Idempotent.
    pub fn teardown(&self) {
        if !self.shared.live.swap(false, Ordering::AcqRel) {
            return;
        }
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            debug!("alert feed torn down ({:?})", subscription.id());
            subscription.unsubscribe();
        }
        let mut state = self.shared.lock();
        state.countdowns.clear();
        state.alerts.clear();
        state.suppressed.clear();
    }
}

impl Drop for AlertFeed {
    fn drop(&mut self) {
        self.teardown();
    }
}

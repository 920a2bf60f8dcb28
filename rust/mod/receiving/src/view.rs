use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mycoerp_core::ServiceError;
use mycoerp_docstore::DocumentStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ReceivingConfig;
use crate::error::CommitError;
use crate::farms::FarmDirectory;
use crate::model::{Alert, DraftField, IntakeDraft, Prefill};
use crate::service::committer::{CommitOutcome, Reconciler};
use crate::service::feed::AlertFeed;
use crate::service::intake::{IntakeForm, SubmitStatus};

/// Called after a successful commit has cleared the draft.
pub type ClearHandler = Arc<dyn Fn() + Send + Sync>;

fn lock(form: &Mutex<IntakeForm>) -> MutexGuard<'_, IntakeForm> {
    form.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mounted receiving view.
///
/// Owns one [`AlertFeed`] (and so one store subscription), the
/// [`IntakeForm`] and a [`Reconciler`]. Dropping the view or calling
/// [`ReceivingView::teardown`] cancels the subscription, every countdown
/// and any pending success timer.
pub struct ReceivingView {
    feed: AlertFeed,
    form: Arc<Mutex<IntakeForm>>,
    reconciler: Reconciler,
    on_clear: Option<ClearHandler>,
    success_reset: Duration,
    timers: CancellationToken,
}

impl ReceivingView {
    pub fn mount(store: Arc<dyn DocumentStore>, config: &ReceivingConfig, farms: FarmDirectory) -> Self {
        Self::mount_with_clock(store, config, farms, Arc::new(SystemClock))
    }

    pub fn mount_with_clock(
        store: Arc<dyn DocumentStore>,
        config: &ReceivingConfig,
        farms: FarmDirectory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let feed = AlertFeed::mount(store.as_ref(), farms.clone(), config, clock);
        Self {
            feed,
            form: Arc::new(Mutex::new(IntakeForm::new(farms))),
            reconciler: Reconciler::new(store, config),
            on_clear: None,
            success_reset: config.success_reset(),
            timers: CancellationToken::new(),
        }
    }

    /// Start in linked mode from a hosting page's prefill.
    pub fn with_prefill(self, prefill: &Prefill) -> Self {
        if let Err(e) = self.apply_prefill(prefill) {
            warn!("prefill for {} ignored: {}", prefill.id, e);
        }
        self
    }

    /// Listener told whenever a successful commit clears the draft.
    pub fn on_clear(mut self, handler: ClearHandler) -> Self {
        self.on_clear = Some(handler);
        self
    }

    // ── Feed ─────────────────────────────────────────────────────────

    pub fn alerts(&self) -> Vec<Alert> {
        self.feed.alerts()
    }

    pub fn countdown_label(&self, alert_id: &str) -> Option<String> {
        self.feed.countdown_label(alert_id)
    }

    pub fn is_loading(&self) -> bool {
        self.feed.is_loading()
    }

    pub fn feed_error(&self) -> Option<ServiceError> {
        self.feed.last_error()
    }

    // ── Form ─────────────────────────────────────────────────────────

    /// Claim a displayed alert for the draft. `NotFound` if it is not in
    /// the feed.
    pub fn select_alert(&self, alert_id: &str) -> Result<Alert, ServiceError> {
        let alert = self
            .feed
            .get(alert_id)
            .ok_or_else(|| ServiceError::NotFound(format!("alert {} is not in the feed", alert_id)))?;
        lock(&self.form).select_alert(&alert)?;
        Ok(alert)
    }

    pub fn apply_prefill(&self, prefill: &Prefill) -> Result<(), ServiceError> {
        lock(&self.form).apply_prefill(prefill)
    }

    pub fn edit(&self, field: DraftField, value: impl Into<String>) -> Result<(), ServiceError> {
        lock(&self.form).set_field(field, value)
    }

    pub fn draft(&self) -> IntakeDraft {
        lock(&self.form).draft().clone()
    }

    pub fn status(&self) -> SubmitStatus {
        lock(&self.form).status()
    }

    pub fn net_weight_label(&self) -> String {
        lock(&self.form).net_weight_label()
    }

    pub fn spoilage_label(&self) -> Option<String> {
        lock(&self.form).spoilage_label()
    }

    pub fn can_submit(&self) -> bool {
        lock(&self.form).can_submit()
    }

    /// Reason the gate currently blocks submission, if any.
    pub fn validate(&self) -> Result<(), ServiceError> {
        lock(&self.form).validate()
    }

    // ── Submit ───────────────────────────────────────────────────────

    /// Submit the draft.
    ///
    /// `Ok(None)` when the gate blocks or a submit is already running;
    /// nothing changes in that case. On success the draft is cleared, the
    /// reconciled alert leaves the feed, `on_clear` fires, and the status
    /// returns to idle after the reset delay. On failure the draft is kept.
    pub async fn submit(&self) -> Result<Option<CommitOutcome>, CommitError> {
        let Some(request) = lock(&self.form).begin_submit() else {
            return Ok(None);
        };

        match self.reconciler.commit(&request).await {
            Ok(outcome) => {
                if let Some(order_id) = outcome.reconciliation.order_id() {
                    self.feed.remove_reconciled(order_id);
                }
                let generation = lock(&self.form).complete_success();
                if let Some(on_clear) = &self.on_clear {
                    on_clear();
                }
                self.schedule_settle(generation);
                Ok(Some(outcome))
            }
            Err(e) => {
                error!("intake submit failed ({}): {}", e.error_code(), e);
                lock(&self.form).complete_error();
                Err(e)
            }
        }
    }

    fn schedule_settle(&self, generation: u64) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("no async runtime, submit status stays success");
                return;
            }
        };
        let form = Arc::clone(&self.form);
        let cancel = self.timers.clone();
        let delay = self.success_reset;
        handle.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    lock(&form).settle(generation);
                }
            }
        });
    }

    /// Unmount: cancel the subscription, countdowns and timers.
    pub fn teardown(self) {
        // Drop does the work.
    }

    fn shutdown(&self) {
        if !self.timers.is_cancelled() {
            debug!("receiving view torn down");
        }
        self.timers.cancel();
        self.feed.teardown();
    }
}

impl Drop for ReceivingView {
    fn drop(&mut self) {
        self.shutdown();
    }
}

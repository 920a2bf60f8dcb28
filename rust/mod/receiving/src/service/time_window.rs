//! Arrival deadlines and countdown labels.
//!
//! Deadline math never fails: an unreadable send time counts as "now".

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clock::Clock;

/// Label once the deadline has passed.
pub const OVERDUE_LABEL: &str = "Arriving now / Overdue";

const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_MINUTE: i64 = 60_000;

/// Normalize a raw `createdAt` into an instant.
///
/// Accepts a native timestamp object (`{seconds, nanoseconds}`, also the
/// underscored wire form), epoch milliseconds, or text (RFC 3339,
/// RFC 2822, naive date-times and plain dates, read as UTC). Anything
/// else yields `now`.
pub fn normalize_sent_time(raw: Option<&Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = match raw {
        Some(Value::Object(obj)) => {
            let seconds = obj
                .get("seconds")
                .or_else(|| obj.get("_seconds"))
                .and_then(as_i64);
            let nanos = obj
                .get("nanoseconds")
                .or_else(|| obj.get("_nanoseconds"))
                .and_then(as_i64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            seconds.and_then(|s| DateTime::from_timestamp(s, nanos))
        }
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Some(Value::String(s)) => parse_timestamp_text(s),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        if raw.is_some() {
            debug!("unreadable createdAt {:?}, using now", raw);
        }
        now
    })
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Parse a textual timestamp. `None` when no known format matches.
pub fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Send time plus the transit window.
pub fn arrival_deadline(raw: Option<&Value>, window: TimeDelta, now: DateTime<Utc>) -> DateTime<Utc> {
    sent_time_and_deadline(raw, window, now).1
}

/// Normalized send time paired with its arrival deadline.
///
/// A send time whose deadline falls past the representable range counts
/// as `now`, like any other unreadable value. The deadline is clamped to
/// [`DateTime::<Utc>::MAX_UTC`] only if `now` itself is that close.
pub fn sent_time_and_deadline(
    raw: Option<&Value>,
    window: TimeDelta,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let sent_at = normalize_sent_time(raw, now);
    match sent_at.checked_add_signed(window) {
        Some(deadline) => (sent_at, deadline),
        None => {
            debug!("createdAt {} overflows the transit window, using now", sent_at);
            let deadline = now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);
            (now, deadline)
        }
    }
}

/// `"{H}h {M}m remaining"` while `deadline > now`, else [`OVERDUE_LABEL`].
///
/// Hours and minutes are floored.
pub fn countdown_label(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let ms = (deadline - now).num_milliseconds();
    if ms <= 0 {
        return OVERDUE_LABEL.to_string();
    }
    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    format!("{}h {}m remaining", hours, minutes)
}

/// Live countdown label for one deadline.
///
/// Computed once on creation, then recomputed every `tick` on a
/// background task. The task stops on [`Countdown::cancel`] or drop.
/// Without a tokio runtime the label is computed once and only changes
/// through [`Countdown::refresh`].
pub struct Countdown {
    deadline: DateTime<Utc>,
    label: Arc<RwLock<String>>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Countdown {
    pub fn start(deadline: DateTime<Utc>, tick: Duration, clock: Arc<dyn Clock>) -> Self {
        let label = Arc::new(RwLock::new(countdown_label(deadline, clock.now())));
        let cancel = CancellationToken::new();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let label = Arc::clone(&label);
                let clock = Arc::clone(&clock);
                let cancel = cancel.clone();
                handle.spawn(async move {
                    let mut interval = tokio::time::interval(tick);
                    // The first tick completes immediately; the label is already fresh.
                    interval.tick().await;
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = interval.tick() => {
                                let next = countdown_label(deadline, clock.now());
                                *label.write().unwrap_or_else(PoisonError::into_inner) = next;
                            }
                        }
                    }
                });
            }
            Err(_) => debug!("no async runtime, countdown for {} will not tick", deadline),
        }

        Self {
            deadline,
            label,
            clock,
            cancel,
        }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn label(&self) -> String {
        self.label
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recompute the label now, outside the tick schedule.
    pub fn refresh(&self) -> String {
        let next = countdown_label(self.deadline, self.clock.now());
        *self.label.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        next
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

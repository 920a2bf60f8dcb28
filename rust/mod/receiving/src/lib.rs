//! Receiving: intake reconciliation for incoming farm deliveries.
//!
//! Listens for `IN_TRANSIT` delivery orders, shows each as an [`Alert`]
//! with an arrival countdown, lets one alert prefill the batch-intake
//! form, commits the inventory [`Batch`] and then marks the source order
//! `DELIVERED`.
//!
//! [`ReceivingView`] is the entry point; it owns one [`AlertFeed`], one
//! [`IntakeForm`] and a [`Reconciler`] for as long as it is mounted.

pub mod clock;
pub mod config;
pub mod error;
pub mod farms;
pub mod model;
pub mod service;
pub mod view;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ReceivingConfig;
pub use error::CommitError;
pub use farms::FarmDirectory;
pub use model::{Alert, Batch, DeliveryOrder, DeliveryStatus, DraftField, IntakeDraft, Prefill};
pub use service::committer::{CommitOutcome, Reconciler, Reconciliation};
pub use service::feed::AlertFeed;
pub use service::intake::{IntakeForm, SubmitRequest, SubmitStatus};
pub use service::time_window::{arrival_deadline, countdown_label, sent_time_and_deadline, Countdown};
pub use view::{ClearHandler, ReceivingView};

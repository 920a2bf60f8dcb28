use mycoerp_core::ServiceError;
use serde::Serialize;
use tracing::debug;

use crate::farms::FarmDirectory;
use crate::model::{Alert, Batch, DraftField, IntakeDraft, Prefill};

/// Read a weight the way a form field is read: leading whitespace is
/// skipped and the longest numeric prefix is taken (`"38.5 kg"` → 38.5).
/// `None` when there is no numeric prefix or the value is not finite.
pub fn parse_weight(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            end = j;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut j = end + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Submission status of the intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    #[default]
    Idle,
    Submitting,
    Success,
    Error,
}

/// Everything the committer needs, captured when submission starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub batch: Batch,
    pub linked_alert_id: Option<String>,
    /// Draft as it was at submit time.
    pub draft: IntakeDraft,
}

/// Owner of the single live [`IntakeDraft`] and the submit state machine.
///
/// `idle → submitting → success | error`. `success` goes back to `idle`
/// through [`IntakeForm::settle`]; `error` stays until the next submit.
#[derive(Debug, Clone)]
pub struct IntakeForm {
    draft: IntakeDraft,
    status: SubmitStatus,
    farms: FarmDirectory,
    /// Bumped on every completion so a stale settle cannot reset a newer state.
    generation: u64,
}

impl IntakeForm {
    pub fn new(farms: FarmDirectory) -> Self {
        Self {
            draft: IntakeDraft::default(),
            status: SubmitStatus::Idle,
            farms,
            generation: 0,
        }
    }

    pub fn draft(&self) -> &IntakeDraft {
        &self.draft
    }

    pub fn status(&self) -> SubmitStatus {
        self.status
    }

    pub fn farms(&self) -> &FarmDirectory {
        &self.farms
    }

    pub fn is_linked(&self) -> bool {
        self.draft.is_linked()
    }

    /// The draft is frozen while a commit is in flight.
    fn ensure_editable(&self) -> Result<(), ServiceError> {
        if self.status == SubmitStatus::Submitting {
            return Err(ServiceError::ReadOnly("draft is being submitted".into()));
        }
        Ok(())
    }

    /// Enter linked mode from a feed alert. Replaces the whole draft.
    pub fn select_alert(&mut self, alert: &Alert) -> Result<(), ServiceError> {
        self.apply_prefill(&Prefill::from(alert))
    }

    /// Enter linked mode from an external prefill.
    pub fn apply_prefill(&mut self, prefill: &Prefill) -> Result<(), ServiceError> {
        self.ensure_editable()?;
        self.draft = IntakeDraft::from_prefill(prefill);
        debug!("draft linked to delivery order {}", prefill.id);
        Ok(())
    }

    /// Edit one field.
    ///
    /// Linked drafts only accept weight edits (`ReadOnly` otherwise). In
    /// manual mode `sourceFarm` must be empty or a known farm. Nothing is
    /// editable while submitting.
    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) -> Result<(), ServiceError> {
        self.ensure_editable()?;
        let value = value.into();
        if let Some(linked) = &self.draft.linked_alert_id {
            if !field.editable_when_linked() {
                return Err(ServiceError::ReadOnly(format!(
                    "{} is locked to delivery order {}",
                    field.name(),
                    linked
                )));
            }
        } else if field == DraftField::SourceFarm && !value.is_empty() && !self.farms.is_known(&value) {
            return Err(ServiceError::Validation(format!("unknown farm '{}'", value)));
        }
        *self.draft.slot(field) = value;
        Ok(())
    }

    // ── Derived values ───────────────────────────────────────────────

    fn raw(&self) -> f64 {
        parse_weight(&self.draft.raw_weight).unwrap_or(0.0)
    }

    fn spoiled(&self) -> f64 {
        parse_weight(&self.draft.spoiled_weight).unwrap_or(0.0)
    }

    /// `raw − spoiled`, unparsable inputs counting as 0.
    pub fn net_weight(&self) -> f64 {
        self.raw() - self.spoiled()
    }

    /// `spoiled / raw × 100`, only when something is spoiled and the
    /// ratio is finite.
    pub fn spoilage_percent(&self) -> Option<f64> {
        let spoiled = self.spoiled();
        if spoiled <= 0.0 {
            return None;
        }
        Some(spoiled / self.raw() * 100.0).filter(|p| p.is_finite())
    }

    pub fn net_weight_label(&self) -> String {
        format!("{:.2}", self.net_weight())
    }

    pub fn spoilage_label(&self) -> Option<String> {
        self.spoilage_percent()
            .map(|p| format!("{:.1}% spoilage detected", p))
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Submission gate: a farm, a numeric non-negative raw weight, and a
    /// spoiled weight between 0 and the raw weight.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.draft.source_farm.trim().is_empty() {
            return Err(ServiceError::Validation("source farm is required".into()));
        }
        let raw = parse_weight(&self.draft.raw_weight)
            .ok_or_else(|| ServiceError::Validation("raw weight must be a number".into()))?;
        if raw < 0.0 {
            return Err(ServiceError::Validation("raw weight cannot be negative".into()));
        }
        let spoiled = self.spoiled();
        if spoiled < 0.0 {
            return Err(ServiceError::Validation("spoiled weight cannot be negative".into()));
        }
        if spoiled > raw {
            return Err(ServiceError::Validation(format!(
                "spoiled weight {} exceeds raw weight {}",
                spoiled, raw
            )));
        }
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.status != SubmitStatus::Submitting && self.validate().is_ok()
    }

    /// Move to `submitting` and capture the batch to commit.
    ///
    /// `None` (and no state change) while already submitting or when the
    /// gate fails.
    pub fn begin_submit(&mut self) -> Option<SubmitRequest> {
        if self.status == SubmitStatus::Submitting {
            debug!("submit ignored: already submitting");
            return None;
        }
        if let Err(e) = self.validate() {
            debug!("submit ignored: {}", e);
            return None;
        }

        let d = &self.draft;
        let batch = Batch::new(
            d.source_farm.clone(),
            self.raw(),
            self.spoiled(),
            d.batch_id.clone(),
            d.species.clone(),
            d.flush_number.clone(),
        );
        let request = SubmitRequest {
            batch,
            linked_alert_id: d.linked_alert_id.clone(),
            draft: d.clone(),
        };
        self.status = SubmitStatus::Submitting;
        Some(request)
    }

    /// Commit succeeded: clear the draft and the link, enter `success`.
    ///
    /// Returns the generation to hand to [`IntakeForm::settle`].
    pub fn complete_success(&mut self) -> u64 {
        self.draft = IntakeDraft::default();
        self.status = SubmitStatus::Success;
        self.generation += 1;
        self.generation
    }

    /// Commit failed: enter `error`, keep the draft for a retry.
    pub fn complete_error(&mut self) {
        self.status = SubmitStatus::Error;
        self.generation += 1;
    }

    /// Return `success` to `idle` if nothing happened since `generation`.
    pub fn settle(&mut self, generation: u64) -> bool {
        if self.status == SubmitStatus::Success && self.generation == generation {
            self.status = SubmitStatus::Idle;
            return true;
        }
        false
    }
}

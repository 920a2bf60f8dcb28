//! `createdAt`/`updatedAt` stamping for stored documents.
//!
//! A caller-supplied `createdAt` (string or native timestamp object) is
//! preserved; only a missing or empty one is filled in.

use mycoerp_core::now_rfc3339;
use serde_json::{json, Value};

use crate::document::Document;

/// Stamp `createdAt` (if missing or empty) and `updatedAt`.
pub(crate) fn stamp_create(fields: &mut Document) {
    let now = now_rfc3339();
    let missing = match fields.get("createdAt") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if missing {
        fields.insert("createdAt".into(), json!(now));
    }
    fields.insert("updatedAt".into(), json!(now));
}

/// Stamp a fresh `updatedAt`.
pub(crate) fn stamp_update(fields: &mut Document) {
    fields.insert("updatedAt".into(), json!(now_rfc3339()));
}

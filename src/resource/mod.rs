//! Per-resource orchestrators.
//!
//! Every module exposes an `ensure` entry point with the same shape: look up
//! the live object by its natural key, combine presence with the requested
//! state to pick exactly one transition (create, update, delete, or nothing),
//! and return whether anything changed along with the resulting
//! representation.
//!
//! Dry run is decided once, at the top of each transition: either the real
//! remote operations run, or representations are synthesized - never a mix
//! within one resource.

pub mod attachment;
pub mod balancer;
pub mod balancer_config;
pub mod balancer_node;
pub mod domain;
pub mod domain_record;
pub mod instance;
pub mod volume;

use crate::error::{Error, Result};
use serde_json::{Value, json};

/// Representation reported for any resource in the deleted transition.
pub(crate) fn deleted() -> Value {
    json!({ "status": "deleted" })
}

/// Timestamp for synthesized representations.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// A field that must be present in the spec for the create transition.
pub(crate) fn required<'a, T>(
    field: &'a Option<T>,
    key: &str,
    kind: &str,
    name: &str,
) -> Result<&'a T> {
    field
        .as_ref()
        .ok_or_else(|| Error::config(format!("{key} {kind} missing {name}")))
}

//! Core types for desired-state reconciliation

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of reconciling one resource: did anything change, and the
/// serializable representation the caller should report.
///
/// `changed` is true iff at least one create, update or delete happened in
/// this resource or anywhere below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub changed: bool,
    pub value: Value,
}

impl Outcome {
    /// An outcome that left the remote side untouched.
    pub fn unchanged(value: Value) -> Self {
        Self {
            changed: false,
            value,
        }
    }

    /// An outcome that mutated (or, in dry-run, would mutate) remote state.
    pub fn changed(value: Value) -> Self {
        Self {
            changed: true,
            value,
        }
    }
}

/// Result of reconciling one collection level.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// True iff any item in the collection was created, updated or removed.
    pub changed: bool,
    /// Item representations: kept-unknown items (live order), then updated
    /// items (desired order), then created items (desired order).
    pub items: Vec<Value>,
}

/// Policy for live items that have no counterpart in the desired list.
///
/// These flags only govern *live* items. A desired item with no live match
/// is always created, regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Preserve live items not mentioned in the desired list. When false,
    /// such items are deleted.
    pub keep_unknown: bool,
    /// Include preserved-but-unmanaged items in the returned representation.
    pub return_unknown: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            keep_unknown: true,
            return_unknown: false,
        }
    }
}

impl Policy {
    pub fn new(keep_unknown: Option<bool>, return_unknown: Option<bool>) -> Self {
        Self {
            keep_unknown: keep_unknown.unwrap_or(true),
            return_unknown: return_unknown.unwrap_or(false),
        }
    }
}

//! # Reconcile
//!
//! A small engine for converging remote state toward a desired specification.
//!
//! The caller describes desired state as typed specs; the remote side is
//! observed as JSON snapshots. The engine computes the minimal set of
//! create/update/delete operations and reports whether anything changed.
//!
//! ## Core Concepts
//!
//! - **FieldDiff**: per-field change detection against a live snapshot, with
//!   normalization rules (unordered lists, case folding), accumulating a
//!   result representation and a staged patch for the remote write.
//! - **ItemReconciler**: the operations one collection item supports -
//!   natural-key matching, snapshot, create, update, remove.
//! - **reconcile_collection**: converges one nested collection level,
//!   honoring the keep-unknown/return-unknown policy.
//!
//! Nesting composes naturally: an item's `update` diffs its own scalar
//! fields, commits them, then calls [`reconcile_collection`] again for each
//! nested collection it owns. Depth is therefore unbounded - a two-level
//! tree and a five-level tree run through the same code.
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{FieldDiff, Outcome};
//!
//! let mut diff = FieldDiff::new(snapshot);
//! diff.stage("algorithm", desired.algorithm.map(|a| a.as_str()));
//! diff.stage_unordered("tags", desired.tags.as_deref());
//! if diff.changed() {
//!     remote.update(id, diff.patch())?;
//! }
//! let outcome = Outcome { changed: diff.changed(), value: diff.into_result().into() };
//! ```

pub mod collection;
pub mod diff;
pub mod types;

// Re-export main types at crate root
pub use collection::{ItemReconciler, reconcile_collection};
pub use diff::FieldDiff;
pub use types::{Collection, Outcome, Policy};

//! Converging one collection level
//!
//! One nested collection (records under a domain, configs under a balancer,
//! nodes under a config) is reconciled by classifying every live item as
//! matched or unknown, updating the matched ones, creating the unmatched
//! desired ones, and applying the unknown-item policy to the rest.

use crate::types::{Collection, Outcome, Policy};
use serde_json::Value;

/// The operations one collection item type supports.
///
/// Implementations carry whatever context they need (remote client, parent
/// identifier, dry-run flag). `update` is where nesting happens: an item that
/// owns a child collection diffs its own fields, commits them, then calls
/// [`reconcile_collection`] for the children with the item's up-to-date
/// handle.
pub trait ItemReconciler {
    type Live;
    type Spec;
    type Error;

    /// Whether a live item and a desired spec denote the same underlying
    /// object, judged by the item type's natural key - never by a
    /// server-assigned identifier.
    fn matches(&self, live: &Self::Live, spec: &Self::Spec) -> bool;

    /// Serializable representation of a live item, as-is.
    fn snapshot(&self, live: &Self::Live) -> Value;

    /// Create the item (or synthesize it in dry-run mode).
    fn create(&mut self, spec: &Self::Spec) -> Result<Value, Self::Error>;

    /// Converge a matched live item toward its spec.
    fn update(&mut self, live: Self::Live, spec: &Self::Spec) -> Result<Outcome, Self::Error>;

    /// Delete an unknown live item (no-op on the remote in dry-run mode).
    fn remove(&mut self, live: Self::Live) -> Result<(), Self::Error>;
}

/// Reconcile one collection level.
///
/// Every live item is matched against the desired list by natural key.
/// Matched items are updated in place; unmatched live items are governed by
/// `policy`; desired items without a live match are created. The returned
/// item list is ordered kept-unknown items (live order), then updated items
/// (desired order), then created items (desired order).
///
/// Operations are issued strictly sequentially, in that order.
pub fn reconcile_collection<R: ItemReconciler>(
    rec: &mut R,
    live: Vec<R::Live>,
    desired: &[R::Spec],
    policy: Policy,
) -> Result<Collection, R::Error> {
    let mut changed = false;
    let mut kept: Vec<Value> = Vec::new();
    let mut matched: Vec<Option<R::Live>> = desired.iter().map(|_| None).collect();

    for item in live {
        match desired.iter().position(|spec| rec.matches(&item, spec)) {
            Some(i) if matched[i].is_none() => matched[i] = Some(item),
            // Unknown item: not configured (or its key is already taken).
            _ => {
                if !policy.keep_unknown {
                    rec.remove(item)?;
                    changed = true;
                } else if policy.return_unknown {
                    kept.push(rec.snapshot(&item));
                }
            }
        }
    }

    let mut updated: Vec<Value> = Vec::new();
    let mut created: Vec<Value> = Vec::new();
    for (spec, slot) in desired.iter().zip(matched.iter_mut()) {
        match slot.take() {
            Some(item) => {
                let outcome = rec.update(item, spec)?;
                changed = changed || outcome.changed;
                updated.push(outcome.value);
            }
            None => {
                created.push(rec.create(spec)?);
                changed = true;
            }
        }
    }

    let mut items = kept;
    items.extend(updated);
    items.extend(created);
    Ok(Collection { changed, items })
}

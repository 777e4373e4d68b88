//! Field-level change detection against a live snapshot
//!
//! A [`FieldDiff`] starts from the JSON snapshot of a live object and stages
//! desired values field by field. Each staged change lands in two places: the
//! result map (what the caller reports back) and the patch map (what gets
//! written to the remote). Fields absent from the desired spec are never
//! compared - partial updates are the default.

use serde_json::{Map, Value};

/// Accumulates per-field changes for one live object.
#[derive(Debug, Clone)]
pub struct FieldDiff {
    result: Map<String, Value>,
    patch: Map<String, Value>,
    changed: bool,
}

impl FieldDiff {
    /// Start a diff from the live object's snapshot.
    pub fn new(snapshot: Map<String, Value>) -> Self {
        Self {
            result: snapshot,
            patch: Map::new(),
            changed: false,
        }
    }

    /// Compare `field` against a desired value and stage it when it differs.
    ///
    /// Returns true iff the field changed. `None` means the field was not
    /// specified and is left untouched.
    pub fn stage<T: Into<Value>>(&mut self, field: &str, desired: Option<T>) -> bool {
        let Some(want) = desired else {
            return false;
        };
        let want = want.into();
        if self.result.get(field) == Some(&want) {
            return false;
        }
        self.put(field, want);
        true
    }

    /// Like [`FieldDiff::stage`], but compares case-insensitively. Used for
    /// fields whose remote representation is case-preserving but whose
    /// identity is not (SRV sub-fields, CAA tags).
    pub fn stage_folded(&mut self, field: &str, desired: Option<&str>) -> bool {
        let Some(want) = desired else {
            return false;
        };
        let same = self
            .result
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|current| current.eq_ignore_ascii_case(want));
        if same {
            return false;
        }
        self.put(field, Value::from(want));
        true
    }

    /// Like [`FieldDiff::stage`], but treats both sides as unordered sets:
    /// sorted before comparing and sorted before being written back. Used for
    /// tag lists and IP lists.
    pub fn stage_unordered(&mut self, field: &str, desired: Option<&[String]>) -> bool {
        let Some(want) = desired else {
            return false;
        };
        let mut want: Vec<String> = want.to_vec();
        want.sort();

        let current = self.result.get(field).and_then(Value::as_array).map(|raw| {
            let mut items: Vec<String> = raw
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect();
            items.sort();
            items
        });
        if current.as_deref() == Some(&want[..]) {
            return false;
        }
        self.put(field, Value::from(want));
        true
    }

    /// Record a value into the result without staging a remote write. For
    /// changes applied through a dedicated remote operation (attach, resize)
    /// rather than the generic field update.
    pub fn record<T: Into<Value>>(&mut self, field: &str, value: T) {
        self.result.insert(field.to_string(), value.into());
        self.changed = true;
    }

    fn put(&mut self, field: &str, value: Value) {
        self.result.insert(field.to_string(), value.clone());
        self.patch.insert(field.to_string(), value);
        self.changed = true;
    }

    /// True iff any staged or recorded field differed.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// The staged fields, ready to be written to the remote.
    pub fn patch(&self) -> &Map<String, Value> {
        &self.patch
    }

    /// The live snapshot overlaid with every staged change.
    pub fn into_result(self) -> Map<String, Value> {
        self.result
    }
}

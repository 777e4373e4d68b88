//! DNS record reconciliation.
//!
//! Records are matched by natural key, never by server id. For most types
//! the key is `{name, target}`, compared case-insensitively. SRV records are
//! not addressable by name: their identity is `{target, service, protocol,
//! port}` instead. A record whose key fields changed is therefore a
//! different record - the old one is classified unknown and the new one
//! created.

use super::{deleted, now};
use crate::client::DomainApi;
use crate::error::{Error, Result};
use crate::model::{DRY_RUN_ID, DomainRecord, RecordType, snapshot_of};
use crate::schema::{RecordResourceSpec, RecordSpec, State};
use reconcile::{FieldDiff, ItemReconciler, Outcome};
use serde_json::{Map, Value, json};

/// Whether a live record and a spec denote the same record.
pub(crate) fn record_matches(live: &DomainRecord, spec: &RecordSpec) -> bool {
    if live.record_type != spec.record_type {
        return false;
    }
    if live.record_type == RecordType::Srv {
        return live.target.eq_ignore_ascii_case(&spec.target)
            && folded_eq(live.service.as_deref(), spec.service.as_deref())
            && folded_eq(
                live.protocol.as_deref(),
                spec.protocol.map(|p| p.as_str()),
            )
            && matches!((live.port, spec.port), (Some(a), Some(b)) if a == b);
    }
    live.name.eq_ignore_ascii_case(&spec.name) && live.target.eq_ignore_ascii_case(&spec.target)
}

/// Case-insensitive equality where a missing side never matches.
fn folded_eq(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Record operations under one zone.
pub(crate) struct Records<'a, C> {
    pub client: &'a C,
    pub domain_id: i64,
    pub dry_run: bool,
}

impl<C: DomainApi> ItemReconciler for Records<'_, C> {
    type Live = DomainRecord;
    type Spec = RecordSpec;
    type Error = Error;

    fn matches(&self, live: &DomainRecord, spec: &RecordSpec) -> bool {
        record_matches(live, spec)
    }

    fn snapshot(&self, live: &DomainRecord) -> Value {
        Value::Object(snapshot_of(live))
    }

    fn create(&mut self, spec: &RecordSpec) -> Result<Value> {
        if self.dry_run {
            return Ok(synthesize(spec));
        }
        let record = self.client.record_create(self.domain_id, &create_fields(spec))?;
        Ok(Value::Object(snapshot_of(&record)))
    }

    fn update(&mut self, live: DomainRecord, spec: &RecordSpec) -> Result<Outcome> {
        let mut diff = FieldDiff::new(snapshot_of(&live));
        diff.stage("ttl_sec", spec.ttl_sec);

        // Which extra fields apply is decided by the record type.
        match live.record_type {
            RecordType::Mx => {
                diff.stage("priority", spec.priority);
            }
            RecordType::Srv => {
                diff.stage_folded("service", spec.service.as_deref());
                diff.stage_folded("protocol", spec.protocol.map(|p| p.as_str()));
                diff.stage("priority", spec.priority);
                diff.stage("weight", spec.weight);
                diff.stage("port", spec.port);
            }
            RecordType::Caa => {
                diff.stage_folded("tag", spec.tag.map(|t| t.as_str()));
            }
            _ => {}
        }

        if diff.changed() && !self.dry_run {
            self.client
                .record_update(self.domain_id, live.id, diff.patch())?;
        }
        let changed = diff.changed();
        Ok(Outcome {
            changed,
            value: Value::Object(diff.into_result()),
        })
    }

    fn remove(&mut self, live: DomainRecord) -> Result<()> {
        if !self.dry_run {
            self.client.record_delete(self.domain_id, live.id)?;
        }
        Ok(())
    }
}

fn create_fields(spec: &RecordSpec) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("type".into(), json!(spec.record_type));
    fields.insert("name".into(), json!(spec.name));
    fields.insert("target".into(), json!(spec.target));
    if let Some(ttl_sec) = spec.ttl_sec {
        fields.insert("ttl_sec".into(), json!(ttl_sec));
    }
    if let Some(priority) = spec.priority {
        fields.insert("priority".into(), json!(priority));
    }
    if let Some(weight) = spec.weight {
        fields.insert("weight".into(), json!(weight));
    }
    if let Some(port) = spec.port {
        fields.insert("port".into(), json!(port));
    }
    if let Some(service) = &spec.service {
        fields.insert("service".into(), json!(service));
    }
    if let Some(protocol) = spec.protocol {
        fields.insert("protocol".into(), json!(protocol.as_str()));
    }
    if let Some(tag) = spec.tag {
        fields.insert("tag".into(), json!(tag.as_str()));
    }
    fields
}

/// Structurally complete stand-in for a record that was not created.
fn synthesize(spec: &RecordSpec) -> Value {
    json!({
        "created": now(),
        "id": DRY_RUN_ID,
        "name": spec.name,
        "port": spec.port.unwrap_or(0),
        "priority": spec.priority.unwrap_or(0),
        "protocol": spec.protocol.map(|p| p.as_str()),
        "service": spec.service.clone(),
        "tag": spec.tag.map(|t| t.as_str()),
        "target": spec.target,
        "ttl_sec": spec.ttl_sec.unwrap_or(0),
        "type": spec.record_type,
        "weight": spec.weight.unwrap_or(0),
        "updated": now(),
    })
}

/// Converge one record addressed through its zone's name.
pub fn ensure<C: DomainApi>(
    client: &C,
    spec: &RecordResourceSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let domain = client.domain_find(&spec.domain)?.ok_or_else(|| {
        Error::config(format!(
            "{} domain not found for record {}:{}",
            spec.domain,
            spec.record.record_type.as_str(),
            spec.record.name
        ))
    })?;

    let live = client
        .record_list(domain.id)?
        .into_iter()
        .find(|record| record_matches(record, &spec.record));
    let mut records = Records {
        client,
        domain_id: domain.id,
        dry_run,
    };

    match (live, spec.state) {
        (None, State::Present) => Ok(Outcome::changed(records.create(&spec.record)?)),
        (Some(record), State::Present) => records.update(record, &spec.record),
        (Some(record), State::Absent) => {
            records.remove(record)?;
            Ok(Outcome::changed(deleted()))
        }
        (None, State::Absent) => Ok(Outcome::unchanged(Value::Null)),
    }
}

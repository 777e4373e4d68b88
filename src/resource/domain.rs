//! DNS zone reconciliation.

use super::domain_record::Records;
use super::{deleted, now, required};
use crate::client::DomainApi;
use crate::error::Result;
use crate::model::{DRY_RUN_ID, Domain, snapshot_of};
use crate::schema::{DomainSpec, State};
use log::info;
use reconcile::{FieldDiff, ItemReconciler, Outcome, Policy, reconcile_collection};
use serde_json::{Map, Value, json};

/// Converge one zone, and its records when the spec lists any, toward the
/// desired state.
pub fn ensure<C: DomainApi>(client: &C, spec: &DomainSpec, dry_run: bool) -> Result<Outcome> {
    let existing = client.domain_find(&spec.domain)?;
    match (existing, spec.state) {
        (None, State::Present) => create(client, spec, dry_run),
        (Some(live), State::Present) => update(client, &live, spec, dry_run),
        (Some(live), State::Absent) => {
            info!("deleting domain {}", spec.domain);
            // Deleting the zone cascades over its records remotely.
            if !dry_run {
                client.domain_delete(live.id)?;
            }
            Ok(Outcome::changed(deleted()))
        }
        (None, State::Absent) => Ok(Outcome::unchanged(Value::Null)),
    }
}

fn create<C: DomainApi>(client: &C, spec: &DomainSpec, dry_run: bool) -> Result<Outcome> {
    let kind = required(&spec.kind, &spec.domain, "domain", "type")?;

    let (domain_id, mut result) = if dry_run {
        (DRY_RUN_ID, synthesize(spec))
    } else {
        info!("creating domain {}", spec.domain);
        let mut fields = Map::new();
        fields.insert("domain".into(), json!(spec.domain));
        fields.insert("type".into(), json!(kind.as_str()));
        copy_optional_scalars(&mut fields, spec);
        let domain = client.domain_create(&fields)?;
        (domain.id, snapshot_of(&domain))
    };

    let mut records = Vec::new();
    if let Some(specs) = &spec.records {
        let mut ops = Records {
            client,
            domain_id,
            dry_run,
        };
        for record in specs {
            records.push(ops.create(record)?);
        }
    }
    result.insert("records".into(), Value::Array(records));

    Ok(Outcome::changed(Value::Object(result)))
}

fn update<C: DomainApi>(
    client: &C,
    live: &Domain,
    spec: &DomainSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let mut diff = FieldDiff::new(snapshot_of(live));
    diff.stage("soa_email", spec.soa_email.as_deref());
    diff.stage("group", spec.group.as_deref());
    diff.stage("description", spec.description.as_deref());
    diff.stage("retry_sec", spec.retry_sec);
    diff.stage("expire_sec", spec.expire_sec);
    diff.stage("refresh_sec", spec.refresh_sec);
    diff.stage("ttl_sec", spec.ttl_sec);
    diff.stage_unordered("tags", spec.tags.as_deref());
    diff.stage_unordered("master_ips", spec.master_ips.as_deref());
    diff.stage_unordered("axfr_ips", spec.axfr_ips.as_deref());
    if diff.changed() && !dry_run {
        client.domain_update(live.id, diff.patch())?;
    }

    let mut changed = diff.changed();
    let mut result = diff.into_result();

    if let Some(specs) = &spec.records {
        let live_records = client.record_list(live.id)?;
        let policy = Policy::new(spec.keep_unknown_records, spec.return_unknown_records);
        let mut ops = Records {
            client,
            domain_id: live.id,
            dry_run,
        };
        let out = reconcile_collection(&mut ops, live_records, specs, policy)?;
        changed = changed || out.changed;
        result.insert("records".into(), Value::Array(out.items));
    }

    Ok(Outcome {
        changed,
        value: Value::Object(result),
    })
}

fn copy_optional_scalars(fields: &mut Map<String, Value>, spec: &DomainSpec) {
    if let Some(soa_email) = &spec.soa_email {
        fields.insert("soa_email".into(), json!(soa_email));
    }
    if let Some(group) = &spec.group {
        fields.insert("group".into(), json!(group));
    }
    if let Some(description) = &spec.description {
        fields.insert("description".into(), json!(description));
    }
    if let Some(retry_sec) = spec.retry_sec {
        fields.insert("retry_sec".into(), json!(retry_sec));
    }
    if let Some(expire_sec) = spec.expire_sec {
        fields.insert("expire_sec".into(), json!(expire_sec));
    }
    if let Some(refresh_sec) = spec.refresh_sec {
        fields.insert("refresh_sec".into(), json!(refresh_sec));
    }
    if let Some(ttl_sec) = spec.ttl_sec {
        fields.insert("ttl_sec".into(), json!(ttl_sec));
    }
    if let Some(master_ips) = &spec.master_ips {
        fields.insert("master_ips".into(), json!(master_ips));
    }
    if let Some(axfr_ips) = &spec.axfr_ips {
        fields.insert("axfr_ips".into(), json!(axfr_ips));
    }
    if let Some(tags) = &spec.tags {
        fields.insert("tags".into(), json!(tags));
    }
}

/// Structurally complete stand-in for a zone that was not created.
fn synthesize(spec: &DomainSpec) -> Map<String, Value> {
    let value = json!({
        "axfr_ips": spec.axfr_ips.clone().unwrap_or_default(),
        "created": now(),
        "description": spec.description.as_deref().unwrap_or(""),
        "expire_sec": spec.expire_sec.unwrap_or(0),
        "group": spec.group.as_deref().unwrap_or(""),
        "id": DRY_RUN_ID,
        "master_ips": spec.master_ips.clone().unwrap_or_default(),
        "refresh_sec": spec.refresh_sec.unwrap_or(0),
        "retry_sec": spec.retry_sec.unwrap_or(0),
        "soa_email": spec.soa_email.as_deref().unwrap_or(""),
        "status": "creating",
        "ttl_sec": spec.ttl_sec.unwrap_or(0),
        "type": spec.kind.map(|k| k.as_str()),
        "tags": spec.tags.clone().unwrap_or_default(),
        "updated": now(),
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

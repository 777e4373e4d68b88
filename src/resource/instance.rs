//! Compute instance reconciliation.

use super::{deleted, now, required};
use crate::client::InstanceApi;
use crate::error::Result;
use crate::model::{DRY_RUN_ID, Instance, snapshot_of};
use crate::schema::{InstanceSpec, State};
use log::info;
use reconcile::{FieldDiff, Outcome};
use serde_json::{Map, Value, json};

/// Converge one instance toward its spec.
pub fn ensure<C: InstanceApi>(client: &C, spec: &InstanceSpec, dry_run: bool) -> Result<Outcome> {
    let existing = client.instance_find(&spec.label)?;
    match (existing, spec.state) {
        (None, State::Present) => create(client, spec, dry_run),
        (Some(live), State::Present) => update(client, &live, spec, dry_run),
        (Some(live), State::Absent) => {
            info!("deleting instance {}", spec.label);
            if !dry_run {
                client.instance_delete(live.id)?;
            }
            Ok(Outcome::changed(deleted()))
        }
        (None, State::Absent) => Ok(Outcome::unchanged(Value::Null)),
    }
}

fn create<C: InstanceApi>(client: &C, spec: &InstanceSpec, dry_run: bool) -> Result<Outcome> {
    let region = required(&spec.region, &spec.label, "instance", "region")?;
    let plan = required(&spec.plan, &spec.label, "instance", "type")?;
    let image = required(&spec.image, &spec.label, "instance", "image")?;

    if dry_run {
        return Ok(Outcome::changed(synthesize(spec, region, plan, image)));
    }

    info!("creating instance {}", spec.label);
    let mut fields = Map::new();
    fields.insert("label".into(), json!(spec.label));
    fields.insert("region".into(), json!(region));
    fields.insert("type".into(), json!(plan));
    fields.insert("image".into(), json!(image));
    if let Some(group) = &spec.group {
        fields.insert("group".into(), json!(group));
    }
    if let Some(root_pass) = &spec.root_pass {
        fields.insert("root_pass".into(), json!(root_pass));
    }
    if let Some(tags) = &spec.tags {
        fields.insert("tags".into(), json!(tags));
    }
    if let Some(keys) = &spec.authorized_keys {
        fields.insert("authorized_keys".into(), json!(keys));
    }
    if let Some(private_ip) = spec.private_ip {
        fields.insert("private_ip".into(), json!(private_ip));
    }

    let created = client.instance_create(&fields)?;
    if let Some(rdns) = &spec.ipv4_public_rdns {
        client.instance_set_rdns(created.instance.id, rdns)?;
    }

    let mut snapshot = snapshot_of(&created.instance);
    if let Some(root_pass) = created.root_pass {
        snapshot.insert("root_pass".into(), json!(root_pass));
    }
    Ok(Outcome::changed(Value::Object(snapshot)))
}

fn update<C: InstanceApi>(
    client: &C,
    live: &Instance,
    spec: &InstanceSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let mut diff = FieldDiff::new(snapshot_of(live));
    diff.stage("group", spec.group.as_deref());
    diff.stage_unordered("tags", spec.tags.as_deref());
    if diff.changed() && !dry_run {
        client.instance_update(live.id, diff.patch())?;
    }

    let mut changed = diff.changed();
    let result = diff.into_result();

    if spec.private_ip == Some(true) && client.instance_private_ips(live.id)?.is_empty() {
        changed = true;
        if !dry_run {
            client.instance_allocate_private_ip(live.id)?;
        }
    }

    if let Some(rdns) = &spec.ipv4_public_rdns {
        let current = client.instance_rdns(live.id)?;
        if current.as_deref() != Some(rdns.as_str()) {
            changed = true;
            if !dry_run {
                client.instance_set_rdns(live.id, rdns)?;
            }
        }
    }

    Ok(Outcome {
        changed,
        value: Value::Object(result),
    })
}

/// Structurally complete stand-in for an instance that was not created.
fn synthesize(spec: &InstanceSpec, region: &str, plan: &str, image: &str) -> Value {
    json!({
        "alerts": {},
        "backups": {},
        "created": now(),
        "hypervisor": "kvm",
        "id": DRY_RUN_ID,
        "ipv4": ["0.0.0.0"],
        "ipv6": "0000:0000::0000:0000:0000:0000/64",
        "root_pass": spec.root_pass.as_deref().unwrap_or("dry-run"),
        "specs": {},
        "status": "provisioning",
        "updated": now(),
        "watchdog_enabled": true,
        "region": region,
        "type": plan,
        "image": image,
        "label": spec.label,
        "group": spec.group.as_deref().unwrap_or(""),
        "tags": spec.tags.clone().unwrap_or_default(),
        "authorized_keys": spec.authorized_keys.clone().unwrap_or_default(),
    })
}

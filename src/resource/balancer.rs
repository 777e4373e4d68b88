//! Load balancer reconciliation.

use super::balancer_config::Configs;
use super::{deleted, now, required};
use crate::client::BalancerApi;
use crate::error::Result;
use crate::model::{Balancer, DRY_RUN_ID, snapshot_of};
use crate::schema::{BalancerSpec, State};
use log::info;
use reconcile::{FieldDiff, ItemReconciler, Outcome, Policy, reconcile_collection};
use serde_json::{Map, Value, json};

/// Converge one balancer, and its configs and their nodes when the spec
/// lists any, toward the desired state.
pub fn ensure<C: BalancerApi>(client: &C, spec: &BalancerSpec, dry_run: bool) -> Result<Outcome> {
    let existing = client.balancer_find(&spec.label)?;
    match (existing, spec.state) {
        (None, State::Present) => create(client, spec, dry_run),
        (Some(live), State::Present) => update(client, &live, spec, dry_run),
        (Some(live), State::Absent) => {
            info!("deleting balancer {}", spec.label);
            // Deleting the balancer cascades over configs and nodes remotely.
            if !dry_run {
                client.balancer_delete(live.id)?;
            }
            Ok(Outcome::changed(deleted()))
        }
        (None, State::Absent) => Ok(Outcome::unchanged(Value::Null)),
    }
}

fn create<C: BalancerApi>(client: &C, spec: &BalancerSpec, dry_run: bool) -> Result<Outcome> {
    let region = required(&spec.region, &spec.label, "balancer", "region")?;

    let (balancer_id, mut result) = if dry_run {
        (DRY_RUN_ID, synthesize(spec, region))
    } else {
        info!("creating balancer {}", spec.label);
        let mut fields = Map::new();
        fields.insert("label".into(), json!(spec.label));
        fields.insert("region".into(), json!(region));
        if let Some(throttle) = spec.client_conn_throttle {
            fields.insert("client_conn_throttle".into(), json!(throttle));
        }
        let balancer = client.balancer_create(&fields)?;
        if let Some(rdns) = &spec.ipv4_public_rdns {
            client.balancer_set_rdns(balancer.id, rdns)?;
        }
        (balancer.id, snapshot_of(&balancer))
    };

    let mut configs = Vec::new();
    if let Some(specs) = &spec.configs {
        let mut ops = Configs {
            client,
            balancer_id,
            dry_run,
        };
        for config in specs {
            configs.push(ops.create(config)?);
        }
    }
    result.insert("configs".into(), Value::Array(configs));

    Ok(Outcome::changed(Value::Object(result)))
}

fn update<C: BalancerApi>(
    client: &C,
    live: &Balancer,
    spec: &BalancerSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let mut diff = FieldDiff::new(snapshot_of(live));
    diff.stage("client_conn_throttle", spec.client_conn_throttle);
    if diff.changed() && !dry_run {
        client.balancer_update(live.id, diff.patch())?;
    }

    let mut changed = diff.changed();
    let mut result = diff.into_result();

    if let Some(specs) = &spec.configs {
        let live_configs = client.config_list(live.id)?;
        let policy = Policy::new(spec.keep_unknown_configs, spec.return_unknown_configs);
        let mut ops = Configs {
            client,
            balancer_id: live.id,
            dry_run,
        };
        let out = reconcile_collection(&mut ops, live_configs, specs, policy)?;
        changed = changed || out.changed;
        result.insert("configs".into(), Value::Array(out.items));
    }

    if let Some(rdns) = &spec.ipv4_public_rdns {
        let current = client.balancer_rdns(live.id)?;
        if current.as_deref() != Some(rdns.as_str()) {
            changed = true;
            if !dry_run {
                client.balancer_set_rdns(live.id, rdns)?;
            }
        }
    }

    Ok(Outcome {
        changed,
        value: Value::Object(result),
    })
}

/// Structurally complete stand-in for a balancer that was not created.
fn synthesize(spec: &BalancerSpec, region: &str) -> Map<String, Value> {
    let value = json!({
        "client_conn_throttle": spec.client_conn_throttle.unwrap_or(0),
        "created": now(),
        "hostname": format!("nb-{}.example.net", spec.label),
        "id": DRY_RUN_ID,
        "ipv4": "0.0.0.0",
        "ipv6": "0000:0000::0000:0000:0000:0000/64",
        "label": spec.label,
        "region": region,
        "tags": [],
        "transfer": { "in": null, "out": null, "total": null },
        "updated": now(),
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

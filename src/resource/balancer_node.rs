//! Balancer backend node reconciliation.

use super::{deleted, required};
use crate::client::BalancerApi;
use crate::error::{Error, Result};
use crate::model::{BalancerConfig, BalancerNode, DRY_RUN_ID, snapshot_of};
use crate::schema::{NodeResourceSpec, NodeSpec, State};
use reconcile::{FieldDiff, ItemReconciler, Outcome};
use serde_json::{Map, Value, json};

/// Node operations under one balancer config.
pub(crate) struct Nodes<'a, C> {
    pub client: &'a C,
    pub balancer_id: i64,
    pub config_id: i64,
    pub dry_run: bool,
}

impl<C: BalancerApi> ItemReconciler for Nodes<'_, C> {
    type Live = BalancerNode;
    type Spec = NodeSpec;
    type Error = Error;

    fn matches(&self, live: &BalancerNode, spec: &NodeSpec) -> bool {
        live.address == spec.address
    }

    fn snapshot(&self, live: &BalancerNode) -> Value {
        Value::Object(snapshot_of(live))
    }

    fn create(&mut self, spec: &NodeSpec) -> Result<Value> {
        let label = required(&spec.label, &spec.address, "node", "label")?;
        if self.dry_run {
            return Ok(synthesize(spec, label));
        }
        let mut fields = Map::new();
        fields.insert("address".into(), json!(spec.address));
        fields.insert("label".into(), json!(label));
        fields.insert(
            "mode".into(),
            json!(spec.mode.unwrap_or_default().as_str()),
        );
        fields.insert("weight".into(), json!(spec.weight.unwrap_or(1)));
        let node = self
            .client
            .node_create(self.balancer_id, self.config_id, &fields)?;
        Ok(Value::Object(snapshot_of(&node)))
    }

    fn update(&mut self, live: BalancerNode, spec: &NodeSpec) -> Result<Outcome> {
        let mut diff = FieldDiff::new(snapshot_of(&live));
        diff.stage("label", spec.label.as_deref());
        diff.stage("mode", spec.mode.map(|m| m.as_str()));
        diff.stage("weight", spec.weight);
        if diff.changed() && !self.dry_run {
            self.client
                .node_update(self.balancer_id, self.config_id, live.id, diff.patch())?;
        }
        let changed = diff.changed();
        Ok(Outcome {
            changed,
            value: Value::Object(diff.into_result()),
        })
    }

    fn remove(&mut self, live: BalancerNode) -> Result<()> {
        if !self.dry_run {
            self.client
                .node_delete(self.balancer_id, self.config_id, live.id)?;
        }
        Ok(())
    }
}

/// Structurally complete stand-in for a node that was not created.
fn synthesize(spec: &NodeSpec, label: &str) -> Value {
    json!({
        "address": spec.address,
        "config_id": DRY_RUN_ID,
        "id": DRY_RUN_ID,
        "label": label,
        "mode": spec.mode.unwrap_or_default().as_str(),
        "balancer_id": DRY_RUN_ID,
        "status": "UP",
        "weight": spec.weight.unwrap_or(1),
    })
}

/// Find the config a standalone node spec addresses.
pub(crate) fn parent_config<C: BalancerApi>(
    client: &C,
    balancer_label: &str,
    port: u16,
    context: &str,
) -> Result<(i64, Option<BalancerConfig>)> {
    let balancer = client.balancer_find(balancer_label)?.ok_or_else(|| {
        Error::config(format!("{balancer_label} balancer not found for {context}"))
    })?;
    let config = client
        .config_list(balancer.id)?
        .into_iter()
        .find(|c| c.port == port);
    Ok((balancer.id, config))
}

/// Converge one node addressed through its balancer's label and config port.
pub fn ensure<C: BalancerApi>(
    client: &C,
    spec: &NodeResourceSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let context = format!("config {} and node {}", spec.port, spec.node.address);
    let (balancer_id, config) = parent_config(client, &spec.balancer, spec.port, &context)?;
    let config = config.ok_or_else(|| {
        Error::config(format!(
            "{} balancer config {} not found for node {}",
            spec.balancer, spec.port, spec.node.address
        ))
    })?;

    let live = client
        .node_list(balancer_id, config.id)?
        .into_iter()
        .find(|n| n.address == spec.node.address);
    let mut nodes = Nodes {
        client,
        balancer_id,
        config_id: config.id,
        dry_run,
    };

    match (live, spec.state) {
        (None, State::Present) => Ok(Outcome::changed(nodes.create(&spec.node)?)),
        (Some(node), State::Present) => nodes.update(node, &spec.node),
        (Some(node), State::Absent) => {
            nodes.remove(node)?;
            Ok(Outcome::changed(deleted()))
        }
        (None, State::Absent) => Ok(Outcome::unchanged(Value::Null)),
    }
}

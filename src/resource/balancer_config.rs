//! Balancer port-configuration reconciliation.
//!
//! Several config fields only apply under other fields' *effective* value -
//! the desired value when specified, the live value otherwise. That allows a
//! partial update to, say, tune `check_attempts` on an `https` config without
//! restating the protocol or the certificate.

use super::balancer_node::{Nodes, parent_config};
use super::{deleted, required};
use crate::client::BalancerApi;
use crate::error::{Error, Result};
use crate::model::{
    Algorithm, BalancerConfig, CipherSuite, DRY_RUN_ID, HealthCheck, Protocol, ProxyProtocol,
    Stickiness, snapshot_of,
};
use crate::schema::{ConfigResourceSpec, ConfigSpec, State};
use reconcile::{FieldDiff, ItemReconciler, Outcome, Policy, reconcile_collection};
use serde_json::{Map, Value, json};

/// Config operations under one balancer.
pub(crate) struct Configs<'a, C> {
    pub client: &'a C,
    pub balancer_id: i64,
    pub dry_run: bool,
}

impl<C: BalancerApi> ItemReconciler for Configs<'_, C> {
    type Live = BalancerConfig;
    type Spec = ConfigSpec;
    type Error = Error;

    fn matches(&self, live: &BalancerConfig, spec: &ConfigSpec) -> bool {
        live.port == spec.port
    }

    fn snapshot(&self, live: &BalancerConfig) -> Value {
        Value::Object(snapshot_of(live))
    }

    fn create(&mut self, spec: &ConfigSpec) -> Result<Value> {
        let port = spec.port;
        let protocol = *required(&spec.protocol, "config", &port.to_string(), "protocol")?;
        let algorithm = *required(&spec.algorithm, "config", &port.to_string(), "algorithm")?;
        let stickiness = *required(&spec.stickiness, "config", &port.to_string(), "stickiness")?;

        let (config_id, mut result) = if self.dry_run {
            (DRY_RUN_ID, synthesize(spec, protocol, algorithm, stickiness))
        } else {
            let mut fields = Map::new();
            fields.insert("port".into(), json!(port));
            fields.insert("protocol".into(), json!(protocol.as_str()));
            fields.insert("algorithm".into(), json!(algorithm.as_str()));
            fields.insert("stickiness".into(), json!(stickiness.as_str()));
            copy_optional_fields(&mut fields, spec);
            let config = self.client.config_create(self.balancer_id, &fields)?;
            (config.id, snapshot_of(&config))
        };

        let mut nodes = Vec::new();
        if let Some(specs) = &spec.nodes {
            let mut ops = Nodes {
                client: self.client,
                balancer_id: self.balancer_id,
                config_id,
                dry_run: self.dry_run,
            };
            for node in specs {
                nodes.push(ops.create(node)?);
            }
        }
        result.insert("nodes".into(), Value::Array(nodes));

        Ok(Value::Object(result))
    }

    fn update(&mut self, live: BalancerConfig, spec: &ConfigSpec) -> Result<Outcome> {
        let mut diff = FieldDiff::new(snapshot_of(&live));
        diff.stage("protocol", spec.protocol.map(|p| p.as_str()));
        diff.stage("algorithm", spec.algorithm.map(|a| a.as_str()));
        diff.stage("stickiness", spec.stickiness.map(|s| s.as_str()));
        diff.stage("check", spec.check.map(|c| c.as_str()));
        diff.stage("check_passive", spec.check_passive);
        diff.stage("check_interval", spec.check_interval);
        diff.stage("check_timeout", spec.check_timeout);
        diff.stage("check_attempts", spec.check_attempts);

        let effective_protocol = spec.protocol.unwrap_or(live.protocol);
        if effective_protocol == Protocol::Tcp {
            diff.stage("proxy_protocol", spec.proxy_protocol.map(|p| p.as_str()));
        }
        if effective_protocol == Protocol::Https {
            diff.stage("ssl_cert", spec.ssl_cert.as_deref());
            diff.stage("ssl_key", spec.ssl_key.as_deref());
            diff.stage("cipher_suite", spec.cipher_suite.map(|c| c.as_str()));
        }

        let effective_check = spec.check.unwrap_or(live.check);
        if effective_check.is_http() {
            diff.stage("check_path", spec.check_path.as_deref());
        }
        if effective_check == HealthCheck::HttpBody {
            diff.stage("check_body", spec.check_body.as_deref());
        }

        if diff.changed() && !self.dry_run {
            self.client
                .config_update(self.balancer_id, live.id, diff.patch())?;
        }

        let mut changed = diff.changed();
        let mut result = diff.into_result();

        if let Some(specs) = &spec.nodes {
            let live_nodes = self.client.node_list(self.balancer_id, live.id)?;
            let policy = Policy::new(spec.keep_unknown_nodes, spec.return_unknown_nodes);
            let mut ops = Nodes {
                client: self.client,
                balancer_id: self.balancer_id,
                config_id: live.id,
                dry_run: self.dry_run,
            };
            let out = reconcile_collection(&mut ops, live_nodes, specs, policy)?;
            changed = changed || out.changed;
            result.insert("nodes".into(), Value::Array(out.items));
        }

        Ok(Outcome {
            changed,
            value: Value::Object(result),
        })
    }

    fn remove(&mut self, live: BalancerConfig) -> Result<()> {
        if !self.dry_run {
            self.client.config_delete(self.balancer_id, live.id)?;
        }
        Ok(())
    }
}

fn copy_optional_fields(fields: &mut Map<String, Value>, spec: &ConfigSpec) {
    if let Some(proxy_protocol) = spec.proxy_protocol {
        fields.insert("proxy_protocol".into(), json!(proxy_protocol.as_str()));
    }
    if let Some(ssl_cert) = &spec.ssl_cert {
        fields.insert("ssl_cert".into(), json!(ssl_cert));
    }
    if let Some(ssl_key) = &spec.ssl_key {
        fields.insert("ssl_key".into(), json!(ssl_key));
    }
    if let Some(cipher_suite) = spec.cipher_suite {
        fields.insert("cipher_suite".into(), json!(cipher_suite.as_str()));
    }
    if let Some(check) = spec.check {
        fields.insert("check".into(), json!(check.as_str()));
    }
    if let Some(check_passive) = spec.check_passive {
        fields.insert("check_passive".into(), json!(check_passive));
    }
    if let Some(check_interval) = spec.check_interval {
        fields.insert("check_interval".into(), json!(check_interval));
    }
    if let Some(check_timeout) = spec.check_timeout {
        fields.insert("check_timeout".into(), json!(check_timeout));
    }
    if let Some(check_attempts) = spec.check_attempts {
        fields.insert("check_attempts".into(), json!(check_attempts));
    }
    if let Some(check_path) = &spec.check_path {
        fields.insert("check_path".into(), json!(check_path));
    }
    if let Some(check_body) = &spec.check_body {
        fields.insert("check_body".into(), json!(check_body));
    }
}

/// Structurally complete stand-in for a config that was not created.
fn synthesize(
    spec: &ConfigSpec,
    protocol: Protocol,
    algorithm: Algorithm,
    stickiness: Stickiness,
) -> Map<String, Value> {
    let node_count = spec.nodes.as_ref().map_or(0, Vec::len);
    let value = json!({
        "algorithm": algorithm.as_str(),
        "check": spec.check.unwrap_or(HealthCheck::None).as_str(),
        "check_attempts": spec.check_attempts.unwrap_or(3),
        "check_body": spec.check_body.as_deref().unwrap_or(""),
        "check_interval": spec.check_interval.unwrap_or(0),
        "check_passive": spec.check_passive.unwrap_or(true),
        "check_path": spec.check_path.as_deref().unwrap_or(""),
        "check_timeout": spec.check_timeout.unwrap_or(30),
        "cipher_suite": spec.cipher_suite.unwrap_or(CipherSuite::Recommended).as_str(),
        "id": DRY_RUN_ID,
        "balancer_id": DRY_RUN_ID,
        "nodes_status": { "down": 0, "up": node_count },
        "port": spec.port,
        "protocol": protocol.as_str(),
        "proxy_protocol": spec.proxy_protocol.unwrap_or(ProxyProtocol::None).as_str(),
        "ssl_cert": spec.ssl_cert.clone(),
        "ssl_commonname": "",
        "ssl_fingerprint": "",
        "ssl_key": spec.ssl_key.clone(),
        "stickiness": stickiness.as_str(),
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Converge one config addressed through its balancer's label.
pub fn ensure<C: BalancerApi>(
    client: &C,
    spec: &ConfigResourceSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let context = format!("config {}", spec.config.port);
    let (balancer_id, live) = parent_config(client, &spec.balancer, spec.config.port, &context)?;
    let mut configs = Configs {
        client,
        balancer_id,
        dry_run,
    };

    match (live, spec.state) {
        (None, State::Present) => Ok(Outcome::changed(configs.create(&spec.config)?)),
        (Some(config), State::Present) => configs.update(config, &spec.config),
        (Some(config), State::Absent) => {
            configs.remove(config)?;
            Ok(Outcome::changed(deleted()))
        }
        (None, State::Absent) => Ok(Outcome::unchanged(Value::Null)),
    }
}

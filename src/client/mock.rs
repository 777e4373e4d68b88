//! In-memory stand-in for the remote API, used by the resource tests.
//!
//! Holds the whole cloud in a `RefCell` and records every mutating call in
//! order, so tests can assert both on converged state and on which remote
//! operations were (or were not) issued.

use super::{BalancerApi, CreatedInstance, DomainApi, InstanceApi, VolumeApi};
use crate::error::Result;
use crate::model::{
    Balancer, BalancerConfig, BalancerNode, Domain, DomainRecord, Instance, Volume,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default)]
struct Cloud {
    next_id: i64,
    instances: Vec<Instance>,
    volumes: Vec<Volume>,
    domains: Vec<Domain>,
    records: HashMap<i64, Vec<DomainRecord>>,
    balancers: Vec<Balancer>,
    configs: HashMap<i64, Vec<BalancerConfig>>,
    nodes: HashMap<i64, Vec<BalancerNode>>,
    instance_rdns: HashMap<i64, String>,
    balancer_rdns: HashMap<i64, String>,
    private_ips: HashMap<i64, Vec<String>>,
}

impl Cloud {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// The test double. `mutations` lists every state-changing call, in order.
#[derive(Default)]
pub struct TestCloud {
    cloud: RefCell<Cloud>,
    pub mutations: RefCell<Vec<String>>,
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

/// Overlay a patch onto a stored object.
fn merge<T: Serialize + serde::de::DeserializeOwned>(object: &mut T, patch: &Map<String, Value>) {
    let mut value = serde_json::to_value(&*object).unwrap();
    value
        .as_object_mut()
        .unwrap()
        .extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
    *object = parse(value);
}

impl TestCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self, call: impl Into<String>) {
        self.mutations.borrow_mut().push(call.into());
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.borrow().len()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn seed_instance(&self, label: &str, extra: Value) -> i64 {
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "label": label, "status": "running" });
        body.as_object_mut()
            .unwrap()
            .extend(extra.as_object().cloned().unwrap_or_default());
        cloud.instances.push(parse(body));
        id
    }

    pub fn seed_volume(&self, label: &str, extra: Value) -> i64 {
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({
            "id": id,
            "label": label,
            "status": "active",
            "size": 20,
            "instance_id": null,
        });
        body.as_object_mut()
            .unwrap()
            .extend(extra.as_object().cloned().unwrap_or_default());
        cloud.volumes.push(parse(body));
        id
    }

    pub fn seed_domain(&self, name: &str, extra: Value) -> i64 {
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "domain": name, "status": "active" });
        body.as_object_mut()
            .unwrap()
            .extend(extra.as_object().cloned().unwrap_or_default());
        cloud.domains.push(parse(body));
        cloud.records.insert(id, Vec::new());
        id
    }

    pub fn seed_record(&self, domain_id: i64, record: Value) -> i64 {
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id });
        body.as_object_mut()
            .unwrap()
            .extend(record.as_object().cloned().unwrap());
        cloud.records.entry(domain_id).or_default().push(parse(body));
        id
    }

    pub fn seed_balancer(&self, label: &str, extra: Value) -> i64 {
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "label": label });
        body.as_object_mut()
            .unwrap()
            .extend(extra.as_object().cloned().unwrap_or_default());
        cloud.balancers.push(parse(body));
        cloud.configs.insert(id, Vec::new());
        id
    }

    pub fn seed_config(&self, balancer_id: i64, config: Value) -> i64 {
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id });
        body.as_object_mut()
            .unwrap()
            .extend(config.as_object().cloned().unwrap());
        cloud.configs.entry(balancer_id).or_default().push(parse(body));
        cloud.nodes.insert(id, Vec::new());
        id
    }

    pub fn seed_node(&self, config_id: i64, node: Value) -> i64 {
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "status": "UP" });
        body.as_object_mut()
            .unwrap()
            .extend(node.as_object().cloned().unwrap());
        cloud.nodes.entry(config_id).or_default().push(parse(body));
        id
    }

    pub fn set_instance_rdns(&self, id: i64, rdns: &str) {
        self.cloud
            .borrow_mut()
            .instance_rdns
            .insert(id, rdns.to_string());
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn volume(&self, label: &str) -> Option<Volume> {
        self.cloud
            .borrow()
            .volumes
            .iter()
            .find(|v| v.label == label)
            .cloned()
    }

    pub fn records_of(&self, domain_id: i64) -> Vec<DomainRecord> {
        self.cloud
            .borrow()
            .records
            .get(&domain_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn configs_of(&self, balancer_id: i64) -> Vec<BalancerConfig> {
        self.cloud
            .borrow()
            .configs
            .get(&balancer_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn nodes_of(&self, config_id: i64) -> Vec<BalancerNode> {
        self.cloud
            .borrow()
            .nodes
            .get(&config_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl InstanceApi for TestCloud {
    fn instance_find(&self, label: &str) -> Result<Option<Instance>> {
        Ok(self
            .cloud
            .borrow()
            .instances
            .iter()
            .find(|i| i.label == label)
            .cloned())
    }

    fn instance_create(&self, fields: &Map<String, Value>) -> Result<CreatedInstance> {
        self.log(format!("instance_create {}", fields["label"].as_str().unwrap()));
        let supplied_pass = fields.contains_key("root_pass");
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "status": "provisioning" });
        body.as_object_mut().unwrap().extend(fields.clone());
        let instance: Instance = parse(body);
        cloud.instances.push(instance.clone());
        Ok(CreatedInstance {
            instance,
            root_pass: (!supplied_pass).then(|| "generated-pass".to_string()),
        })
    }

    fn instance_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()> {
        self.log(format!("instance_update {id}"));
        let mut cloud = self.cloud.borrow_mut();
        let instance = cloud.instances.iter_mut().find(|i| i.id == id).unwrap();
        merge(instance, patch);
        Ok(())
    }

    fn instance_delete(&self, id: i64) -> Result<()> {
        self.log(format!("instance_delete {id}"));
        self.cloud.borrow_mut().instances.retain(|i| i.id != id);
        Ok(())
    }

    fn instance_private_ips(&self, id: i64) -> Result<Vec<String>> {
        Ok(self
            .cloud
            .borrow()
            .private_ips
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    fn instance_allocate_private_ip(&self, id: i64) -> Result<()> {
        self.log(format!("instance_allocate_private_ip {id}"));
        self.cloud
            .borrow_mut()
            .private_ips
            .entry(id)
            .or_default()
            .push("192.168.128.10".to_string());
        Ok(())
    }

    fn instance_rdns(&self, id: i64) -> Result<Option<String>> {
        Ok(self.cloud.borrow().instance_rdns.get(&id).cloned())
    }

    fn instance_set_rdns(&self, id: i64, rdns: &str) -> Result<()> {
        self.log(format!("instance_set_rdns {id}"));
        self.cloud
            .borrow_mut()
            .instance_rdns
            .insert(id, rdns.to_string());
        Ok(())
    }
}

impl VolumeApi for TestCloud {
    fn volume_find(&self, label: &str) -> Result<Option<Volume>> {
        Ok(self.volume(label))
    }

    fn volume_create(&self, fields: &Map<String, Value>) -> Result<Volume> {
        self.log(format!("volume_create {}", fields["label"].as_str().unwrap()));
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "status": "active", "instance_id": null });
        body.as_object_mut().unwrap().extend(fields.clone());
        let volume: Volume = parse(body);
        cloud.volumes.push(volume.clone());
        Ok(volume)
    }

    fn volume_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()> {
        self.log(format!("volume_update {id}"));
        let mut cloud = self.cloud.borrow_mut();
        let volume = cloud.volumes.iter_mut().find(|v| v.id == id).unwrap();
        merge(volume, patch);
        Ok(())
    }

    fn volume_delete(&self, id: i64) -> Result<()> {
        self.log(format!("volume_delete {id}"));
        self.cloud.borrow_mut().volumes.retain(|v| v.id != id);
        Ok(())
    }

    fn volume_attach(&self, id: i64, instance_id: i64) -> Result<()> {
        self.log(format!("volume_attach {id} -> {instance_id}"));
        let mut cloud = self.cloud.borrow_mut();
        let label = cloud
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .map(|i| i.label.clone());
        let volume = cloud.volumes.iter_mut().find(|v| v.id == id).unwrap();
        volume.instance_id = Some(instance_id);
        volume
            .rest
            .insert("instance_label".to_string(), json!(label));
        Ok(())
    }

    fn volume_detach(&self, id: i64) -> Result<()> {
        self.log(format!("volume_detach {id}"));
        let mut cloud = self.cloud.borrow_mut();
        let volume = cloud.volumes.iter_mut().find(|v| v.id == id).unwrap();
        volume.instance_id = None;
        volume.rest.insert("instance_label".to_string(), Value::Null);
        Ok(())
    }

    fn volume_resize(&self, id: i64, size: u64) -> Result<()> {
        self.log(format!("volume_resize {id} -> {size}"));
        let mut cloud = self.cloud.borrow_mut();
        cloud.volumes.iter_mut().find(|v| v.id == id).unwrap().size = size;
        Ok(())
    }
}

impl DomainApi for TestCloud {
    fn domain_find(&self, name: &str) -> Result<Option<Domain>> {
        Ok(self
            .cloud
            .borrow()
            .domains
            .iter()
            .find(|d| d.domain == name)
            .cloned())
    }

    fn domain_create(&self, fields: &Map<String, Value>) -> Result<Domain> {
        self.log(format!("domain_create {}", fields["domain"].as_str().unwrap()));
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "status": "active" });
        body.as_object_mut().unwrap().extend(fields.clone());
        let domain: Domain = parse(body);
        cloud.domains.push(domain.clone());
        cloud.records.insert(id, Vec::new());
        Ok(domain)
    }

    fn domain_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()> {
        self.log(format!("domain_update {id}"));
        let mut cloud = self.cloud.borrow_mut();
        let domain = cloud.domains.iter_mut().find(|d| d.id == id).unwrap();
        merge(domain, patch);
        Ok(())
    }

    fn domain_delete(&self, id: i64) -> Result<()> {
        self.log(format!("domain_delete {id}"));
        let mut cloud = self.cloud.borrow_mut();
        cloud.domains.retain(|d| d.id != id);
        cloud.records.remove(&id);
        Ok(())
    }

    fn record_list(&self, domain_id: i64) -> Result<Vec<DomainRecord>> {
        Ok(self.records_of(domain_id))
    }

    fn record_create(&self, domain_id: i64, fields: &Map<String, Value>) -> Result<DomainRecord> {
        self.log(format!(
            "record_create {}/{}",
            fields["type"].as_str().unwrap(),
            fields["name"].as_str().unwrap()
        ));
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id });
        body.as_object_mut().unwrap().extend(fields.clone());
        let record: DomainRecord = parse(body);
        cloud
            .records
            .entry(domain_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn record_update(
        &self,
        domain_id: i64,
        record_id: i64,
        patch: &Map<String, Value>,
    ) -> Result<()> {
        self.log(format!("record_update {record_id}"));
        let mut cloud = self.cloud.borrow_mut();
        let record = cloud
            .records
            .get_mut(&domain_id)
            .unwrap()
            .iter_mut()
            .find(|r| r.id == record_id)
            .unwrap();
        merge(record, patch);
        Ok(())
    }

    fn record_delete(&self, domain_id: i64, record_id: i64) -> Result<()> {
        self.log(format!("record_delete {record_id}"));
        self.cloud
            .borrow_mut()
            .records
            .get_mut(&domain_id)
            .unwrap()
            .retain(|r| r.id != record_id);
        Ok(())
    }
}

impl BalancerApi for TestCloud {
    fn balancer_find(&self, label: &str) -> Result<Option<Balancer>> {
        Ok(self
            .cloud
            .borrow()
            .balancers
            .iter()
            .find(|b| b.label == label)
            .cloned())
    }

    fn balancer_create(&self, fields: &Map<String, Value>) -> Result<Balancer> {
        self.log(format!(
            "balancer_create {}",
            fields["label"].as_str().unwrap()
        ));
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "ipv4": "0.0.0.0" });
        body.as_object_mut().unwrap().extend(fields.clone());
        let balancer: Balancer = parse(body);
        cloud.balancers.push(balancer.clone());
        cloud.configs.insert(id, Vec::new());
        Ok(balancer)
    }

    fn balancer_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()> {
        self.log(format!("balancer_update {id}"));
        let mut cloud = self.cloud.borrow_mut();
        let balancer = cloud.balancers.iter_mut().find(|b| b.id == id).unwrap();
        merge(balancer, patch);
        Ok(())
    }

    fn balancer_delete(&self, id: i64) -> Result<()> {
        self.log(format!("balancer_delete {id}"));
        let mut cloud = self.cloud.borrow_mut();
        cloud.balancers.retain(|b| b.id != id);
        cloud.configs.remove(&id);
        Ok(())
    }

    fn balancer_rdns(&self, id: i64) -> Result<Option<String>> {
        Ok(self.cloud.borrow().balancer_rdns.get(&id).cloned())
    }

    fn balancer_set_rdns(&self, id: i64, rdns: &str) -> Result<()> {
        self.log(format!("balancer_set_rdns {id}"));
        self.cloud
            .borrow_mut()
            .balancer_rdns
            .insert(id, rdns.to_string());
        Ok(())
    }

    fn config_list(&self, balancer_id: i64) -> Result<Vec<BalancerConfig>> {
        Ok(self.configs_of(balancer_id))
    }

    fn config_create(
        &self,
        balancer_id: i64,
        fields: &Map<String, Value>,
    ) -> Result<BalancerConfig> {
        self.log(format!("config_create :{}", fields["port"]));
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "check": "none" });
        body.as_object_mut().unwrap().extend(fields.clone());
        let config: BalancerConfig = parse(body);
        cloud
            .configs
            .entry(balancer_id)
            .or_default()
            .push(config.clone());
        cloud.nodes.insert(id, Vec::new());
        Ok(config)
    }

    fn config_update(
        &self,
        balancer_id: i64,
        config_id: i64,
        patch: &Map<String, Value>,
    ) -> Result<()> {
        self.log(format!("config_update {config_id}"));
        let mut cloud = self.cloud.borrow_mut();
        let config = cloud
            .configs
            .get_mut(&balancer_id)
            .unwrap()
            .iter_mut()
            .find(|c| c.id == config_id)
            .unwrap();
        merge(config, patch);
        Ok(())
    }

    fn config_delete(&self, balancer_id: i64, config_id: i64) -> Result<()> {
        self.log(format!("config_delete {config_id}"));
        let mut cloud = self.cloud.borrow_mut();
        cloud
            .configs
            .get_mut(&balancer_id)
            .unwrap()
            .retain(|c| c.id != config_id);
        cloud.nodes.remove(&config_id);
        Ok(())
    }

    fn node_list(&self, _balancer_id: i64, config_id: i64) -> Result<Vec<BalancerNode>> {
        Ok(self.nodes_of(config_id))
    }

    fn node_create(
        &self,
        _balancer_id: i64,
        config_id: i64,
        fields: &Map<String, Value>,
    ) -> Result<BalancerNode> {
        self.log(format!(
            "node_create {}",
            fields["address"].as_str().unwrap()
        ));
        let mut cloud = self.cloud.borrow_mut();
        let id = cloud.next_id();
        let mut body = json!({ "id": id, "status": "UP" });
        body.as_object_mut().unwrap().extend(fields.clone());
        let node: BalancerNode = parse(body);
        cloud.nodes.entry(config_id).or_default().push(node.clone());
        Ok(node)
    }

    fn node_update(
        &self,
        _balancer_id: i64,
        config_id: i64,
        node_id: i64,
        patch: &Map<String, Value>,
    ) -> Result<()> {
        self.log(format!("node_update {node_id}"));
        let mut cloud = self.cloud.borrow_mut();
        let node = cloud
            .nodes
            .get_mut(&config_id)
            .unwrap()
            .iter_mut()
            .find(|n| n.id == node_id)
            .unwrap();
        merge(node, patch);
        Ok(())
    }

    fn node_delete(&self, _balancer_id: i64, config_id: i64, node_id: i64) -> Result<()> {
        self.log(format!("node_delete {node_id}"));
        self.cloud
            .borrow_mut()
            .nodes
            .get_mut(&config_id)
            .unwrap()
            .retain(|n| n.id != node_id);
        Ok(())
    }
}

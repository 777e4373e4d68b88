//! Remote API client boundary.
//!
//! The reconciliation logic talks to the remote service exclusively through
//! these per-resource traits, never through a concrete transport object. The
//! production implementation is [`http::HttpClient`]; tests drive the same
//! traits with an in-memory double that records every mutating call.
//!
//! `find` returns `Ok(None)` for "absent" - absence is an expected state, not
//! an error. Create operations take the already-filtered field payload; the
//! control keys of a spec (state, policy flags, nested lists) never reach the
//! wire.

pub mod http;
#[cfg(test)]
pub mod mock;

use crate::error::Result;
use crate::model::{
    Balancer, BalancerConfig, BalancerNode, Domain, DomainRecord, Instance, Volume,
};
use serde_json::{Map, Value};

/// A freshly created instance plus the generated root password, when the
/// remote generated one rather than receiving it.
#[derive(Debug)]
pub struct CreatedInstance {
    pub instance: Instance,
    pub root_pass: Option<String>,
}

/// Compute instance operations.
pub trait InstanceApi {
    fn instance_find(&self, label: &str) -> Result<Option<Instance>>;
    fn instance_create(&self, fields: &Map<String, Value>) -> Result<CreatedInstance>;
    fn instance_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()>;
    fn instance_delete(&self, id: i64) -> Result<()>;
    fn instance_private_ips(&self, id: i64) -> Result<Vec<String>>;
    fn instance_allocate_private_ip(&self, id: i64) -> Result<()>;
    fn instance_rdns(&self, id: i64) -> Result<Option<String>>;
    fn instance_set_rdns(&self, id: i64, rdns: &str) -> Result<()>;
}

/// Block-storage volume operations.
pub trait VolumeApi {
    fn volume_find(&self, label: &str) -> Result<Option<Volume>>;
    fn volume_create(&self, fields: &Map<String, Value>) -> Result<Volume>;
    fn volume_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()>;
    fn volume_delete(&self, id: i64) -> Result<()>;
    fn volume_attach(&self, id: i64, instance_id: i64) -> Result<()>;
    fn volume_detach(&self, id: i64) -> Result<()>;
    fn volume_resize(&self, id: i64, size: u64) -> Result<()>;
}

/// DNS zone and record operations.
pub trait DomainApi {
    fn domain_find(&self, name: &str) -> Result<Option<Domain>>;
    fn domain_create(&self, fields: &Map<String, Value>) -> Result<Domain>;
    fn domain_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()>;
    fn domain_delete(&self, id: i64) -> Result<()>;
    fn record_list(&self, domain_id: i64) -> Result<Vec<DomainRecord>>;
    fn record_create(&self, domain_id: i64, fields: &Map<String, Value>) -> Result<DomainRecord>;
    fn record_update(&self, domain_id: i64, record_id: i64, patch: &Map<String, Value>)
    -> Result<()>;
    fn record_delete(&self, domain_id: i64, record_id: i64) -> Result<()>;
}

/// Load balancer, config and node operations.
pub trait BalancerApi {
    fn balancer_find(&self, label: &str) -> Result<Option<Balancer>>;
    fn balancer_create(&self, fields: &Map<String, Value>) -> Result<Balancer>;
    fn balancer_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()>;
    fn balancer_delete(&self, id: i64) -> Result<()>;
    fn balancer_rdns(&self, id: i64) -> Result<Option<String>>;
    fn balancer_set_rdns(&self, id: i64, rdns: &str) -> Result<()>;

    fn config_list(&self, balancer_id: i64) -> Result<Vec<BalancerConfig>>;
    fn config_create(&self, balancer_id: i64, fields: &Map<String, Value>)
    -> Result<BalancerConfig>;
    fn config_update(
        &self,
        balancer_id: i64,
        config_id: i64,
        patch: &Map<String, Value>,
    ) -> Result<()>;
    fn config_delete(&self, balancer_id: i64, config_id: i64) -> Result<()>;

    fn node_list(&self, balancer_id: i64, config_id: i64) -> Result<Vec<BalancerNode>>;
    fn node_create(
        &self,
        balancer_id: i64,
        config_id: i64,
        fields: &Map<String, Value>,
    ) -> Result<BalancerNode>;
    fn node_update(
        &self,
        balancer_id: i64,
        config_id: i64,
        node_id: i64,
        patch: &Map<String, Value>,
    ) -> Result<()>;
    fn node_delete(&self, balancer_id: i64, config_id: i64, node_id: i64) -> Result<()>;
}

//! Manifest schema - the desired state document.
//!
//! A manifest is a TOML or JSON file listing resource specs. Everything is
//! deserialized into typed structs here and validated once, before any
//! orchestrator runs; the reconciliation code never sees raw maps. Unknown
//! keys are ignored, omitted optional fields mean "leave the live value
//! untouched".

use crate::error::{Error, Result};
use crate::model::{
    Algorithm, CaaTag, CipherSuite, DomainKind, HealthCheck, NodeMode, Protocol, ProxyProtocol,
    RecordType, SrvProtocol, Stickiness,
};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Requested state
// ============================================================================

/// Requested end state for most resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Present,
    Absent,
}

/// Requested end state for volumes, which adds the attach relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    Attached,
    #[default]
    Detached,
    Absent,
}

// ============================================================================
// Resource specs
// ============================================================================

/// Desired state of a compute instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceSpec {
    pub label: String,
    #[serde(default)]
    pub state: State,
    pub region: Option<String>,
    #[serde(rename = "type")]
    pub plan: Option<String>,
    pub image: Option<String>,
    pub group: Option<String>,
    pub root_pass: Option<String>,
    pub tags: Option<Vec<String>>,
    pub authorized_keys: Option<Vec<String>>,
    pub ipv4_public_rdns: Option<String>,
    pub private_ip: Option<bool>,
}

/// Desired state of a block-storage volume.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeSpec {
    pub label: String,
    #[serde(default)]
    pub state: VolumeState,
    pub region: Option<String>,
    pub size: Option<u64>,
    pub tags: Option<Vec<String>>,
    /// Instance to attach to; required when `state = "attached"`.
    pub instance: Option<String>,
    /// Detach before deleting even if attached.
    pub force: Option<bool>,
}

/// Desired state of the instance-volume attach relation.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentSpec {
    pub instance: String,
    pub volume: String,
    #[serde(default)]
    pub state: State,
}

/// Desired state of a DNS zone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainSpec {
    pub domain: String,
    #[serde(default)]
    pub state: State,
    #[serde(rename = "type")]
    pub kind: Option<DomainKind>,
    pub soa_email: Option<String>,
    pub group: Option<String>,
    pub description: Option<String>,
    pub retry_sec: Option<i64>,
    pub expire_sec: Option<i64>,
    pub refresh_sec: Option<i64>,
    pub ttl_sec: Option<i64>,
    pub master_ips: Option<Vec<String>>,
    pub axfr_ips: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub records: Option<Vec<RecordSpec>>,
    pub keep_unknown_records: Option<bool>,
    pub return_unknown_records: Option<bool>,
}

/// Desired state of one DNS record inside a zone.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordSpec {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: String,
    pub target: String,
    pub ttl_sec: Option<i64>,
    /// MX and SRV only.
    pub priority: Option<i64>,
    /// SRV only.
    pub weight: Option<i64>,
    pub port: Option<i64>,
    pub service: Option<String>,
    pub protocol: Option<SrvProtocol>,
    /// CAA only.
    pub tag: Option<CaaTag>,
}

/// A record addressed on its own, through its parent zone's name.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordResourceSpec {
    pub domain: String,
    #[serde(default)]
    pub state: State,
    #[serde(flatten)]
    pub record: RecordSpec,
}

/// Desired state of a load balancer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalancerSpec {
    pub label: String,
    #[serde(default)]
    pub state: State,
    pub region: Option<String>,
    pub client_conn_throttle: Option<i64>,
    pub ipv4_public_rdns: Option<String>,
    pub configs: Option<Vec<ConfigSpec>>,
    pub keep_unknown_configs: Option<bool>,
    pub return_unknown_configs: Option<bool>,
}

/// Desired state of one balancer port configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSpec {
    pub port: u16,
    pub protocol: Option<Protocol>,
    pub algorithm: Option<Algorithm>,
    pub stickiness: Option<Stickiness>,
    /// Applies when the effective protocol is `tcp`.
    pub proxy_protocol: Option<ProxyProtocol>,
    /// `ssl_cert`, `ssl_key` and `cipher_suite` apply when the effective
    /// protocol is `https`.
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
    pub cipher_suite: Option<CipherSuite>,
    pub check: Option<HealthCheck>,
    pub check_passive: Option<bool>,
    pub check_interval: Option<i64>,
    pub check_timeout: Option<i64>,
    pub check_attempts: Option<i64>,
    /// Applies when the effective check is `http` or `http_body`.
    pub check_path: Option<String>,
    /// Applies when the effective check is `http_body`.
    pub check_body: Option<String>,
    pub nodes: Option<Vec<NodeSpec>>,
    pub keep_unknown_nodes: Option<bool>,
    pub return_unknown_nodes: Option<bool>,
}

/// A balancer config addressed on its own, through its balancer's label.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigResourceSpec {
    pub balancer: String,
    #[serde(default)]
    pub state: State,
    #[serde(flatten)]
    pub config: ConfigSpec,
}

/// Desired state of one backend node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub address: String,
    pub label: Option<String>,
    pub mode: Option<NodeMode>,
    pub weight: Option<i64>,
}

/// A backend node addressed on its own, through its balancer and port.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeResourceSpec {
    pub balancer: String,
    pub port: u16,
    #[serde(default)]
    pub state: State,
    #[serde(flatten)]
    pub node: NodeSpec,
}

// ============================================================================
// Manifest
// ============================================================================

/// A full desired-state document. Resources are reconciled in field order,
/// each one independently and sequentially.
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub instances: Vec<InstanceSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub attachments: Vec<AttachmentSpec>,
    #[serde(default)]
    pub domains: Vec<DomainSpec>,
    #[serde(default)]
    pub records: Vec<RecordResourceSpec>,
    #[serde(default)]
    pub balancers: Vec<BalancerSpec>,
    #[serde(default)]
    pub configs: Vec<ConfigResourceSpec>,
    #[serde(default)]
    pub nodes: Vec<NodeResourceSpec>,
}

impl Manifest {
    /// Load a manifest from a TOML (default) or JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("could not read {}: {e}", path.display())))?;

        let manifest: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| Error::config(format!("invalid manifest {}: {e}", path.display())))?
        } else {
            toml::from_str(&content)
                .map_err(|e| Error::config(format!("invalid manifest {}: {e}", path.display())))?
        };

        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate every spec in the document. All range and shape errors are
    /// reported against the resource's natural key.
    pub fn validate(&self) -> Result<()> {
        for spec in &self.balancers {
            validate_balancer(spec)?;
        }
        for spec in &self.configs {
            validate_config(&spec.config)?;
        }
        for spec in &self.nodes {
            validate_node(&spec.node)?;
        }
        for spec in &self.domains {
            if let Some(records) = &spec.records {
                for record in records {
                    validate_record(record, &spec.domain)?;
                }
            }
        }
        for spec in &self.records {
            validate_record(&spec.record, &spec.domain)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
            && self.volumes.is_empty()
            && self.attachments.is_empty()
            && self.domains.is_empty()
            && self.records.is_empty()
            && self.balancers.is_empty()
            && self.configs.is_empty()
            && self.nodes.is_empty()
    }
}

fn validate_balancer(spec: &BalancerSpec) -> Result<()> {
    let len = spec.label.chars().count();
    if !(3..=32).contains(&len) {
        return Err(Error::config(format!(
            "balancer label {:?} must be 3 to 32 characters",
            spec.label
        )));
    }
    if let Some(throttle) = spec.client_conn_throttle
        && !(0..=20).contains(&throttle)
    {
        return Err(Error::config(format!(
            "{} balancer client_conn_throttle must be 0 to 20, got {throttle}",
            spec.label
        )));
    }
    if let Some(configs) = &spec.configs {
        for config in configs {
            validate_config(config)?;
        }
    }
    Ok(())
}

fn validate_config(spec: &ConfigSpec) -> Result<()> {
    if spec.port == 0 {
        return Err(Error::config("balancer config port must be 1 to 65535"));
    }
    if let Some(timeout) = spec.check_timeout
        && !(1..=30).contains(&timeout)
    {
        return Err(Error::config(format!(
            "config {} check_timeout must be 1 to 30, got {timeout}",
            spec.port
        )));
    }
    if let Some(attempts) = spec.check_attempts
        && !(1..=30).contains(&attempts)
    {
        return Err(Error::config(format!(
            "config {} check_attempts must be 1 to 30, got {attempts}",
            spec.port
        )));
    }
    if let Some(nodes) = &spec.nodes {
        for node in nodes {
            validate_node(node)?;
        }
    }
    Ok(())
}

fn validate_node(spec: &NodeSpec) -> Result<()> {
    if let Some(weight) = spec.weight
        && !(1..=255).contains(&weight)
    {
        return Err(Error::config(format!(
            "node {} weight must be 1 to 255, got {weight}",
            spec.address
        )));
    }
    Ok(())
}

fn validate_record(spec: &RecordSpec, domain: &str) -> Result<()> {
    if let Some(port) = spec.port
        && !(0..=65535).contains(&port)
    {
        return Err(Error::config(format!(
            "{domain} record {} port must be 0 to 65535, got {port}",
            spec.name
        )));
    }
    Ok(())
}

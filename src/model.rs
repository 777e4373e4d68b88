//! Remote resource types.
//!
//! Each live object carries the fields the reconciliation logic reads -
//! natural keys and discriminators - as typed fields, and keeps everything
//! else the remote returns in a flattened passthrough map so snapshots
//! round-trip faithfully.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned to objects synthesized during a dry run, signaling
/// "not a real remote object".
pub const DRY_RUN_ID: i64 = -1;

/// Serialize a live object into its JSON-object snapshot.
///
/// These are plain data structs; serialization cannot fail for them.
pub fn snapshot_of<T: Serialize>(object: &T) -> Map<String, Value> {
    match serde_json::to_value(object) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

// ============================================================================
// Compute
// ============================================================================

/// A compute instance, identified by its label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub label: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A block-storage volume, identified by its label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: i64,
    pub label: String,
    pub status: String,
    pub size: u64,
    /// Owning instance when attached.
    pub instance_id: Option<i64>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

// ============================================================================
// DNS
// ============================================================================

/// A DNS zone, identified by its domain name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,
    pub domain: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A record inside a zone. Identity is type-dependent: `{name, target}` for
/// most types, `{target, service, protocol, port}` for SRV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: String,
    pub target: String,
    pub service: Option<String>,
    pub protocol: Option<String>,
    pub port: Option<i64>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// DNS record types accepted by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    Ns,
    Mx,
    A,
    Aaaa,
    Cname,
    Txt,
    Srv,
    Caa,
    Ptr,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ns => "NS",
            Self::Mx => "MX",
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Txt => "TXT",
            Self::Srv => "SRV",
            Self::Caa => "CAA",
            Self::Ptr => "PTR",
        }
    }
}

/// Zone authority kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Master,
    Slave,
}

impl DomainKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Slave => "slave",
        }
    }
}

/// Transport protocols addressable by SRV records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SrvProtocol {
    Tcp,
    Udp,
    Xmpp,
    Tls,
    Smtp,
}

impl SrvProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Xmpp => "xmpp",
            Self::Tls => "tls",
            Self::Smtp => "smtp",
        }
    }
}

/// CAA record tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaaTag {
    Issue,
    Issuewild,
    Iodef,
}

impl CaaTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Issuewild => "issuewild",
            Self::Iodef => "iodef",
        }
    }
}

// ============================================================================
// Load balancing
// ============================================================================

/// A load balancer, identified by its label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balancer {
    pub id: i64,
    pub label: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A balancer port configuration, identified by its port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    pub id: i64,
    pub port: u16,
    pub protocol: Protocol,
    pub check: HealthCheck,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A backend node of a balancer config, identified by its address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerNode {
    pub id: i64,
    pub address: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Frontend protocol of a balancer config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Http,
    Https,
    Tcp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
        }
    }
}

/// Balancing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "roundrobin")]
    RoundRobin,
    #[serde(rename = "leastconn")]
    LeastConn,
    #[serde(rename = "source")]
    Source,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "roundrobin",
            Self::LeastConn => "leastconn",
            Self::Source => "source",
        }
    }
}

/// Session stickiness strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stickiness {
    None,
    Table,
    HttpCookie,
}

impl Stickiness {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Table => "table",
            Self::HttpCookie => "http_cookie",
        }
    }
}

/// Backend health check kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCheck {
    None,
    Connection,
    Http,
    HttpBody,
}

impl HealthCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Connection => "connection",
            Self::Http => "http",
            Self::HttpBody => "http_body",
        }
    }

    /// Whether this check issues HTTP requests (and therefore needs a path).
    pub fn is_http(self) -> bool {
        matches!(self, Self::Http | Self::HttpBody)
    }
}

/// PROXY-protocol version announced to TCP backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyProtocol {
    None,
    V1,
    V2,
}

impl ProxyProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

/// TLS cipher suite profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherSuite {
    Recommended,
    Legacy,
}

impl CipherSuite {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::Legacy => "legacy",
        }
    }
}

/// Traffic mode of a backend node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMode {
    #[default]
    Accept,
    Reject,
    Drain,
    Backup,
}

impl NodeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Drain => "drain",
            Self::Backup => "backup",
        }
    }
}

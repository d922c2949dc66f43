//! Brightbox API types.
//!
//! Snapshots returned by the API and the option structs sent to it. Option
//! structs only serialize the fields that are set, so an update is a partial
//! patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mapping status of a Cloud IP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudIpStatus {
    /// Attached to a target.
    Mapped,
    /// Not attached.
    Unmapped,
    /// Any status this client does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

impl CloudIpStatus {
    /// Returns the API label for this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mapped => "mapped",
            Self::Unmapped => "unmapped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CloudIpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cloud IP routing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Network address translation.
    Nat,
    /// Routed.
    Route,
}

/// Accepted [`Mode`] labels.
pub const MODES: &[&str] = &["nat", "route"];

impl Mode {
    /// Returns the API label for this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nat => "nat",
            Self::Route => "route",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nat" => Ok(Self::Nat),
            "route" => Ok(Self::Route),
            other => Err(format!("invalid mode: {other}")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport protocol of a port translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

/// Accepted [`TransportProtocol`] labels.
pub const TRANSPORT_PROTOCOLS: &[&str] = &["tcp", "udp"];

impl TransportProtocol {
    /// Returns the API label for this protocol.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl FromStr for TransportProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(format!("invalid transport protocol: {other}")),
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Port translation rule on a Cloud IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTranslator {
    /// Port traffic arrives on.
    pub incoming: u16,
    /// Port traffic is forwarded to.
    pub outgoing: u16,
    /// Transport protocol.
    pub protocol: TransportProtocol,
}

/// Reference to another API resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Identifier of the referenced resource.
    pub id: String,
}

impl ResourceRef {
    /// Creates a reference to `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The entity a Cloud IP is mapped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A server (`srv-`).
    Server(String),
    /// A server interface (`int-`).
    Interface(String),
    /// A load balancer (`lba-`).
    LoadBalancer(String),
    /// A database server (`dbs-`).
    DatabaseServer(String),
    /// A server group (`grp-`).
    ServerGroup(String),
}

impl Target {
    /// Identifies the target kind from an ID prefix.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        let (prefix, rest) = id.split_once('-')?;
        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        let id = id.to_string();
        match prefix {
            "srv" => Some(Self::Server(id)),
            "int" => Some(Self::Interface(id)),
            "lba" => Some(Self::LoadBalancer(id)),
            "dbs" => Some(Self::DatabaseServer(id)),
            "grp" => Some(Self::ServerGroup(id)),
            _ => None,
        }
    }

    /// Identifier of the target.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Server(id)
            | Self::Interface(id)
            | Self::LoadBalancer(id)
            | Self::DatabaseServer(id)
            | Self::ServerGroup(id) => id,
        }
    }
}

/// A Cloud IP snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudIp {
    /// Cloud IP identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Mapping status.
    #[serde(default)]
    pub status: CloudIpStatus,
    /// Routing mode.
    #[serde(default)]
    pub mode: Option<Mode>,
    /// Legacy alias of the IPv4 address.
    #[serde(default)]
    pub public_ip: String,
    /// IPv4 address.
    #[serde(default)]
    pub public_ipv4: String,
    /// IPv6 address.
    #[serde(default)]
    pub public_ipv6: String,
    /// Fully qualified domain name.
    #[serde(default)]
    pub fqdn: String,
    /// Reverse DNS entry.
    #[serde(default)]
    pub reverse_dns: String,
    /// Port translation rules.
    #[serde(default)]
    pub port_translators: Vec<PortTranslator>,
    /// Mapped server.
    #[serde(default)]
    pub server: Option<ResourceRef>,
    /// Mapped interface.
    #[serde(default)]
    pub interface: Option<ResourceRef>,
    /// Mapped load balancer.
    #[serde(default)]
    pub load_balancer: Option<ResourceRef>,
    /// Mapped database server.
    #[serde(default)]
    pub database_server: Option<ResourceRef>,
    /// Mapped server group.
    #[serde(default)]
    pub server_group: Option<ResourceRef>,
}

impl CloudIp {
    /// Resolves the mapped target.
    ///
    /// The API may report a server together with its interface; the last
    /// populated entry in the order server, interface, load balancer,
    /// database server, server group wins.
    #[must_use]
    pub fn target(&self) -> Option<Target> {
        let mut target = None;
        if let Some(r) = &self.server {
            target = Some(Target::Server(r.id.clone()));
        }
        if let Some(r) = &self.interface {
            target = Some(Target::Interface(r.id.clone()));
        }
        if let Some(r) = &self.load_balancer {
            target = Some(Target::LoadBalancer(r.id.clone()));
        }
        if let Some(r) = &self.database_server {
            target = Some(Target::DatabaseServer(r.id.clone()));
        }
        if let Some(r) = &self.server_group {
            target = Some(Target::ServerGroup(r.id.clone()));
        }
        target
    }
}

/// Options for creating or updating a Cloud IP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CloudIpOptions {
    /// Cloud IP to update; empty on create.
    #[serde(skip)]
    pub id: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Routing mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Reverse DNS entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_dns: Option<String>,
    /// Port translation rules, replacing the existing set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_translators: Option<Vec<PortTranslator>>,
}

/// API client permission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionsGroup {
    /// Full account access.
    Full,
    /// Orbit storage access only.
    Storage,
}

/// Accepted [`PermissionsGroup`] labels.
pub const PERMISSIONS_GROUPS: &[&str] = &["full", "storage"];

impl PermissionsGroup {
    /// Returns the API label for this group.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Storage => "storage",
        }
    }
}

impl FromStr for PermissionsGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "storage" => Ok(Self::Storage),
            other => Err(format!("invalid permissions group: {other}")),
        }
    }
}

/// An API client snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiClient {
    /// API client identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Shared secret; only returned on create.
    #[serde(default)]
    pub secret: String,
    /// Permission scope.
    pub permissions_group: PermissionsGroup,
    /// Owning account.
    #[serde(default)]
    pub account: Option<ResourceRef>,
    /// When the client was revoked, if it was.
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Options for creating or updating an API client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiClientOptions {
    /// API client to update; empty on create.
    #[serde(skip)]
    pub id: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Permission scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_group: Option<PermissionsGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse() {
        assert_eq!(
            Target::parse("srv-001"),
            Some(Target::Server(String::from("srv-001")))
        );
        assert_eq!(
            Target::parse("grp-abc12"),
            Some(Target::ServerGroup(String::from("grp-abc12")))
        );
        assert_eq!(Target::parse("cip-12345"), None);
        assert_eq!(Target::parse("srv-"), None);
        assert_eq!(Target::parse("server"), None);
    }

    #[test]
    fn test_last_populated_target_wins() {
        let cip = CloudIp {
            server: Some(ResourceRef::new("srv-001")),
            interface: Some(ResourceRef::new("int-001")),
            ..CloudIp::default()
        };
        assert_eq!(cip.target(), Some(Target::Interface(String::from("int-001"))));
        assert_eq!(CloudIp::default().target(), None);
    }

    #[test]
    fn test_cloud_ip_from_json() {
        let json = r#"{
            "id": "cip-k4a25",
            "status": "mapped",
            "mode": "nat",
            "public_ip": "109.107.37.180",
            "public_ipv4": "109.107.37.180",
            "fqdn": "cip-k4a25.gb1.brightbox.com",
            "server": {"id": "srv-lv426"},
            "load_balancer": null,
            "port_translators": [{"incoming": 443, "outgoing": 8443, "protocol": "tcp"}]
        }"#;

        let cip: CloudIp = serde_json::from_str(json).unwrap();
        assert_eq!(cip.status, CloudIpStatus::Mapped);
        assert_eq!(cip.mode, Some(Mode::Nat));
        assert_eq!(cip.target().as_ref().map(Target::id), Some("srv-lv426"));
        assert_eq!(cip.port_translators[0].protocol, TransportProtocol::Tcp);
    }

    #[test]
    fn test_unknown_status_label() {
        let cip: CloudIp = serde_json::from_str(r#"{"id": "cip-1", "status": "reserved"}"#).unwrap();
        assert_eq!(cip.status, CloudIpStatus::Unknown);
    }

    #[test]
    fn test_options_skip_unset_fields() {
        let opts = CloudIpOptions {
            id: String::from("cip-1"),
            name: Some(String::from("web")),
            ..CloudIpOptions::default()
        };
        assert_eq!(serde_json::to_string(&opts).unwrap(), r#"{"name":"web"}"#);
    }
}

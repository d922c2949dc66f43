//! Cloud IP resource.
//!
//! The generic lifecycle handles the Cloud IP itself; [`mapping`] layers the
//! attach and detach steps for its target on top.

pub mod mapping;

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use tracing::debug;

use crate::api::{
    ApiFuture, CloudApi, CloudIp, CloudIpOptions, MODES, PortTranslator, TRANSPORT_PROTOCOLS,
    Target, TransportProtocol,
};
use crate::diag::Diagnostics;
use crate::error::FieldError;
use crate::lifecycle::{Descriptor, never_absent};
use crate::schema::{
    FieldKind, FieldSchema, FieldSet, PORT_NUMBER, ResourceData, ResourceSchema, SetElement,
    SetSchema, Timeouts, Value, assign_enum, assign_set, assign_string, field_diagnostic,
};

pub use mapping::{create_and_assign, unassign_and_delete, update_and_remap};

/// Fields whose change requires an update call.
pub const UPDATEABLE_FIELDS: &[&str] = &["name", "mode", "reverse_dns", "port_translator"];

static PORT_TRANSLATOR_FIELDS: [FieldSchema; 3] = [
    FieldSchema::required("incoming", PORT_NUMBER).describe("Incoming Port"),
    FieldSchema::required("outgoing", PORT_NUMBER).describe("Outgoing Port"),
    FieldSchema::required("protocol", FieldKind::Enum(TRANSPORT_PROTOCOLS))
        .describe("Transport protocol to port translate (tcp/udp)"),
];

static PORT_TRANSLATOR: SetSchema = SetSchema {
    fields: &PORT_TRANSLATOR_FIELDS,
    hash: port_translator_hash,
};

static FIELDS: [FieldSchema; 10] = [
    FieldSchema::computed("fqdn", FieldKind::String)
        .describe("Full Domain name entry for the Cloud IP"),
    FieldSchema::optional("mode", FieldKind::Enum(MODES))
        .describe("Type of Cloud IP required (nat/route)"),
    FieldSchema::optional("name", FieldKind::String).describe("Name assigned to the Cloud IP"),
    FieldSchema::optional("port_translator", FieldKind::Set(&PORT_TRANSLATOR))
        .describe("Array of Port Translators"),
    FieldSchema::computed("public_ip", FieldKind::String).describe("Old alias of the IPv4 address"),
    FieldSchema::computed("public_ipv4", FieldKind::String).describe("IPv4 address"),
    FieldSchema::computed("public_ipv6", FieldKind::String).describe("IPv6 address"),
    FieldSchema::optional_computed("reverse_dns", FieldKind::String)
        .describe("Reverse DNS entry for the Cloud IP")
        .validated(validate_dns_name),
    FieldSchema::computed("status", FieldKind::String).describe("Current state of the Cloud IP"),
    FieldSchema::optional("target", FieldKind::String)
        .describe("The object this Cloud IP maps to")
        .validated(validate_target),
];

/// Attribute table for Cloud IPs.
pub static SCHEMA: ResourceSchema = ResourceSchema {
    label: "Cloud IP",
    fields: &FIELDS,
    timeouts: Timeouts::standard(),
};

/// Lifecycle binding for Cloud IPs.
pub static DESCRIPTOR: Descriptor<CloudIp, CloudIpOptions> = Descriptor {
    label: "Cloud IP",
    create: create_call,
    read: read_call,
    update: update_call,
    delete: delete_call,
    options_from_id: cloud_ip_from_id,
    add_options: add_updateable_options,
    set_attributes: set_cloud_ip_attributes,
    resource_id: cloud_ip_id,
    is_absent: never_absent,
};

fn create_call<'a>(api: &'a dyn CloudApi, opts: &'a CloudIpOptions) -> ApiFuture<'a, CloudIp> {
    api.create_cloud_ip(opts)
}

fn read_call<'a>(api: &'a dyn CloudApi, id: &'a str) -> ApiFuture<'a, CloudIp> {
    api.cloud_ip(id)
}

fn update_call<'a>(api: &'a dyn CloudApi, opts: &'a CloudIpOptions) -> ApiFuture<'a, CloudIp> {
    api.update_cloud_ip(opts)
}

fn delete_call<'a>(api: &'a dyn CloudApi, id: &'a str) -> ApiFuture<'a, ()> {
    api.destroy_cloud_ip(id)
}

fn cloud_ip_from_id(id: &str) -> CloudIpOptions {
    CloudIpOptions {
        id: id.to_string(),
        ..CloudIpOptions::default()
    }
}

fn cloud_ip_id(cip: &CloudIp) -> &str {
    &cip.id
}

/// Identity hash of a port translator member.
///
/// Members that agree on incoming port, protocol and outgoing port hash
/// equally, whatever case the protocol was declared in.
#[must_use]
pub fn port_translator_hash(element: &SetElement) -> u32 {
    let int = |name: &str| element.get(name).and_then(Value::as_int).unwrap_or_default();
    let protocol = element
        .get("protocol")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    let key = format!("{}-{protocol}-{}-", int("incoming"), int("outgoing"));

    let digest = Sha256::digest(key.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn port_translator_element(pt: &PortTranslator) -> SetElement {
    let mut element = SetElement::new();
    element.insert(String::from("incoming"), Value::from(pt.incoming));
    element.insert(String::from("outgoing"), Value::from(pt.outgoing));
    element.insert(String::from("protocol"), Value::from(pt.protocol.as_str()));
    element
}

fn expand_port_translator(element: &SetElement) -> Result<PortTranslator, FieldError> {
    let port = |name: &str| {
        element
            .get(name)
            .and_then(Value::as_int)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| FieldError::invalid("port_translator", format!("invalid {name} port")))
    };
    let protocol = element
        .get("protocol")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .parse::<TransportProtocol>()
        .map_err(|e| FieldError::invalid("port_translator", e))?;

    Ok(PortTranslator {
        incoming: port("incoming")?,
        outgoing: port("outgoing")?,
        protocol,
    })
}

/// Converts port translators into their set representation.
#[must_use]
pub fn port_translator_set(translators: &[PortTranslator]) -> FieldSet {
    let mut set = FieldSet::new();
    for pt in translators {
        let element = port_translator_element(pt);
        set.insert(port_translator_hash(&element), element);
    }
    set
}

fn add_updateable_options(d: &ResourceData, opts: &mut CloudIpOptions) -> Diagnostics {
    let mut diags = assign_enum(d, &mut opts.mode, "mode");
    assign_string(d, &mut opts.name, "name");
    assign_string(d, &mut opts.reverse_dns, "reverse_dns");
    diags.append(assign_set(
        d,
        &mut opts.port_translators,
        "port_translator",
        expand_port_translator,
    ));
    diags
}

fn set_cloud_ip_attributes(d: &mut ResourceData, cip: &CloudIp) -> Diagnostics {
    let mut diags = Diagnostics::new();

    d.set_id(cip.id.as_str());

    let target = cip.target();
    let strings = [
        ("name", cip.name.as_str()),
        ("public_ip", cip.public_ip.as_str()),
        ("public_ipv4", cip.public_ipv4.as_str()),
        ("public_ipv6", cip.public_ipv6.as_str()),
        ("status", cip.status.as_str()),
        ("reverse_dns", cip.reverse_dns.as_str()),
        ("fqdn", cip.fqdn.as_str()),
        ("target", target.as_ref().map_or("", |t| t.id())),
    ];
    for (name, value) in strings {
        if let Err(err) = d.set(name, value) {
            diags.push(field_diagnostic(&err));
        }
    }

    if let Some(mode) = cip.mode {
        if let Err(err) = d.set("mode", mode.as_str()) {
            diags.push(field_diagnostic(&err));
        }
    }

    debug!("PortTranslator details are {:?}", cip.port_translators);
    if let Err(err) = d.set("port_translator", port_translator_set(&cip.port_translators)) {
        diags.push(field_diagnostic(&err));
    }

    diags
}

/// Dot-separated labels of letters, digits and inner hyphens, with an
/// optional trailing dot.
static DNS_NAME: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.?$",
    )
});

/// Longest name accepted, trailing dot included.
const MAX_DNS_NAME_LEN: usize = 254;

fn validate_dns_name(name: &str) -> Result<(), String> {
    let pattern = DNS_NAME
        .as_ref()
        .map_err(|e| format!("DNS name pattern failed to compile: {e}"))?;
    if name.len() <= MAX_DNS_NAME_LEN && pattern.is_match(name) {
        Ok(())
    } else {
        Err(String::from("must be a valid DNS name"))
    }
}

/// An empty target is accepted and detaches the Cloud IP.
///
/// Servers are mapped through one of their interfaces. The API reports both
/// the server and the interface for such a mapping and the interface wins on
/// read, so a declared `srv-` ID would never match what is read back.
fn validate_target(target: &str) -> Result<(), String> {
    if target.is_empty() {
        return Ok(());
    }
    match Target::parse(target) {
        Some(Target::Server(_)) | None => Err(String::from(
            "must be a valid server interface, load balancer, database server or server group ID",
        )),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CloudIpStatus, Mode, ResourceRef};
    use crate::lifecycle::update_options;
    use crate::schema::{Attributes, InstanceState, declared_attributes};

    fn element(incoming: i64, protocol: &str, outgoing: i64) -> SetElement {
        let mut element = SetElement::new();
        element.insert(String::from("incoming"), Value::Int(incoming));
        element.insert(String::from("outgoing"), Value::Int(outgoing));
        element.insert(String::from("protocol"), Value::from(protocol));
        element
    }

    #[test]
    fn test_port_translator_hash_ignores_protocol_case() {
        assert_eq!(
            port_translator_hash(&element(80, "TCP", 8080)),
            port_translator_hash(&element(80, "tcp", 8080))
        );
        assert_ne!(
            port_translator_hash(&element(80, "tcp", 8080)),
            port_translator_hash(&element(8080, "tcp", 80))
        );
        assert_ne!(
            port_translator_hash(&element(80, "tcp", 8080)),
            port_translator_hash(&element(80, "udp", 8080))
        );
    }

    #[test]
    fn test_declared_port_translators_match_remote_set() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            "port_translator:\n  - { incoming: 443, outgoing: 8443, protocol: tcp }\n  - { incoming: 53, outgoing: 5353, protocol: udp }\n",
        )
        .unwrap();
        let (declared, diags) = declared_attributes(&SCHEMA, &yaml);
        assert!(diags.is_empty(), "{diags}");

        let remote = port_translator_set(&[
            PortTranslator {
                incoming: 53,
                outgoing: 5353,
                protocol: TransportProtocol::Udp,
            },
            PortTranslator {
                incoming: 443,
                outgoing: 8443,
                protocol: TransportProtocol::Tcp,
            },
        ]);
        assert_eq!(declared["port_translator"], Value::Set(remote));
    }

    #[test]
    fn test_validators() {
        assert!(validate_dns_name("www.example.com").is_ok());
        assert!(validate_dns_name("www.example.com.").is_ok());
        assert!(validate_dns_name("bad name.example.com").is_err());
        assert!(validate_dns_name("-bad.example.com").is_err());
        assert!(validate_dns_name("bad-.example.com").is_err());
        assert!(validate_dns_name("a..example.com").is_err());
        assert!(validate_dns_name(&format!("{}.com", "a".repeat(64))).is_err());
        assert!(validate_dns_name(&format!("{}.com", "a".repeat(63))).is_ok());
        assert!(validate_dns_name("").is_err());

        assert!(validate_target("int-001").is_ok());
        assert!(validate_target("srv-001").is_err());
        assert!(validate_target("lba-12345").is_ok());
        assert!(validate_target("cip-12345").is_err());
    }

    #[test]
    fn test_set_attributes_clears_missing_target() {
        let state = InstanceState {
            id: String::from("cip-k4a25"),
            attributes: [(String::from("target"), Value::from("srv-001"))].into(),
        };
        let mut d = ResourceData::from_state(&SCHEMA, state);
        let cip = CloudIp {
            id: String::from("cip-k4a25"),
            status: CloudIpStatus::Unmapped,
            ..CloudIp::default()
        };

        let diags = set_cloud_ip_attributes(&mut d, &cip);

        assert!(diags.is_empty(), "{diags}");
        assert_eq!(d.get_str("target"), "");
        assert_eq!(d.get_str("status"), "unmapped");
    }

    #[test]
    fn test_set_attributes_prefers_interface_over_server() {
        let mut d = ResourceData::new(&SCHEMA);
        let cip = CloudIp {
            id: String::from("cip-k4a25"),
            status: CloudIpStatus::Mapped,
            mode: Some(Mode::Nat),
            server: Some(ResourceRef::new("srv-lv426")),
            interface: Some(ResourceRef::new("int-ds42k")),
            ..CloudIp::default()
        };

        let diags = set_cloud_ip_attributes(&mut d, &cip);

        assert!(diags.is_empty(), "{diags}");
        assert_eq!(d.id(), "cip-k4a25");
        assert_eq!(d.get_str("target"), "int-ds42k");
        assert_eq!(d.get_str("mode"), "nat");
    }

    #[test]
    fn test_update_options_carry_only_changes() {
        let prior: Attributes = [
            (String::from("name"), Value::from("web")),
            (String::from("mode"), Value::from("nat")),
            (String::from("reverse_dns"), Value::from("web.example.com")),
        ]
        .into();
        let config: Attributes = [
            (String::from("name"), Value::from("web")),
            (String::from("mode"), Value::from("route")),
        ]
        .into();
        let d = ResourceData::from_state(
            &SCHEMA,
            InstanceState {
                id: String::from("cip-k4a25"),
                attributes: prior,
            },
        )
        .with_config(config);

        let (options, diags) = update_options(&DESCRIPTOR, &d);

        assert!(diags.is_empty());
        assert_eq!(
            options,
            CloudIpOptions {
                id: String::from("cip-k4a25"),
                mode: Some(Mode::Route),
                ..CloudIpOptions::default()
            }
        );
    }
}

//! Provider-shaped records returned by the CloudStack API.
//!
//! Field names follow the provider's JSON keys, which are lower-case
//! concatenations (`displayname`, `zonename`, `ipaddress`).

use serde::{Deserialize, Serialize};

use crate::cloudstack::types::{ServerId, ZoneId};

/// Availability zone.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Zone {
    /// Zone identifier.
    pub id: ZoneId,
    /// Human readable zone name.
    pub name: String,
}

/// Administrative domain. Domains own accounts and act as the tenant of a
/// server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Domain {
    /// Domain identifier.
    pub id: String,
    /// Domain name.
    pub name: String,
}

/// Hypervisor type available in the cloud (for example `KVM`).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Hypervisor {
    /// Hypervisor name.
    pub name: String,
}

/// Guest network a server can attach to.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Network {
    /// Network identifier.
    pub id: String,
    /// Network name.
    pub name: String,
    /// Zone hosting the network.
    #[serde(default, rename = "zoneid")]
    pub zone_id: Option<ZoneId>,
}

/// Bootable image: a template or an ISO. Both share the same shape.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Image {
    /// Image identifier.
    pub id: String,
    /// Image name.
    pub name: String,
    /// Zone the image is registered in.
    #[serde(default, rename = "zoneid")]
    pub zone_id: Option<ZoneId>,
    /// Name of the zone the image is registered in.
    #[serde(default, rename = "zonename")]
    pub zone_name: String,
}

/// Compute offering (flavor) describing CPU and memory.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Flavor {
    /// Offering identifier.
    pub id: String,
    /// Offering name.
    pub name: String,
    /// Number of virtual CPUs.
    #[serde(default, rename = "cpunumber")]
    pub cpu_count: Option<u32>,
    /// Memory in megabytes.
    #[serde(default)]
    pub memory: Option<u64>,
}

/// Disk offering available for data volumes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiskOffering {
    /// Offering identifier.
    pub id: String,
    /// Offering name.
    pub name: String,
    /// Size in gigabytes. Custom offerings report zero or nothing.
    #[serde(default, rename = "disksize")]
    pub disk_size_gb: Option<u64>,
    /// The caller chooses the size when attaching a volume.
    #[serde(default, rename = "iscustomized")]
    pub custom: bool,
}

/// Network interface attached to a server.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Nic {
    /// Interface identifier.
    #[serde(default)]
    pub id: String,
    /// IPv4 address bound to the interface.
    #[serde(default, rename = "ipaddress")]
    pub ip_address: Option<String>,
    /// Hardware address of the interface.
    #[serde(default, rename = "macaddress")]
    pub mac_address: Option<String>,
    /// Network the interface belongs to.
    #[serde(default, rename = "networkid")]
    pub network_id: Option<String>,
    /// Name of the network the interface belongs to.
    #[serde(default, rename = "networkname")]
    pub network_name: Option<String>,
    /// Whether this is the server's default interface.
    #[serde(default, rename = "isdefault")]
    pub is_default: bool,
}

/// Security group associated with a server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SecurityGroup {
    /// Security group identifier.
    #[serde(default)]
    pub id: String,
    /// Security group name.
    pub name: String,
}

/// Virtual machine as reported by `listVirtualMachines`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Server {
    /// Provider identifier. Blank for drafts that were never submitted.
    #[serde(default)]
    pub id: ServerId,
    /// Host name.
    #[serde(default)]
    pub name: String,
    /// Display name shown in the provider console.
    #[serde(default, rename = "displayname")]
    pub display_name: Option<String>,
    /// Raw provider state (`Running`, `Stopped`, ...).
    #[serde(default)]
    pub state: String,
    /// Attached network interfaces. Empty until provisioning attaches one.
    #[serde(default, rename = "nic")]
    pub nics: Vec<Nic>,
    /// Domain (tenant) owning the server.
    #[serde(default, rename = "domainid")]
    pub tenant_id: Option<String>,
    /// Compute offering (flavor) of the server.
    #[serde(default, rename = "serviceofferingid")]
    pub flavor_id: Option<String>,
    /// Zone hosting the server.
    #[serde(default, rename = "zoneid")]
    pub zone_id: Option<ZoneId>,
    /// Creation timestamp as sent by the provider.
    #[serde(default)]
    pub created: Option<String>,
    /// Public (static NAT / floating) address, when one is assigned.
    #[serde(default, rename = "publicip")]
    pub public_ip: Option<String>,
    /// Security groups the server belongs to.
    #[serde(default, rename = "securitygroup")]
    pub security_groups: Vec<SecurityGroup>,
    /// Template the server was deployed from.
    #[serde(default, rename = "templateid")]
    pub template_id: Option<String>,
    /// Network picked in a form that has not been submitted yet.
    #[serde(skip)]
    pub(crate) pending_network: Option<String>,
    /// Security group picked in a form that has not been submitted yet.
    #[serde(skip)]
    pub(crate) pending_security_group: Option<String>,
}

/// Lifecycle state reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerState {
    /// The server is running.
    Running,
    /// The server is paused.
    Paused,
    /// The server is stopped.
    Stopped,
    /// The server is suspended.
    Suspended,
    /// The server is still being created or started.
    Provisioning,
    /// The provider reports an error state.
    Error,
    /// Any state this connector does not model.
    Other(String),
}

impl ServerState {
    /// Parses a provider state string, ignoring case.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "paused" => Self::Paused,
            "stopped" | "stopping" => Self::Stopped,
            "suspended" => Self::Suspended,
            "starting" | "creating" | "provisioning" => Self::Provisioning,
            "error" => Self::Error,
            _ => Self::Other(raw.to_owned()),
        }
    }
}

/// Reply to `deployVirtualMachine`: the id is allocated immediately, the job
/// finishes asynchronously.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CreatedServer {
    /// Identifier of the allocated server.
    pub id: ServerId,
    /// Asynchronous job tracking the deployment.
    #[serde(default, rename = "jobid")]
    pub job_id: Option<String>,
}

/// SSH key pair returned by `createSSHKeyPair`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SshKeyPair {
    /// Key pair name registered with the provider.
    pub name: String,
    /// Key fingerprint.
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// PEM encoded private key. Only returned at creation time.
    #[serde(rename = "privatekey")]
    pub private_key: String,
}

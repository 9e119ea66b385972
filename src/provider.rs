//! Capability-typed abstraction over the CloudStack management API.
//!
//! The lifecycle and discovery code only talks to [`ComputeApi`]. The HTTP
//! transport in [`crate::cloudstack::CloudstackClient`] is one implementation;
//! tests plug in scripted doubles.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::cloudstack::CloudstackError;
use crate::cloudstack::endpoint::Endpoint;
use crate::model::{
    CreatedServer, DiskOffering, Domain, Flavor, Hypervisor, Image, Network, Server, SshKeyPair,
    Zone,
};

/// Future returned by provider operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CloudstackError>> + Send + 'a>>;

/// Power actions a server accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerAction {
    /// Suspend a running server.
    Suspend,
    /// Resume a suspended or stopped server.
    Resume,
    /// Pause a running server.
    Pause,
    /// Unpause a paused server.
    Unpause,
    /// Reboot; `hard` forces a power cycle.
    Reboot {
        /// Whether to force the reboot.
        hard: bool,
    },
}

impl ServerAction {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::Reboot { hard: true } => "hard reboot",
            Self::Reboot { hard: false } => "reboot",
        }
    }
}

/// Credentials paired with an [`Endpoint`].
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    /// API key (the connection's user).
    pub api_key: String,
    /// Secret key used to sign requests (the connection's password).
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Parameters for `deployVirtualMachine`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerRequest {
    /// Provider host name (no dots).
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Target zone.
    pub zone_id: String,
    /// Template or ISO to boot.
    pub image_id: String,
    /// Compute offering.
    pub flavor_id: String,
    /// Networks to attach; empty lets the provider pick its default.
    pub network_ids: Vec<String>,
    /// Security groups; always empty for servers created by this connector.
    pub security_group_ids: Vec<String>,
    /// SSH key pair to install.
    pub key_pair: Option<String>,
    /// Hypervisor to place the server on.
    pub hypervisor: Option<String>,
    /// Additional raw API parameters.
    pub extra: BTreeMap<String, String>,
}

impl ServerRequest {
    /// Starts a builder for a [`ServerRequest`].
    #[must_use]
    pub fn builder() -> ServerRequestBuilder {
        ServerRequestBuilder::default()
    }

    /// Validates the request, returning the first missing field.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Validation`] when a required field is empty.
    pub fn validate(&self) -> Result<(), CloudstackError> {
        let required = [
            ("name", &self.name),
            ("zone_id", &self.zone_id),
            ("image_id", &self.image_id),
            ("flavor_id", &self.flavor_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CloudstackError::Validation(field.to_owned()));
            }
        }
        Ok(())
    }

    /// Flattens the request into API parameters.
    #[must_use]
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: BTreeMap<String, String> = self.extra.clone();
        params.insert(String::from("name"), self.name.clone());
        params.insert(String::from("displayname"), self.display_name.clone());
        params.insert(String::from("zoneid"), self.zone_id.clone());
        params.insert(String::from("templateid"), self.image_id.clone());
        params.insert(String::from("serviceofferingid"), self.flavor_id.clone());
        if !self.network_ids.is_empty() {
            params.insert(String::from("networkids"), self.network_ids.join(","));
        }
        if !self.security_group_ids.is_empty() {
            params.insert(
                String::from("securitygroupids"),
                self.security_group_ids.join(","),
            );
        }
        if let Some(key_pair) = &self.key_pair {
            params.insert(String::from("keypair"), key_pair.clone());
        }
        if let Some(hypervisor) = &self.hypervisor {
            params.insert(String::from("hypervisor"), hypervisor.clone());
        }
        params.into_iter().collect()
    }
}

/// Builder for [`ServerRequest`] that trims inputs and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerRequestBuilder {
    request: ServerRequest,
}

impl ServerRequestBuilder {
    /// Sets both the provider name and the display name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        let name = value.into().trim().to_owned();
        self.request.display_name.clone_from(&name);
        self.request.name = name;
        self
    }

    /// Sets the zone.
    #[must_use]
    pub fn zone_id(mut self, value: impl Into<String>) -> Self {
        self.request.zone_id = value.into().trim().to_owned();
        self
    }

    /// Sets the template or ISO.
    #[must_use]
    pub fn image_id(mut self, value: impl Into<String>) -> Self {
        self.request.image_id = value.into().trim().to_owned();
        self
    }

    /// Sets the compute offering.
    #[must_use]
    pub fn flavor_id(mut self, value: impl Into<String>) -> Self {
        self.request.flavor_id = value.into().trim().to_owned();
        self
    }

    /// Attaches a network.
    #[must_use]
    pub fn network_id(mut self, value: impl Into<String>) -> Self {
        self.request.network_ids.push(value.into().trim().to_owned());
        self
    }

    /// Sets the key pair.
    #[must_use]
    pub fn key_pair(mut self, value: Option<String>) -> Self {
        self.request.key_pair = value;
        self
    }

    /// Sets the hypervisor.
    #[must_use]
    pub fn hypervisor(mut self, value: Option<String>) -> Self {
        self.request.hypervisor = value;
        self
    }

    /// Adds a raw API parameter.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.extra.insert(key.into(), value.into());
        self
    }

    /// Builds and validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Validation`] when a required field is empty.
    pub fn build(self) -> Result<ServerRequest, CloudstackError> {
        self.request.validate()?;
        Ok(self.request)
    }
}

/// Values every create starts from before caller options are applied.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchDefaults {
    /// Key pair bound to the connection.
    pub key_pair: Option<String>,
    /// Raw API parameters applied to every create.
    pub extra: BTreeMap<String, String>,
}

impl LaunchDefaults {
    /// Defaults that install the given key pair.
    #[must_use]
    pub fn with_key_pair(name: impl Into<String>) -> Self {
        Self {
            key_pair: Some(name.into()),
            extra: BTreeMap::new(),
        }
    }
}

/// Minimal interface over the CloudStack API used by this crate.
///
/// Implementations decode the provider envelopes; callers only see typed
/// records.
pub trait ComputeApi: Send + Sync {
    /// Lists zones.
    fn list_zones(&self) -> ApiFuture<'_, Vec<Zone>>;

    /// Lists domains.
    fn list_domains(&self) -> ApiFuture<'_, Vec<Domain>>;

    /// Lists hypervisor types.
    fn list_hypervisors(&self) -> ApiFuture<'_, Vec<Hypervisor>>;

    /// Lists guest networks.
    fn list_networks(&self) -> ApiFuture<'_, Vec<Network>>;

    /// Lists templates owned by the caller.
    fn list_templates(&self) -> ApiFuture<'_, Vec<Image>>;

    /// Lists ISOs.
    fn list_isos(&self) -> ApiFuture<'_, Vec<Image>>;

    /// Lists compute offerings.
    fn list_flavors(&self) -> ApiFuture<'_, Vec<Flavor>>;

    /// Lists disk offerings.
    fn list_disk_offerings(&self) -> ApiFuture<'_, Vec<DiskOffering>>;

    /// Submits a server deployment and returns the allocated id.
    fn create_server<'a>(&'a self, request: &'a ServerRequest) -> ApiFuture<'a, CreatedServer>;

    /// Destroys a server. Returns [`CloudstackError::NotFound`] when the
    /// provider no longer knows the id.
    fn destroy_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()>;

    /// Applies a power action to a server.
    fn server_action<'a>(&'a self, id: &'a str, action: ServerAction) -> ApiFuture<'a, ()>;

    /// Requests a remote console session for a server.
    fn console<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Map<String, Value>>;

    /// Creates an SSH key pair.
    fn create_ssh_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, SshKeyPair>;

    /// Deletes an SSH key pair by name.
    fn delete_ssh_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;

    /// Looks up a server by id, returning `None` when it does not exist.
    fn find_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Option<Server>>;
}

/// Builds a fresh API handle for every access.
pub trait ClientFactory: Send + Sync {
    /// Client type produced by the factory.
    type Client: ComputeApi;

    /// Produces a client bound to `endpoint` and `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Configuration`] when the client cannot be
    /// constructed from the inputs.
    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Self::Client, CloudstackError>;
}

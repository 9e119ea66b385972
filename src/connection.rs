//! The persisted connection record for one CloudStack endpoint.

use std::collections::BTreeMap;
use std::fmt;

use crate::cloudstack::CloudstackError;
use crate::cloudstack::endpoint::Endpoint;
use crate::cloudstack::types::ZoneId;
use crate::provider::Credentials;

/// Attribute name the platform reads the image reference from.
pub const IMAGE_PARAM_NAME: &str = "image_ref";

/// Name shown to operators for this provider.
pub const PROVIDER_FRIENDLY_NAME: &str = "CloudStack";

/// Optional features a connection supports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Capability {
    /// Servers are built from templates or ISOs.
    Image,
}

impl Capability {
    /// Lower-case name of the capability.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
        }
    }
}

/// Mapping from platform host attributes to server accessors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProvidedAttributes {
    /// Accessor providing the host IP.
    pub ip: &'static str,
    /// Accessor providing the host MAC.
    pub mac: &'static str,
}

const PROVIDED_ATTRIBUTES: ProvidedAttributes = ProvidedAttributes {
    ip: "ip_address",
    mac: "mac_address",
};

/// Validation failures, keyed by field, plus record-wide messages.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationErrors {
    /// Messages attached to a single field.
    pub fields: BTreeMap<String, Vec<String>>,
    /// Messages that concern the record as a whole.
    pub base: Vec<String>,
}

impl ValidationErrors {
    /// Records a message against `field`.
    pub fn add_field(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    /// Records a record-wide message.
    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base.push(message.into());
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.base.is_empty()
    }

    /// Messages attached to `field`.
    #[must_use]
    pub fn on(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }

    /// Every message, field messages prefixed with the field name.
    #[must_use]
    pub fn full_messages(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |message| format!("{field} {message}"))
            })
            .chain(self.base.iter().cloned())
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join("; "))
    }
}

/// Configuration for one provider endpoint plus its credentials.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct ConnectionRecord {
    /// Platform identifier of the record. Key pair names embed it.
    pub id: u64,
    /// Management API URL, `scheme://host:port/path`.
    pub url: String,
    /// API key.
    pub user: String,
    /// Secret key.
    pub password: String,
    /// Zone new servers are placed in.
    pub zone_id: Option<ZoneId>,
    /// Hypervisor new servers are placed on.
    pub hypervisor: Option<String>,
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("zone_id", &self.zone_id)
            .field("hypervisor", &self.hypervisor)
            .finish()
    }
}

impl ConnectionRecord {
    /// Creates a record without zone or hypervisor selection.
    #[must_use]
    pub fn new(
        id: u64,
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            user: user.into(),
            password: password.into(),
            zone_id: None,
            hypervisor: None,
        }
    }

    /// Returns `true` when URL, user and password are all present. Discovery
    /// returns nothing for unconfigured records.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        [&self.url, &self.user, &self.password]
            .iter()
            .all(|value| !value.trim().is_empty())
    }

    /// Field-level validation of the mandatory attributes.
    ///
    /// # Errors
    ///
    /// Returns the collected [`ValidationErrors`] when a mandatory field is
    /// blank or the URL is malformed.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for (field, value) in [
            ("url", &self.url),
            ("user", &self.user),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                errors.add_field(field, "can't be blank");
            }
        }
        if !self.url.trim().is_empty() && Endpoint::parse(&self.url).is_err() {
            errors.add_field("url", "must look like http(s)://host:port/path");
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Selects the zone for new servers. Blank values clear the selection.
    pub fn set_zone(&mut self, zone: Option<impl Into<ZoneId>>) {
        self.zone_id = zone.map(Into::into).filter(|zone| !zone.is_blank());
    }

    /// Selects the hypervisor for new servers. Blank values clear the
    /// selection.
    pub fn set_hypervisor(&mut self, hypervisor: Option<impl Into<String>>) {
        self.hypervisor = hypervisor
            .map(Into::into)
            .filter(|name| !name.trim().is_empty());
    }

    /// Parses the URL.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Configuration`] when the URL is malformed.
    pub fn endpoint(&self) -> Result<Endpoint, CloudstackError> {
        Endpoint::parse(&self.url)
    }

    /// Credentials used to sign requests.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.user.clone(),
            secret_key: self.password.clone(),
        }
    }

    /// Server accessors backing the platform's host attributes.
    #[must_use]
    pub const fn provided_attributes(&self) -> ProvidedAttributes {
        PROVIDED_ATTRIBUTES
    }

    /// Attribute name carrying the image reference.
    #[must_use]
    pub const fn image_param_name(&self) -> &'static str {
        IMAGE_PARAM_NAME
    }

    /// Features this connection supports.
    #[must_use]
    pub const fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Image]
    }

    /// Name shown to operators.
    #[must_use]
    pub const fn provider_friendly_name(&self) -> &'static str {
        PROVIDER_FRIENDLY_NAME
    }
}

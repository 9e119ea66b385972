//! Read-only discovery of provider resources.
//!
//! Listings return an empty result without calling the provider while the
//! record lacks a URL, user or password, so forms can render before the
//! record is complete.

use std::fmt;

use tracing::debug;

use super::types::ZoneId;
use super::{Cloudstack, CloudstackError};
use crate::connection::ValidationErrors;
use crate::model::{DiskOffering, Flavor, Image, Network};
use crate::provider::{ClientFactory, ComputeApi};

/// Identifier carried by menu section headers.
pub const HEADER_ID: &str = "-1";

/// Zone as offered in a selection list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZoneChoice {
    /// Zone identifier.
    pub id: ZoneId,
    /// Zone name.
    pub name: String,
}

/// Section of the image menu.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Section {
    /// Templates registered by the account.
    Templates,
    /// Bootable ISOs.
    Isos,
}

impl Section {
    /// Header label shown above the section.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Templates => "--- Templates ---",
            Self::Isos => "--- ISOs ---",
        }
    }
}

/// Entry of the combined template and ISO menu.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MenuEntry {
    /// Non-selectable section header.
    Header(Section),
    /// Selectable image.
    Choice {
        /// Image identifier.
        id: String,
        /// `"<name> (<zone name>)"`.
        name: String,
    },
}

impl MenuEntry {
    /// Identifier submitted for the entry; headers use [`HEADER_ID`].
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Header(_) => HEADER_ID,
            Self::Choice { id, .. } => id,
        }
    }

    /// Text shown for the entry.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Header(section) => section.label(),
            Self::Choice { name, .. } => name,
        }
    }

    fn choice(image: Image) -> Self {
        Self::Choice {
            name: format!("{} ({})", image.name, image.zone_name),
            id: image.id,
        }
    }
}

impl fmt::Display for MenuEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of [`Cloudstack::test_connection`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectionTest {
    /// `true` only when no error of any kind was recorded.
    pub valid: bool,
    /// Field and record-wide errors.
    pub errors: ValidationErrors,
}

fn push_section(menu: &mut Vec<MenuEntry>, section: Section, images: Vec<Image>) {
    if images.is_empty() {
        return;
    }
    menu.push(MenuEntry::Header(section));
    menu.extend(images.into_iter().map(MenuEntry::choice));
}

impl<F: ClientFactory> Cloudstack<F> {
    /// Returns a client, or `None` while the record is incomplete.
    fn configured_client(&self) -> Result<Option<F::Client>, CloudstackError> {
        if !self.record.is_configured() {
            debug!(connection_id = self.record.id, "connection incomplete; skipping discovery");
            return Ok(None);
        }
        self.client().map(Some)
    }

    /// Zones visible to the account.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError`] when the URL is malformed or the provider
    /// call fails.
    pub async fn zones(&self) -> Result<Vec<ZoneChoice>, CloudstackError> {
        let Some(client) = self.configured_client()? else {
            return Ok(Vec::new());
        };
        let zones = client.list_zones().await?;
        Ok(zones
            .into_iter()
            .map(|zone| ZoneChoice {
                id: zone.id,
                name: zone.name,
            })
            .collect())
    }

    /// Id of the first zone the provider reports.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Cloudstack::zones`].
    pub async fn default_zone_id(&self) -> Result<Option<ZoneId>, CloudstackError> {
        Ok(self.zones().await?.into_iter().next().map(|zone| zone.id))
    }

    /// Domain names.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError`] when the URL is malformed or the provider
    /// call fails.
    pub async fn domains(&self) -> Result<Vec<String>, CloudstackError> {
        let Some(client) = self.configured_client()? else {
            return Ok(Vec::new());
        };
        let domains = client.list_domains().await?;
        Ok(domains.into_iter().map(|domain| domain.name).collect())
    }

    /// Hypervisor names.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError`] when the URL is malformed or the provider
    /// call fails.
    pub async fn hypervisors(&self) -> Result<Vec<String>, CloudstackError> {
        let Some(client) = self.configured_client()? else {
            return Ok(Vec::new());
        };
        let hypervisors = client.list_hypervisors().await?;
        Ok(hypervisors.into_iter().map(|hv| hv.name).collect())
    }

    /// Guest networks.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError`] when the URL is malformed or the provider
    /// call fails.
    pub async fn networks(&self) -> Result<Vec<Network>, CloudstackError> {
        let Some(client) = self.configured_client()? else {
            return Ok(Vec::new());
        };
        client.list_networks().await
    }

    /// Compute offerings.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError`] when the URL is malformed or the provider
    /// call fails.
    pub async fn flavors(&self) -> Result<Vec<Flavor>, CloudstackError> {
        let Some(client) = self.configured_client()? else {
            return Ok(Vec::new());
        };
        client.list_flavors().await
    }

    /// Disk offerings for data volumes.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError`] when the URL is malformed or the provider
    /// call fails.
    pub async fn disk_offerings(&self) -> Result<Vec<DiskOffering>, CloudstackError> {
        let Some(client) = self.configured_client()? else {
            return Ok(Vec::new());
        };
        client.list_disk_offerings().await
    }

    /// Templates followed by ISOs, each group introduced by a header when
    /// non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError`] when the URL is malformed or either
    /// provider call fails.
    pub async fn templates_isos(&self) -> Result<Vec<MenuEntry>, CloudstackError> {
        let Some(client) = self.configured_client()? else {
            return Ok(Vec::new());
        };
        let templates = client.list_templates().await?;
        let isos = client.list_isos().await?;

        let mut menu = Vec::with_capacity(templates.len() + isos.len() + 2);
        push_section(&mut menu, Section::Templates, templates);
        push_section(&mut menu, Section::Isos, isos);
        Ok(menu)
    }

    /// Resolves a flavor id to its name. Lookup failures resolve to `None`.
    pub async fn flavor_name(&self, flavor_ref: &str) -> Option<String> {
        match self.flavors().await {
            Ok(flavors) => flavors
                .into_iter()
                .find(|flavor| flavor.id == flavor_ref)
                .map(|flavor| flavor.name),
            Err(err) => {
                debug!(flavor = flavor_ref, error = %err, "flavor lookup failed");
                None
            }
        }
    }

    /// Checks the record's attributes and, when they are complete, lists
    /// zones to prove the credentials work.
    pub async fn test_connection(&self) -> ConnectionTest {
        let mut errors = self.record.validate().err().unwrap_or_default();
        if errors.is_empty()
            && let Err(err) = self.verify_credentials().await
        {
            errors.add_base(err.message());
        }
        ConnectionTest {
            valid: errors.is_empty(),
            errors,
        }
    }

    async fn verify_credentials(&self) -> Result<(), CloudstackError> {
        self.client()?.list_zones().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn image(id: &str, name: &str, zone: &str) -> Image {
        Image {
            id: id.to_owned(),
            name: name.to_owned(),
            zone_id: None,
            zone_name: zone.to_owned(),
        }
    }

    #[test]
    fn push_section_skips_empty_groups() {
        let mut menu = Vec::new();
        push_section(&mut menu, Section::Isos, Vec::new());
        assert!(menu.is_empty());
    }

    #[test]
    fn choice_names_include_zone() {
        let mut menu = Vec::new();
        push_section(&mut menu, Section::Templates, vec![image("t1", "Ubuntu", "zone-a")]);
        assert_eq!(menu.len(), 2);
        assert_eq!(menu.first().map(MenuEntry::id), Some(HEADER_ID));
        assert_eq!(
            menu.get(1),
            Some(&MenuEntry::Choice {
                id: String::from("t1"),
                name: String::from("Ubuntu (zone-a)"),
            })
        );
    }

    #[rstest]
    #[case(Section::Templates, "--- Templates ---")]
    #[case(Section::Isos, "--- ISOs ---")]
    fn headers_render_labels(#[case] section: Section, #[case] label: &str) {
        assert_eq!(MenuEntry::Header(section).to_string(), label);
    }
}

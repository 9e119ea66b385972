//! Server lifecycle for the CloudStack connector.

use std::collections::BTreeMap;

mod create;
mod power;
mod wait;

use super::CloudstackError;
use crate::model::Server;
use crate::provider::ComputeApi;

/// Caller supplied inputs for [`super::Cloudstack::create`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateArgs {
    /// Display name; the host name is derived from it.
    pub name: String,
    /// Template or ISO to boot.
    pub image_id: String,
    /// Compute offering.
    pub flavor_id: String,
    /// Network to attach.
    pub network_id: Option<String>,
    /// Fallback network used when `network_id` is absent.
    pub subnet_id: Option<String>,
    /// Security groups from the platform form. Never sent to the provider.
    pub security_group_ids: Vec<String>,
    /// Key pair overriding the connection default.
    pub key_pair: Option<String>,
    /// Raw API parameters overriding the connection defaults.
    pub extra: BTreeMap<String, String>,
}

impl CreateArgs {
    /// Arguments for a server named `name` built from `image_id` on
    /// `flavor_id`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        image_id: impl Into<String>,
        flavor_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image_id: image_id.into(),
            flavor_id: flavor_id.into(),
            ..Self::default()
        }
    }
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Cuts a display name at the first `.` that is followed by a word
/// character, so `web01.example.com` becomes `web01`.
#[must_use]
pub fn derive_host_name(display_name: &str) -> &str {
    let trimmed = display_name.trim();
    let cut = trimmed.char_indices().find_map(|(idx, ch)| {
        let next = trimmed.get(idx + ch.len_utf8()..)?.chars().next()?;
        (ch == '.' && is_word(next)).then_some(idx)
    });
    cut.and_then(|idx| trimmed.get(..idx)).unwrap_or(trimmed)
}

/// Looks up a server, turning absence into [`CloudstackError::NotFound`].
async fn require_server<C: ComputeApi>(client: &C, id: &str) -> Result<Server, CloudstackError> {
    client
        .find_server(id)
        .await?
        .ok_or_else(|| CloudstackError::NotFound {
            resource: String::from("server"),
            id: id.to_owned(),
        })
}

#[cfg(test)]
mod tests;

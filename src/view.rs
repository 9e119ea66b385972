//! Derived, read-only facts about a [`Server`].

use std::fmt;

use chrono::{DateTime, Utc};

use crate::model::{Domain, Flavor, Nic, Server, ServerState};

const PROVIDER_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%z";

impl Server {
    /// Address of the first network interface.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.nics.first().and_then(|nic| nic.ip_address.as_deref())
    }

    /// Addresses of all network interfaces, in order.
    #[must_use]
    pub fn ip_addresses(&self) -> Vec<&str> {
        self.nics
            .iter()
            .filter_map(|nic| nic.ip_address.as_deref())
            .collect()
    }

    /// Hardware address of the first network interface.
    #[must_use]
    pub fn mac_address(&self) -> Option<&str> {
        self.nics.first().and_then(|nic| nic.mac_address.as_deref())
    }

    /// Hardware addresses of all network interfaces, in order.
    #[must_use]
    pub fn mac_addresses(&self) -> Vec<&str> {
        self.nics
            .iter()
            .filter_map(|nic| nic.mac_address.as_deref())
            .collect()
    }

    /// Address of the default interface, falling back to the first one.
    #[must_use]
    pub fn private_ip_address(&self) -> Option<&str> {
        self.nics
            .iter()
            .find(|nic| nic.is_default)
            .or_else(|| self.nics.first())
            .and_then(|nic| nic.ip_address.as_deref())
    }

    /// Public (floating) address.
    #[must_use]
    pub fn floating_ip_address(&self) -> Option<&str> {
        self.public_ip.as_deref().filter(|ip| !ip.trim().is_empty())
    }

    /// Parsed provider state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        ServerState::from_provider(&self.state)
    }

    /// Returns `true` once the provider assigned an id.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.id.is_blank()
    }

    /// Domain owning the server, resolved from `domains`.
    #[must_use]
    pub fn tenant<'d>(&self, domains: &'d [Domain]) -> Option<&'d Domain> {
        let tenant_id = self.tenant_id.as_deref()?;
        domains.iter().find(|domain| domain.id == tenant_id)
    }

    /// Compute offering of the server, resolved from `flavors`.
    #[must_use]
    pub fn flavor<'f>(&self, flavors: &'f [Flavor]) -> Option<&'f Flavor> {
        let flavor_id = self.flavor_id.as_deref()?;
        flavors.iter().find(|flavor| flavor.id == flavor_id)
    }

    /// Creation time. CloudStack sends `2024-05-01T10:00:00+0000`; RFC 3339
    /// is accepted too.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, PROVIDER_TIMESTAMP))
            .ok()
            .map(|stamp| stamp.with_timezone(&Utc))
    }

    /// Network shown for the server: a pending selection, else the first
    /// interface's network. Drafts without a selection have none.
    #[must_use]
    pub fn network(&self) -> Option<&str> {
        if let Some(pending) = self.pending_network.as_deref() {
            return Some(pending);
        }
        if !self.is_persisted() {
            return None;
        }
        self.nics.first().and_then(Nic::network_label)
    }

    /// Security group shown for the server: a pending selection, else the
    /// first associated group. Drafts without a selection have none.
    #[must_use]
    pub fn security_group(&self) -> Option<&str> {
        if let Some(pending) = self.pending_security_group.as_deref() {
            return Some(pending);
        }
        if !self.is_persisted() {
            return None;
        }
        self.security_groups.first().map(|group| group.name.as_str())
    }

    /// Records a network selection that has not been submitted yet.
    pub fn select_network(&mut self, network: impl Into<String>) {
        self.pending_network = Some(network.into());
    }

    /// Records a security group selection that has not been submitted yet.
    pub fn select_security_group(&mut self, group: impl Into<String>) {
        self.pending_security_group = Some(group.into());
    }
}

impl Nic {
    fn network_label(&self) -> Option<&str> {
        self.network_name
            .as_deref()
            .or(self.network_id.as_deref())
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SecurityGroup;
    use rstest::{fixture, rstest};

    fn nic(ip: &str, mac: &str, default: bool) -> Nic {
        Nic {
            ip_address: Some(ip.to_owned()),
            mac_address: Some(mac.to_owned()),
            network_name: Some(String::from("guest")),
            is_default: default,
            ..Nic::default()
        }
    }

    #[fixture]
    fn server() -> Server {
        Server {
            id: "vm-1".into(),
            name: String::from("web01"),
            state: String::from("Running"),
            nics: vec![
                nic("10.0.0.5", "02:00:00:00:00:01", false),
                nic("10.0.1.5", "02:00:00:00:00:02", true),
            ],
            tenant_id: Some(String::from("dom-2")),
            flavor_id: Some(String::from("small")),
            created: Some(String::from("2024-05-01T10:00:00+0200")),
            security_groups: vec![SecurityGroup {
                id: String::from("sg-1"),
                name: String::from("default"),
            }],
            ..Server::default()
        }
    }

    #[rstest]
    fn addresses_come_from_nics(server: Server) {
        assert_eq!(server.ip_address(), Some("10.0.0.5"));
        assert_eq!(server.mac_address(), Some("02:00:00:00:00:01"));
        assert_eq!(server.ip_addresses(), ["10.0.0.5", "10.0.1.5"]);
        assert_eq!(server.mac_addresses().len(), 2);
        assert_eq!(server.private_ip_address(), Some("10.0.1.5"));
        assert_eq!(server.to_string(), "web01");
    }

    #[test]
    fn fresh_server_has_no_addresses() {
        let server = Server::default();
        assert_eq!(server.ip_address(), None);
        assert_eq!(server.mac_address(), None);
        assert!(server.ip_addresses().is_empty());
    }

    #[rstest]
    fn resolves_tenant_and_flavor(server: Server) {
        let domains = vec![
            Domain {
                id: String::from("dom-1"),
                name: String::from("ROOT"),
            },
            Domain {
                id: String::from("dom-2"),
                name: String::from("engineering"),
            },
        ];
        let flavors = vec![Flavor {
            id: String::from("small"),
            name: String::from("Small Instance"),
            cpu_count: Some(1),
            memory: Some(512),
        }];
        assert_eq!(
            server.tenant(&domains).map(|domain| domain.name.as_str()),
            Some("engineering")
        );
        assert_eq!(
            server.flavor(&flavors).map(|flavor| flavor.name.as_str()),
            Some("Small Instance")
        );
        assert!(server.flavor(&[]).is_none());
    }

    #[rstest]
    #[case("2024-05-01T10:00:00+0200", "2024-05-01T08:00:00+00:00")]
    #[case("2024-05-01T08:00:00Z", "2024-05-01T08:00:00+00:00")]
    fn parses_creation_time(#[case] raw: &str, #[case] expected: &str) {
        let server = Server {
            created: Some(raw.to_owned()),
            ..Server::default()
        };
        let parsed = server.created_at().expect("timestamp should parse");
        assert_eq!(parsed.to_rfc3339(), expected);
    }

    #[test]
    fn unparseable_creation_time_is_absent() {
        let server = Server {
            created: Some(String::from("yesterday")),
            ..Server::default()
        };
        assert!(server.created_at().is_none());
    }

    #[rstest]
    fn pending_selection_wins(mut server: Server) {
        assert_eq!(server.network(), Some("guest"));
        assert_eq!(server.security_group(), Some("default"));
        server.select_network("backend");
        server.select_security_group("web");
        assert_eq!(server.network(), Some("backend"));
        assert_eq!(server.security_group(), Some("web"));
    }

    #[test]
    fn drafts_have_no_association() {
        let mut draft = Server::default();
        assert_eq!(draft.network(), None);
        assert_eq!(draft.security_group(), None);
        draft.select_network("frontend");
        assert_eq!(draft.network(), Some("frontend"));
    }

    #[rstest]
    #[case("Running", ServerState::Running)]
    #[case("PAUSED", ServerState::Paused)]
    #[case("Starting", ServerState::Provisioning)]
    #[case("Migrating", ServerState::Other(String::from("Migrating")))]
    fn parses_state(#[case] raw: &str, #[case] expected: ServerState) {
        let server = Server {
            state: raw.to_owned(),
            ..Server::default()
        };
        assert_eq!(server.state(), expected);
    }
}

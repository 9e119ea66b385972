//! Correlation of servers with platform host records.

use crate::model::Server;

/// Platform host record, as visible to the current user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostRecord {
    /// Platform identifier.
    pub id: u64,
    /// Host name.
    pub name: String,
    /// Primary address.
    pub ip: Option<String>,
}

/// Authorization-filtered view of the platform's hosts.
pub trait HostDirectory {
    /// Hosts the current user may see.
    fn viewable_hosts(&self) -> Vec<HostRecord>;
}

/// Finds the first viewable host whose address matches the server's first
/// interface, floating address, or private address.
#[must_use]
pub fn associated_host<D: HostDirectory + ?Sized>(
    server: &Server,
    directory: &D,
) -> Option<HostRecord> {
    let candidates: Vec<&str> = [
        server.ip_address(),
        server.floating_ip_address(),
        server.private_ip_address(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if candidates.is_empty() {
        return None;
    }

    directory.viewable_hosts().into_iter().find(|host| {
        host.ip
            .as_deref()
            .is_some_and(|ip| candidates.contains(&ip))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Nic;
    use crate::test_support::StaticHosts;

    fn host(id: u64, ip: Option<&str>) -> HostRecord {
        HostRecord {
            id,
            name: format!("host{id}"),
            ip: ip.map(str::to_owned),
        }
    }

    fn server_with(ip: Option<&str>, public_ip: Option<&str>) -> Server {
        Server {
            id: "vm-1".into(),
            nics: ip
                .map(|addr| Nic {
                    ip_address: Some(addr.to_owned()),
                    ..Nic::default()
                })
                .into_iter()
                .collect(),
            public_ip: public_ip.map(str::to_owned),
            ..Server::default()
        }
    }

    #[test]
    fn matches_first_nic_address() {
        let hosts = StaticHosts::new(vec![host(1, Some("10.0.0.9")), host(2, Some("10.0.0.5"))]);
        let found = associated_host(&server_with(Some("10.0.0.5"), None), &hosts);
        assert_eq!(found.map(|record| record.id), Some(2));
    }

    #[test]
    fn matches_floating_address() {
        let hosts = StaticHosts::new(vec![host(3, Some("203.0.113.7"))]);
        let found = associated_host(&server_with(Some("10.0.0.5"), Some("203.0.113.7")), &hosts);
        assert_eq!(found.map(|record| record.id), Some(3));
    }

    #[test]
    fn no_match_returns_none() {
        let hosts = StaticHosts::new(vec![host(1, Some("10.0.0.9")), host(2, None)]);
        assert!(associated_host(&server_with(Some("10.0.0.5"), None), &hosts).is_none());
    }

    #[test]
    fn server_without_addresses_never_matches() {
        let hosts = StaticHosts::new(vec![host(1, None)]);
        assert!(associated_host(&Server::default(), &hosts).is_none());
    }

    #[test]
    fn hidden_hosts_are_not_considered() {
        let hosts = StaticHosts::new(vec![host(1, Some("10.0.0.5"))]).hiding(1);
        assert!(associated_host(&server_with(Some("10.0.0.5"), None), &hosts).is_none());
    }
}

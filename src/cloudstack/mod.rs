//! CloudStack connector: discovery and server lifecycle for one connection
//! record.

mod discovery;
pub mod endpoint;
pub mod envelope;
mod error;
mod http;
mod lifecycle;
pub mod signing;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::connection::ConnectionRecord;
use crate::provider::ClientFactory;

pub use discovery::{ConnectionTest, MenuEntry, Section, ZoneChoice};
pub use error::CloudstackError;
pub use http::{CloudstackClient, HttpClientFactory, action_command};
pub use lifecycle::CreateArgs;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Connector bound to one [`ConnectionRecord`].
///
/// A client handle is derived from the record on every access, so edits to
/// the record take effect on the next call. Clones share the create guard:
/// at most one create runs per connection at a time.
#[derive(Clone, Debug)]
pub struct Cloudstack<F> {
    record: ConnectionRecord,
    factory: F,
    poll_interval: Duration,
    wait_timeout: Duration,
    create_guard: Arc<Mutex<()>>,
}

impl<F: ClientFactory> Cloudstack<F> {
    /// Creates a connector for `record` using `factory` to reach the API.
    #[must_use]
    pub fn new(record: ConnectionRecord, factory: F) -> Self {
        Self {
            record,
            factory,
            poll_interval: POLL_INTERVAL,
            wait_timeout: WAIT_TIMEOUT,
            create_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Overrides the interval between NIC polls during create.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides how long create waits for a NIC.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// The connection record.
    #[must_use]
    pub const fn record(&self) -> &ConnectionRecord {
        &self.record
    }

    /// Mutable access to the record, for zone and hypervisor selection.
    pub const fn record_mut(&mut self) -> &mut ConnectionRecord {
        &mut self.record
    }

    /// Derives a fresh client from the record.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Configuration`] when the URL is malformed or
    /// the factory rejects the credentials.
    pub fn client(&self) -> Result<F::Client, CloudstackError> {
        let endpoint = self.record.endpoint()?;
        self.factory.connect(&endpoint, &self.record.credentials())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedFactory;

    #[test]
    fn client_rejects_malformed_url() {
        let record = ConnectionRecord::new(1, "not a url", "key", "secret");
        let cloud = Cloudstack::new(record, ScriptedFactory::default());
        let err = cloud.client().expect_err("malformed url should fail");
        assert!(matches!(err, CloudstackError::Configuration(_)));
    }

    #[test]
    fn client_is_derived_from_current_record() {
        let record = ConnectionRecord::new(1, "http://old:8080/client/api", "key", "secret");
        let factory = ScriptedFactory::default();
        let mut cloud = Cloudstack::new(record, factory.clone());
        cloud.client().expect("first connect");
        cloud.record_mut().url = String::from("https://new:8443/client/api");
        cloud.client().expect("second connect");

        let hosts: Vec<String> = factory
            .endpoints()
            .iter()
            .map(|endpoint| endpoint.host.clone())
            .collect();
        assert_eq!(hosts, ["old", "new"]);
    }
}

//! Hook points run around a connection record's own lifecycle.

use crate::cloudstack::{Cloudstack, CloudstackError};
use crate::connection::ConnectionRecord;
use crate::key_pair::{
    KeyPair, KeyPairManager, KeyPairStore, TeardownOutcome, UniqueIdSource, UuidTokens,
};
use crate::provider::{ClientFactory, LaunchDefaults};

/// Binds key pair management to connection record creation and removal.
#[derive(Clone, Debug)]
pub struct ConnectionLifecycle<S, U = UuidTokens> {
    keys: KeyPairManager<S, U>,
}

impl<S: KeyPairStore, U: UniqueIdSource> ConnectionLifecycle<S, U> {
    /// Hooks backed by `keys`.
    #[must_use]
    pub const fn new(keys: KeyPairManager<S, U>) -> Self {
        Self { keys }
    }

    /// The key pair manager.
    #[must_use]
    pub const fn keys(&self) -> &KeyPairManager<S, U> {
        &self.keys
    }

    /// Runs after the record was saved. A failure must abort the record's
    /// creation.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::KeyPairSetup`] when the key pair cannot be
    /// created or stored, including when no client can be built.
    pub async fn after_create<F: ClientFactory>(
        &self,
        cloud: &Cloudstack<F>,
    ) -> Result<KeyPair, CloudstackError> {
        let client = cloud.client().map_err(|err| CloudstackError::KeyPairSetup {
            message: err.message(),
        })?;
        self.keys.setup(&client, cloud.record().id).await
    }

    /// Runs after the record was removed. Never fails.
    pub async fn after_destroy<F: ClientFactory>(&self, cloud: &Cloudstack<F>) -> TeardownOutcome {
        let client = cloud.client();
        self.keys
            .teardown(client.as_ref().map_err(Clone::clone), cloud.record().id)
            .await
    }

    /// Defaults for servers created through `record`: its bound key pair.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Store`] when the store cannot be read.
    pub fn launch_defaults(
        &self,
        record: &ConnectionRecord,
    ) -> Result<LaunchDefaults, CloudstackError> {
        Ok(self
            .keys
            .store()
            .find(record.id)?
            .map_or_else(LaunchDefaults::default, |key_pair| {
                LaunchDefaults::with_key_pair(key_pair.name)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryKeyPairStore, ScriptedFactory, SequenceIds};

    fn hooks() -> ConnectionLifecycle<MemoryKeyPairStore, SequenceIds> {
        ConnectionLifecycle::new(KeyPairManager::with_ids(
            MemoryKeyPairStore::default(),
            SequenceIds::new("x"),
        ))
    }

    fn cloud(url: &str) -> (Cloudstack<ScriptedFactory>, ScriptedFactory) {
        let factory = ScriptedFactory::default();
        let record = ConnectionRecord::new(9, url, "key", "secret");
        (Cloudstack::new(record, factory.clone()), factory)
    }

    #[tokio::test]
    async fn create_then_destroy_round_trips_key_pair() {
        let hooks = hooks();
        let (cloud, factory) = cloud("http://cloud:8080/client/api");

        let key_pair = hooks.after_create(&cloud).await.expect("setup should succeed");
        assert_eq!(key_pair.name, "cirrus-9x1");
        assert_eq!(
            hooks.launch_defaults(cloud.record()).expect("store readable"),
            LaunchDefaults::with_key_pair("cirrus-9x1")
        );

        let outcome = hooks.after_destroy(&cloud).await;
        assert!(outcome.is_clean());
        assert!(factory.api().key_pairs().is_empty());
        assert_eq!(
            hooks.launch_defaults(cloud.record()).expect("store readable"),
            LaunchDefaults::default()
        );
    }

    #[tokio::test]
    async fn create_with_malformed_url_is_a_setup_error() {
        let hooks = hooks();
        let (cloud, _) = cloud("cloud:8080");
        let err = hooks.after_create(&cloud).await.expect_err("setup should fail");
        assert!(matches!(err, CloudstackError::KeyPairSetup { .. }));
    }
}

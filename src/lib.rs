//! Core library for the Cirrus CloudStack connector.
//!
//! A [`ConnectionRecord`] describes one CloudStack endpoint (URL, API key and
//! secret, optional zone and hypervisor). [`Cloudstack`] binds a record to a
//! [`ClientFactory`] and exposes discovery listings, server creation with a
//! rollback on partial provisioning, and power operations on existing
//! servers. [`ConnectionLifecycle`] manages the SSH key pair bound to each
//! record.

pub mod cloudstack;
pub mod config;
pub mod connection;
pub mod hooks;
pub mod host;
pub mod key_pair;
pub mod key_store;
pub mod model;
pub mod provider;
pub mod test_support;
mod view;

pub use cloudstack::{
    Cloudstack, CloudstackClient, CloudstackError, ConnectionTest, CreateArgs, HttpClientFactory,
    MenuEntry, Section, ZoneChoice,
};
pub use config::{CirrusConfig, ConfigError};
pub use connection::{Capability, ConnectionRecord, ProvidedAttributes, ValidationErrors};
pub use hooks::ConnectionLifecycle;
pub use host::{HostDirectory, HostRecord, associated_host};
pub use key_pair::{KeyPair, KeyPairManager, KeyPairStore, TeardownOutcome};
pub use key_store::FileKeyPairStore;
pub use model::{Server, ServerState};
pub use provider::{
    ClientFactory, ComputeApi, Credentials, LaunchDefaults, ServerAction, ServerRequest,
};

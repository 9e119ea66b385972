//! Test doubles shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::env;
use std::ffi::OsString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::MutexGuard as AsyncMutexGuard;

use crate::cloudstack::CloudstackError;
use crate::cloudstack::endpoint::Endpoint;
use crate::host::{HostDirectory, HostRecord};
use crate::key_pair::{KeyPair, KeyPairStore, UniqueIdSource};
use crate::model::{
    CreatedServer, DiskOffering, Domain, Flavor, Hypervisor, Image, Network, Nic, Server,
    SshKeyPair, Zone,
};
use crate::provider::{
    ApiFuture, ClientFactory, ComputeApi, Credentials, ServerAction, ServerRequest,
};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct ApiState {
    zones: Vec<Zone>,
    domains: Vec<Domain>,
    hypervisors: Vec<Hypervisor>,
    networks: Vec<Network>,
    templates: Vec<Image>,
    isos: Vec<Image>,
    flavors: Vec<Flavor>,
    disk_offerings: Vec<DiskOffering>,
    servers: BTreeMap<String, Server>,
    polls: HashMap<String, u32>,
    nic_delay: u32,
    withhold_nics: bool,
    created: Vec<ServerRequest>,
    key_pairs: BTreeSet<String>,
    key_pair_prefix: String,
    failures: HashMap<String, CloudstackError>,
    calls: Vec<String>,
}

/// In-memory [`ComputeApi`] with scripted inventory and failures.
///
/// Clones share state, so a test can keep a handle while the connector owns
/// another. Every call is recorded as `"<operation>"` or
/// `"<operation>:<argument>"`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedApi {
    state: Arc<Mutex<ApiState>>,
}

impl ScriptedApi {
    /// Replaces the zone inventory.
    #[must_use]
    pub fn with_zones(self, zones: Vec<Zone>) -> Self {
        locked(&self.state).zones = zones;
        self
    }

    /// Replaces the domain inventory.
    #[must_use]
    pub fn with_domains(self, domains: Vec<Domain>) -> Self {
        locked(&self.state).domains = domains;
        self
    }

    /// Replaces the hypervisor inventory.
    #[must_use]
    pub fn with_hypervisors(self, hypervisors: Vec<Hypervisor>) -> Self {
        locked(&self.state).hypervisors = hypervisors;
        self
    }

    /// Replaces the network inventory.
    #[must_use]
    pub fn with_networks(self, networks: Vec<Network>) -> Self {
        locked(&self.state).networks = networks;
        self
    }

    /// Replaces the template and ISO inventories.
    #[must_use]
    pub fn with_images(self, templates: Vec<Image>, isos: Vec<Image>) -> Self {
        {
            let mut state = locked(&self.state);
            state.templates = templates;
            state.isos = isos;
        }
        self
    }

    /// Replaces the flavor inventory.
    #[must_use]
    pub fn with_flavors(self, flavors: Vec<Flavor>) -> Self {
        locked(&self.state).flavors = flavors;
        self
    }

    /// Replaces the disk offering inventory.
    #[must_use]
    pub fn with_disk_offerings(self, offerings: Vec<DiskOffering>) -> Self {
        locked(&self.state).disk_offerings = offerings;
        self
    }

    /// New servers report a NIC only from their `polls`-th lookup on.
    #[must_use]
    pub fn with_nic_delay(self, polls: u32) -> Self {
        locked(&self.state).nic_delay = polls;
        self
    }

    /// Key pairs are stored under `prefix` followed by the requested name.
    #[must_use]
    pub fn with_key_pair_prefix(self, prefix: &str) -> Self {
        locked(&self.state).key_pair_prefix = prefix.to_owned();
        self
    }

    /// New servers never report a NIC.
    #[must_use]
    pub fn without_nics(self) -> Self {
        locked(&self.state).withhold_nics = true;
        self
    }

    /// Adds an existing server.
    pub fn insert_server(&self, server: Server) {
        locked(&self.state)
            .servers
            .insert(server.id.to_string(), server);
    }

    /// Makes every later call of `operation` fail with `error`.
    pub fn fail(&self, operation: &str, error: CloudstackError) {
        locked(&self.state)
            .failures
            .insert(operation.to_owned(), error);
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        locked(&self.state).calls.clone()
    }

    /// Requests passed to `create_server`.
    #[must_use]
    pub fn created_requests(&self) -> Vec<ServerRequest> {
        locked(&self.state).created.clone()
    }

    /// Ids of servers that currently exist.
    #[must_use]
    pub fn server_ids(&self) -> Vec<String> {
        locked(&self.state).servers.keys().cloned().collect()
    }

    /// Names of key pairs that currently exist.
    #[must_use]
    pub fn key_pairs(&self) -> Vec<String> {
        locked(&self.state).key_pairs.iter().cloned().collect()
    }

    /// Records the call and returns the scripted failure, if any.
    fn enter(&self, operation: &str, argument: Option<&str>) -> Result<(), CloudstackError> {
        let mut state = locked(&self.state);
        state.calls.push(argument.map_or_else(
            || operation.to_owned(),
            |arg| format!("{operation}:{arg}"),
        ));
        state.failures.get(operation).cloned().map_or(Ok(()), Err)
    }

    fn listing<T: Clone>(
        &self,
        operation: &str,
        pick: impl FnOnce(&ApiState) -> Vec<T>,
    ) -> Result<Vec<T>, CloudstackError> {
        self.enter(operation, None)?;
        Ok(pick(&locked(&self.state)))
    }
}

fn not_found(id: &str) -> CloudstackError {
    CloudstackError::NotFound {
        resource: String::from("server"),
        id: id.to_owned(),
    }
}

fn scripted_nic(index: usize) -> Nic {
    Nic {
        id: format!("nic-{index}"),
        ip_address: Some(format!("10.1.1.{index}")),
        mac_address: Some(format!("02:00:00:00:00:{index:02x}")),
        network_id: Some(String::from("net-1")),
        network_name: Some(String::from("guest")),
        is_default: true,
    }
}

impl ComputeApi for ScriptedApi {
    fn list_zones(&self) -> ApiFuture<'_, Vec<Zone>> {
        Box::pin(async move { self.listing("list_zones", |state| state.zones.clone()) })
    }

    fn list_domains(&self) -> ApiFuture<'_, Vec<Domain>> {
        Box::pin(async move { self.listing("list_domains", |state| state.domains.clone()) })
    }

    fn list_hypervisors(&self) -> ApiFuture<'_, Vec<Hypervisor>> {
        Box::pin(async move {
            self.listing("list_hypervisors", |state| state.hypervisors.clone())
        })
    }

    fn list_networks(&self) -> ApiFuture<'_, Vec<Network>> {
        Box::pin(async move { self.listing("list_networks", |state| state.networks.clone()) })
    }

    fn list_templates(&self) -> ApiFuture<'_, Vec<Image>> {
        Box::pin(async move { self.listing("list_templates", |state| state.templates.clone()) })
    }

    fn list_isos(&self) -> ApiFuture<'_, Vec<Image>> {
        Box::pin(async move { self.listing("list_isos", |state| state.isos.clone()) })
    }

    fn list_flavors(&self) -> ApiFuture<'_, Vec<Flavor>> {
        Box::pin(async move { self.listing("list_flavors", |state| state.flavors.clone()) })
    }

    fn list_disk_offerings(&self) -> ApiFuture<'_, Vec<DiskOffering>> {
        Box::pin(async move {
            self.listing("list_disk_offerings", |state| state.disk_offerings.clone())
        })
    }

    fn create_server<'a>(&'a self, request: &'a ServerRequest) -> ApiFuture<'a, CreatedServer> {
        Box::pin(async move {
            self.enter("create_server", Some(&request.name))?;
            let mut state = locked(&self.state);
            state.created.push(request.clone());
            let id = format!("vm-{}", state.created.len());
            let nics = if !state.withhold_nics && state.nic_delay == 0 {
                vec![scripted_nic(state.created.len())]
            } else {
                Vec::new()
            };
            state.servers.insert(
                id.clone(),
                Server {
                    id: id.as_str().into(),
                    name: request.name.clone(),
                    display_name: Some(request.display_name.clone()),
                    state: String::from("Starting"),
                    nics,
                    zone_id: Some(request.zone_id.as_str().into()),
                    flavor_id: Some(request.flavor_id.clone()),
                    template_id: Some(request.image_id.clone()),
                    ..Server::default()
                },
            );
            Ok(CreatedServer {
                id: id.into(),
                job_id: Some(String::from("job-1")),
            })
        })
    }

    fn destroy_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.enter("destroy_server", Some(id))?;
            locked(&self.state)
                .servers
                .remove(id)
                .map(drop)
                .ok_or_else(|| not_found(id))
        })
    }

    fn server_action<'a>(&'a self, id: &'a str, action: ServerAction) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.enter(action.name(), Some(id))?;
            let mut state = locked(&self.state);
            let server = state.servers.get_mut(id).ok_or_else(|| not_found(id))?;
            server.state = String::from(match action {
                ServerAction::Suspend => "Stopped",
                ServerAction::Pause => "Paused",
                ServerAction::Resume | ServerAction::Unpause | ServerAction::Reboot { .. } => {
                    "Running"
                }
            });
            Ok(())
        })
    }

    fn console<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Map<String, Value>> {
        Box::pin(async move {
            self.enter("console", Some(id))?;
            let mut session = Map::new();
            session.insert(
                String::from("url"),
                Value::String(format!("https://console.example.test/{id}")),
            );
            Ok(session)
        })
    }

    fn create_ssh_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, SshKeyPair> {
        Box::pin(async move {
            self.enter("create_ssh_key_pair", Some(name))?;
            let stored = {
                let mut state = locked(&self.state);
                let stored = format!("{}{name}", state.key_pair_prefix);
                state.key_pairs.insert(stored.clone());
                stored
            };
            Ok(SshKeyPair {
                fingerprint: None,
                private_key: format!("PRIVATE KEY FOR {stored}"),
                name: stored,
            })
        })
    }

    fn delete_ssh_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.enter("delete_ssh_key_pair", Some(name))?;
            locked(&self.state).key_pairs.remove(name);
            Ok(())
        })
    }

    fn find_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Option<Server>> {
        Box::pin(async move {
            self.enter("find_server", Some(id))?;
            let mut state = locked(&self.state);
            let polls = {
                let count = state.polls.entry(id.to_owned()).or_insert(0);
                *count += 1;
                *count
            };
            let attach = !state.withhold_nics && polls >= state.nic_delay;
            let Some(server) = state.servers.get_mut(id) else {
                return Ok(None);
            };
            if attach && server.nics.is_empty() {
                server.nics.push(scripted_nic(1));
            }
            Ok(Some(server.clone()))
        })
    }
}

/// [`ClientFactory`] handing out clones of one [`ScriptedApi`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedFactory {
    api: ScriptedApi,
    endpoints: Arc<Mutex<Vec<Endpoint>>>,
}

impl ScriptedFactory {
    /// Factory serving `api`.
    #[must_use]
    pub fn new(api: ScriptedApi) -> Self {
        Self {
            api,
            endpoints: Arc::default(),
        }
    }

    /// The shared API double.
    #[must_use]
    pub fn api(&self) -> ScriptedApi {
        self.api.clone()
    }

    /// Endpoints passed to `connect`, in order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        locked(&self.endpoints).clone()
    }
}

impl ClientFactory for ScriptedFactory {
    type Client = ScriptedApi;

    fn connect(
        &self,
        endpoint: &Endpoint,
        _credentials: &Credentials,
    ) -> Result<Self::Client, CloudstackError> {
        locked(&self.endpoints).push(endpoint.clone());
        Ok(self.api.clone())
    }
}

/// In-memory [`KeyPairStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyPairStore {
    records: Arc<Mutex<BTreeMap<u64, KeyPair>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryKeyPairStore {
    /// Makes every later `save` fail.
    pub fn fail_writes(&self) {
        *locked(&self.fail_writes) = true;
    }
}

impl KeyPairStore for MemoryKeyPairStore {
    fn find(&self, connection_id: u64) -> Result<Option<KeyPair>, CloudstackError> {
        Ok(locked(&self.records).get(&connection_id).cloned())
    }

    fn save(&self, key_pair: &KeyPair) -> Result<(), CloudstackError> {
        if *locked(&self.fail_writes) {
            return Err(CloudstackError::Store {
                message: String::from("disk full"),
            });
        }
        locked(&self.records).insert(key_pair.connection_id, key_pair.clone());
        Ok(())
    }

    fn remove_secret(&self, connection_id: u64) -> Result<(), CloudstackError> {
        if let Some(record) = locked(&self.records).get_mut(&connection_id) {
            record.secret.clear();
        }
        Ok(())
    }

    fn remove_record(&self, connection_id: u64) -> Result<(), CloudstackError> {
        locked(&self.records).remove(&connection_id);
        Ok(())
    }
}

/// [`UniqueIdSource`] yielding `<prefix>1`, `<prefix>2`, ...
#[derive(Debug)]
pub struct SequenceIds {
    prefix: String,
    next: AtomicU64,
}

impl SequenceIds {
    /// Sequence starting at `<prefix>1`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl UniqueIdSource for SequenceIds {
    fn next_token(&self) -> String {
        let value = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}{value}", self.prefix)
    }
}

/// [`HostDirectory`] over a fixed host list with optional hidden ids.
#[derive(Clone, Debug, Default)]
pub struct StaticHosts {
    hosts: Vec<HostRecord>,
    hidden: BTreeSet<u64>,
}

impl StaticHosts {
    /// Directory listing `hosts`.
    #[must_use]
    pub fn new(hosts: Vec<HostRecord>) -> Self {
        Self {
            hosts,
            hidden: BTreeSet::new(),
        }
    }

    /// Hides the host with `id` from the current user.
    #[must_use]
    pub fn hiding(mut self, id: u64) -> Self {
        self.hidden.insert(id);
        self
    }
}

impl HostDirectory for StaticHosts {
    fn viewable_hosts(&self) -> Vec<HostRecord> {
        self.hosts
            .iter()
            .filter(|host| !self.hidden.contains(&host.id))
            .cloned()
            .collect()
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets `pairs` and removes `unset` while holding [`ENV_LOCK`].
    pub async fn set_vars(pairs: &[(&str, &str)], unset: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + unset.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in unset {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

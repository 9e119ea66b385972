//! reqwest transport for the CloudStack management API.

use std::sync::LazyLock;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::CloudstackError;
use super::endpoint::Endpoint;
use super::envelope::{
    self, ApiFault, CONSOLE_ENDPOINT, CREATE_KEY_PAIR, DELETE_KEY_PAIR, DEPLOY_SERVER,
    DESTROY_SERVER, LIST_DISK_OFFERINGS, LIST_DOMAINS, LIST_FLAVORS, LIST_HYPERVISORS, LIST_ISOS,
    LIST_NETWORKS, LIST_SERVERS, LIST_TEMPLATES, LIST_ZONES, ListCall,
};
use super::signing::signed_query;
use crate::model::{
    CreatedServer, DiskOffering, Domain, Flavor, Hypervisor, Image, Network, Server, SshKeyPair,
    Zone,
};
use crate::provider::{
    ApiFuture, ClientFactory, ComputeApi, Credentials, ServerAction, ServerRequest,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error code CloudStack uses for invalid parameters, including unknown ids.
const PARAM_ERROR: u64 = 431;

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Client for one CloudStack endpoint.
#[derive(Clone, Debug)]
pub struct CloudstackClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    credentials: Credentials,
}

#[derive(Deserialize)]
struct DeleteReply {
    #[serde(default)]
    success: Value,
    #[serde(default, rename = "displaytext")]
    display_text: Option<String>,
}

impl CloudstackClient {
    /// Creates a client using the shared HTTP connection pool.
    #[must_use]
    pub fn new(endpoint: Endpoint, credentials: Credentials) -> Self {
        Self::with_http_client(HTTP_CLIENT.clone(), endpoint, credentials)
    }

    /// Creates a client with a caller supplied reqwest client.
    #[must_use]
    pub const fn with_http_client(
        http: reqwest::Client,
        endpoint: Endpoint,
        credentials: Credentials,
    ) -> Self {
        Self {
            http,
            endpoint,
            credentials,
        }
    }

    /// Endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sends a signed request, returning either the body or the provider's
    /// fault. Transport failures are returned as the outer error.
    async fn call_raw(
        &self,
        command: &str,
        mut params: Vec<(String, String)>,
    ) -> Result<Result<Value, ApiFault>, CloudstackError> {
        params.push((String::from("command"), command.to_owned()));
        params.push((String::from("response"), String::from("json")));
        params.push((String::from("apiKey"), self.credentials.api_key.clone()));
        let query = signed_query(&params, &self.credentials.secret_key)?;
        let url = format!("{}?{query}", self.endpoint.base_url());

        debug!(command, endpoint = %self.endpoint, "calling CloudStack API");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let fault = envelope::extract_fault(&body);
            debug!(command, status = %status, message = %fault.message, "CloudStack API fault");
            return Ok(Err(fault));
        }

        let value: Value =
            serde_json::from_slice(&body).map_err(|err| CloudstackError::Decode {
                command: command.to_owned(),
                message: err.to_string(),
            })?;
        if value.get("errorresponse").is_some() {
            return Ok(Err(envelope::extract_fault(&body)));
        }
        Ok(Ok(value))
    }

    async fn call(
        &self,
        command: &str,
        params: Vec<(String, String)>,
    ) -> Result<Value, CloudstackError> {
        self.call_raw(command, params)
            .await?
            .map_err(|fault| CloudstackError::Provider {
                message: fault.message,
            })
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        call: ListCall,
        params: Vec<(String, String)>,
    ) -> Result<Vec<T>, CloudstackError> {
        let body = self.call(call.command, params).await?;
        call.decode(&body)
    }
}

fn param(key: &str, value: &str) -> (String, String) {
    (key.to_owned(), value.to_owned())
}

/// Maps a power action onto the API command and its extra parameters.
///
/// CloudStack has no separate paused state, so pause and suspend both stop
/// the server and unpause and resume both start it.
#[must_use]
pub fn action_command(action: ServerAction) -> (&'static str, Vec<(String, String)>) {
    match action {
        ServerAction::Suspend | ServerAction::Pause => ("stopVirtualMachine", Vec::new()),
        ServerAction::Resume | ServerAction::Unpause => ("startVirtualMachine", Vec::new()),
        ServerAction::Reboot { hard: true } => {
            ("rebootVirtualMachine", vec![param("forced", "true")])
        }
        ServerAction::Reboot { hard: false } => ("rebootVirtualMachine", Vec::new()),
    }
}

fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

impl ComputeApi for CloudstackClient {
    fn list_zones(&self) -> ApiFuture<'_, Vec<Zone>> {
        Box::pin(async move { self.list(LIST_ZONES, Vec::new()).await })
    }

    fn list_domains(&self) -> ApiFuture<'_, Vec<Domain>> {
        Box::pin(async move { self.list(LIST_DOMAINS, vec![param("listall", "true")]).await })
    }

    fn list_hypervisors(&self) -> ApiFuture<'_, Vec<Hypervisor>> {
        Box::pin(async move { self.list(LIST_HYPERVISORS, Vec::new()).await })
    }

    fn list_networks(&self) -> ApiFuture<'_, Vec<Network>> {
        Box::pin(async move { self.list(LIST_NETWORKS, Vec::new()).await })
    }

    fn list_templates(&self) -> ApiFuture<'_, Vec<Image>> {
        Box::pin(async move {
            self.list(LIST_TEMPLATES, vec![param("templatefilter", "self")])
                .await
        })
    }

    fn list_isos(&self) -> ApiFuture<'_, Vec<Image>> {
        Box::pin(async move { self.list(LIST_ISOS, Vec::new()).await })
    }

    fn list_flavors(&self) -> ApiFuture<'_, Vec<Flavor>> {
        Box::pin(async move { self.list(LIST_FLAVORS, Vec::new()).await })
    }

    fn list_disk_offerings(&self) -> ApiFuture<'_, Vec<DiskOffering>> {
        Box::pin(async move { self.list(LIST_DISK_OFFERINGS, Vec::new()).await })
    }

    fn create_server<'a>(&'a self, request: &'a ServerRequest) -> ApiFuture<'a, CreatedServer> {
        Box::pin(async move {
            request.validate()?;
            let body = self.call(DEPLOY_SERVER.command, request.to_params()).await?;
            DEPLOY_SERVER.decode(&body)
        })
    }

    fn destroy_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let params = vec![param("id", id)];
            match self.call_raw(DESTROY_SERVER.command, params).await? {
                Ok(_) => Ok(()),
                // 431 covers any bad parameter; only a failed lookup means the id is gone.
                Err(fault) if fault.code == Some(PARAM_ERROR) => {
                    if self.find_server(id).await?.is_none() {
                        return Err(CloudstackError::NotFound {
                            resource: String::from("server"),
                            id: id.to_owned(),
                        });
                    }
                    Err(CloudstackError::Provider {
                        message: fault.message,
                    })
                }
                Err(fault) => Err(CloudstackError::Provider {
                    message: fault.message,
                }),
            }
        })
    }

    fn server_action<'a>(&'a self, id: &'a str, action: ServerAction) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let (command, mut params) = action_command(action);
            params.push(param("id", id));
            self.call(command, params).await.map(|_| ())
        })
    }

    fn console<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Map<String, Value>> {
        Box::pin(async move {
            let body = self
                .call(
                    CONSOLE_ENDPOINT.command,
                    vec![param("virtualmachineid", id)],
                )
                .await?;
            CONSOLE_ENDPOINT.decode(&body)
        })
    }

    fn create_ssh_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, SshKeyPair> {
        Box::pin(async move {
            let body = self
                .call(CREATE_KEY_PAIR.command, vec![param("name", name)])
                .await?;
            CREATE_KEY_PAIR.decode(&body)
        })
    }

    fn delete_ssh_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let body = self
                .call(DELETE_KEY_PAIR.command, vec![param("name", name)])
                .await?;
            let reply: DeleteReply = DELETE_KEY_PAIR.decode(&body)?;
            if is_true(&reply.success) {
                return Ok(());
            }
            Err(CloudstackError::Provider {
                message: reply
                    .display_text
                    .unwrap_or_else(|| format!("key pair {name} was not deleted")),
            })
        })
    }

    fn find_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Option<Server>> {
        Box::pin(async move {
            let params = vec![param("id", id), param("listall", "true")];
            let body = match self.call_raw(LIST_SERVERS.command, params).await? {
                Ok(body) => body,
                Err(fault) if fault.code == Some(PARAM_ERROR) => return Ok(None),
                Err(fault) => {
                    return Err(CloudstackError::Provider {
                        message: fault.message,
                    });
                }
            };
            let servers: Vec<Server> = LIST_SERVERS.decode(&body)?;
            Ok(servers.into_iter().find(|server| server.id.as_str() == id))
        })
    }
}

/// Factory producing [`CloudstackClient`] handles on demand.
#[derive(Clone, Debug, Default)]
pub struct HttpClientFactory {
    http: Option<reqwest::Client>,
}

impl HttpClientFactory {
    /// Factory that uses the shared HTTP connection pool.
    #[must_use]
    pub const fn new() -> Self {
        Self { http: None }
    }

    /// Factory that hands `http` to every client it builds.
    #[must_use]
    pub const fn with_http_client(http: reqwest::Client) -> Self {
        Self { http: Some(http) }
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = CloudstackClient;

    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Self::Client, CloudstackError> {
        if credentials.api_key.trim().is_empty() || credentials.secret_key.trim().is_empty() {
            return Err(CloudstackError::Configuration(String::from(
                "api key and secret key are required",
            )));
        }
        let http = self.http.clone().unwrap_or_else(|| HTTP_CLIENT.clone());
        Ok(CloudstackClient::with_http_client(
            http,
            endpoint.clone(),
            credentials.clone(),
        ))
    }
}

//! Server creation with rollback of partially provisioned servers.

use tracing::{debug, info, warn};

use super::super::{Cloudstack, CloudstackError};
use super::{CreateArgs, derive_host_name};
use crate::cloudstack::types::ServerId;
use crate::model::Server;
use crate::provider::{ClientFactory, ComputeApi, LaunchDefaults, ServerRequest};

impl<F: ClientFactory> Cloudstack<F> {
    /// Creates a server and waits until it reports a network interface.
    ///
    /// The zone and hypervisor come from the connection record. Caller
    /// options override `defaults`. When anything fails after the provider
    /// allocated the server, the server is destroyed before returning.
    ///
    /// # Errors
    ///
    /// - [`CloudstackError::CreateInProgress`] when another create holds the
    ///   connection.
    /// - [`CloudstackError::Configuration`] when no zone is selected or the
    ///   wait timeout cannot be represented.
    /// - [`CloudstackError::PartialProvisioning`] when a step after
    ///   allocation failed.
    /// - Any provider error raised before allocation, unchanged.
    pub async fn create(
        &self,
        args: CreateArgs,
        defaults: &LaunchDefaults,
    ) -> Result<Server, CloudstackError> {
        let Ok(_guard) = self.create_guard.try_lock() else {
            return Err(CloudstackError::CreateInProgress);
        };

        let request = self.build_request(args, defaults)?;
        let deadline = self.wait_deadline()?;
        let client = self.client()?;
        info!(
            name = %request.name,
            zone = %request.zone_id,
            image = %request.image_id,
            "creating server"
        );
        let created = client.create_server(&request).await?;
        debug!(server_id = %created.id, job_id = ?created.job_id, "server allocated");

        match self.wait_for_nics(&client, &created.id, deadline).await {
            Ok(server) => {
                info!(server_id = %server.id, ip = ?server.ip_address(), "server ready");
                Ok(server)
            }
            Err(err) => Err(Self::roll_back(&client, &created.id, err).await),
        }
    }

    pub(in crate::cloudstack) fn build_request(
        &self,
        args: CreateArgs,
        defaults: &LaunchDefaults,
    ) -> Result<ServerRequest, CloudstackError> {
        let zone = self
            .record
            .zone_id
            .as_ref()
            .filter(|zone| !zone.is_blank())
            .ok_or_else(|| {
                CloudstackError::Configuration(String::from(
                    "no zone selected for this connection",
                ))
            })?;

        if !args.security_group_ids.is_empty() {
            debug!(
                groups = ?args.security_group_ids,
                "security groups are not applied to new servers"
            );
        }

        let network = args
            .network_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| args.subnet_id.filter(|id| !id.trim().is_empty()));

        let mut builder = ServerRequest::builder()
            .name(derive_host_name(&args.name))
            .zone_id(zone.as_str())
            .image_id(args.image_id)
            .flavor_id(args.flavor_id)
            .hypervisor(self.record.hypervisor.clone())
            .key_pair(args.key_pair.or_else(|| defaults.key_pair.clone()));
        if let Some(network_id) = network {
            builder = builder.network_id(network_id);
        }
        for (key, value) in defaults.extra.iter().chain(&args.extra) {
            builder = builder.extra(key.clone(), value.clone());
        }
        builder.build()
    }

    async fn roll_back<C: ComputeApi>(
        client: &C,
        server_id: &ServerId,
        cause: CloudstackError,
    ) -> CloudstackError {
        warn!(
            server_id = %server_id,
            error = %cause,
            "create failed after allocation; destroying server"
        );
        match client.destroy_server(server_id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => warn!(server_id = %server_id, error = %err, "rollback destroy failed"),
        }
        CloudstackError::PartialProvisioning {
            server_id: server_id.to_string(),
            message: cause.message(),
        }
    }
}

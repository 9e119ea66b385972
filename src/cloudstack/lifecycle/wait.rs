//! Bounded polling while a new server attaches its network.

use tokio::time::{Instant, sleep};

use super::super::{Cloudstack, CloudstackError};
use crate::cloudstack::types::ServerId;
use crate::model::Server;
use crate::provider::{ClientFactory, ComputeApi};

impl<F: ClientFactory> Cloudstack<F> {
    /// Fixes the point after which [`Self::wait_for_nics`] gives up.
    pub(in crate::cloudstack) fn wait_deadline(&self) -> Result<Instant, CloudstackError> {
        Instant::now()
            .checked_add(self.wait_timeout)
            .ok_or_else(|| {
                CloudstackError::Configuration(format!(
                    "wait timeout of {}s is too large",
                    self.wait_timeout.as_secs()
                ))
            })
    }

    pub(in crate::cloudstack) async fn wait_for_nics<C: ComputeApi>(
        &self,
        client: &C,
        server_id: &ServerId,
        deadline: Instant,
    ) -> Result<Server, CloudstackError> {
        while Instant::now() <= deadline {
            if let Some(server) = client.find_server(server_id).await?
                && !server.nics.is_empty()
            {
                return Ok(server);
            }
            sleep(self.poll_interval).await;
        }

        Err(CloudstackError::Timeout {
            action: String::from("wait_for_nics"),
            server_id: server_id.to_string(),
        })
    }
}

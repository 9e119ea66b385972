//! Operations on existing servers.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::super::{Cloudstack, CloudstackError};
use super::require_server;
use crate::model::{Server, ServerState};
use crate::provider::{ClientFactory, ComputeApi, ServerAction};

impl<F: ClientFactory> Cloudstack<F> {
    /// Fetches a server.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::NotFound`] when the id is unknown.
    pub async fn server(&self, id: &str) -> Result<Server, CloudstackError> {
        let client = self.client()?;
        require_server(&client, id).await
    }

    /// Starts a server: paused servers are unpaused, anything else resumed.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::NotFound`] when the id is unknown, or the
    /// provider error.
    pub async fn start(&self, id: &str) -> Result<(), CloudstackError> {
        let client = self.client()?;
        let server = require_server(&client, id).await?;
        let action = if server.state() == ServerState::Paused {
            ServerAction::Unpause
        } else {
            ServerAction::Resume
        };
        Self::apply(&client, id, action).await
    }

    /// Stops a server by suspending it.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::NotFound`] when the id is unknown, or the
    /// provider error.
    pub async fn stop(&self, id: &str) -> Result<(), CloudstackError> {
        self.act(id, ServerAction::Suspend).await
    }

    /// Pauses a server.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::NotFound`] when the id is unknown, or the
    /// provider error.
    pub async fn pause(&self, id: &str) -> Result<(), CloudstackError> {
        self.act(id, ServerAction::Pause).await
    }

    /// Power cycles a server with a hard reboot.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::NotFound`] when the id is unknown, or the
    /// provider error.
    pub async fn reset(&self, id: &str) -> Result<(), CloudstackError> {
        self.act(id, ServerAction::Reboot { hard: true }).await
    }

    /// Destroys a server. Servers that are already gone count as destroyed.
    ///
    /// # Errors
    ///
    /// Returns the provider error for any failure other than the server
    /// being absent.
    pub async fn destroy(&self, id: &str) -> Result<(), CloudstackError> {
        let client = self.client()?;
        if client.find_server(id).await?.is_none() {
            debug!(server_id = id, "server already absent");
            return Ok(());
        }
        match client.destroy_server(id).await {
            Ok(()) => {
                info!(server_id = id, "server destroyed");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(server_id = id, "server vanished before destroy");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Opens a console session and stamps it with the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::NotFound`] when the id is unknown, or the
    /// provider error.
    pub async fn console(&self, id: &str) -> Result<Map<String, Value>, CloudstackError> {
        let client = self.client()?;
        require_server(&client, id).await?;
        let mut session = client.console(id).await?;
        session.insert(
            String::from("timestamp"),
            Value::String(Utc::now().to_rfc3339()),
        );
        Ok(session)
    }

    /// Address of the server's first network interface.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::NotFound`] when the id is unknown.
    pub async fn ip_address(&self, id: &str) -> Result<Option<String>, CloudstackError> {
        let server = self.server(id).await?;
        Ok(server.ip_address().map(str::to_owned))
    }

    async fn act(&self, id: &str, action: ServerAction) -> Result<(), CloudstackError> {
        let client = self.client()?;
        require_server(&client, id).await?;
        Self::apply(&client, id, action).await
    }

    async fn apply<C: ComputeApi>(
        client: &C,
        id: &str,
        action: ServerAction,
    ) -> Result<(), CloudstackError> {
        info!(server_id = id, action = action.name(), "applying server action");
        client.server_action(id, action).await
    }
}

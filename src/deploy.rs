//! Stack deployment
//!
//! Drives one create-or-update run: authenticate, resolve endpoint and
//! swarm, look the stack up by name, then create it or update it. Nothing is
//! remembered between runs; every run rediscovers ids from Portainer.
//!
//! Two deployers driving the same stack name at once can both see it as
//! missing and both try to create it. Callers serialize runs per stack.

use crate::config::PortainerConfig;
use crate::error::Result;
use crate::portainer::{HttpTransport, PortainerClient, ReqwestTransport, UpdateOutcome};
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

/// Portainer login
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// What a deployment run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// No stack had the name; a new one was created
    Created { stack_name: String },
    /// The existing stack was updated
    Updated { stack_id: String },
    /// The update timed out; Portainer may or may not have applied it
    UpdateUncertain { stack_id: String, reason: String },
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployOutcome::Created { stack_name } => write!(f, "created stack {}", stack_name),
            DeployOutcome::Updated { stack_id } => write!(f, "updated stack {}", stack_id),
            DeployOutcome::UpdateUncertain { stack_id, reason } => {
                write!(f, "update of stack {} unconfirmed: {}", stack_id, reason)
            }
        }
    }
}

/// Creates or updates stacks on one Portainer instance
pub struct StackDeployer<T = ReqwestTransport> {
    client: PortainerClient<T>,
    credentials: Credentials,
    endpoint_id: Option<i64>,
}

impl StackDeployer<ReqwestTransport> {
    /// Build a deployer from connection settings
    pub fn from_config(config: &PortainerConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.insecure)?;
        let client = PortainerClient::with_transport(&config.url, transport, config.retry.clone())?;

        Ok(Self::new(
            client,
            Credentials::new(&config.username, &config.password),
        )
        .with_endpoint(config.endpoint_id))
    }
}

impl<T: HttpTransport> StackDeployer<T> {
    pub fn new(client: PortainerClient<T>, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            endpoint_id: None,
        }
    }

    /// Pin the endpoint; `None` deploys to the first endpoint
    pub fn with_endpoint(mut self, endpoint_id: Option<i64>) -> Self {
        self.endpoint_id = endpoint_id;
        self
    }

    /// Underlying client
    pub fn client(&self) -> &PortainerClient<T> {
        &self.client
    }

    /// Login credentials in use
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Make the stack named `stack_name` match `stack_config`
    pub async fn deploy(&self, stack_name: &str, stack_config: &Value) -> Result<DeployOutcome> {
        info!("Deploying stack {} to {}", stack_name, self.client.base_url());

        let token = self
            .client
            .authenticate(&self.credentials.username, &self.credentials.password)
            .await?;

        let endpoint_id = match self.endpoint_id {
            Some(id) => id,
            None => self.client.get_first_endpoint_id(&token).await?,
        };
        let swarm_id = self.client.get_swarm_id(&token, Some(endpoint_id)).await?;

        match self.client.get_current_stack_id(&token, stack_name).await? {
            None => {
                info!("Creating stack {} on endpoint {}", stack_name, endpoint_id);
                self.client
                    .create_stack(&token, &swarm_id, Some(endpoint_id), stack_name, stack_config)
                    .await?;
                Ok(DeployOutcome::Created {
                    stack_name: stack_name.to_string(),
                })
            }
            Some(stack_id) => {
                info!("Updating stack {} ({})", stack_name, stack_id);
                let outcome = self
                    .client
                    .update_stack(&token, &stack_id, Some(endpoint_id), stack_config)
                    .await?;

                Ok(match outcome {
                    UpdateOutcome::Updated(_) => DeployOutcome::Updated { stack_id },
                    UpdateOutcome::Uncertain { reason } => {
                        warn!("Stack {} may not reflect the new configuration", stack_name);
                        DeployOutcome::UpdateUncertain { stack_id, reason }
                    }
                })
            }
        }
    }
}

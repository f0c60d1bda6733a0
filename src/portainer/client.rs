//! Portainer REST client
//!
//! Thin facade over the Portainer API: authentication, endpoint and swarm
//! discovery, and stack creation or update. The client keeps no session
//! state; the bearer token is passed explicitly to every call.

use super::executor::{RequestExecutor, RetryPolicy};
use super::transport::{HttpTransport, ReqwestTransport};
use super::types::{
    stack_file_content, AuthRequest, AuthResponse, BearerToken, CreateStackRequest, Endpoint,
    Stack, SwarmInfo, UpdateOutcome, UpdateStackRequest,
};
use crate::error::{Result, StackError};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Pause before each update request
pub const UPDATE_THROTTLE: Duration = Duration::from_millis(500);

/// Client for a single Portainer instance
#[derive(Debug, Clone)]
pub struct PortainerClient<T = ReqwestTransport> {
    base_url: Url,
    executor: RequestExecutor<T>,
}

impl PortainerClient<ReqwestTransport> {
    /// Create a client with its own connection pool and default retries
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_transport(base_url, ReqwestTransport::new(false)?, RetryPolicy::default())
    }
}

impl<T: HttpTransport> PortainerClient<T> {
    /// Create a client over an explicit transport and retry policy
    pub fn with_transport(base_url: &str, transport: T, policy: RetryPolicy) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            StackError::InvalidConfig(format!("invalid Portainer URL {}: {}", base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(StackError::InvalidConfig(format!(
                "Portainer URL {} cannot carry an API path",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            executor: RequestExecutor::new(transport, policy),
        })
    }

    /// Base URL of the Portainer instance
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Authenticate and return the bearer token
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<BearerToken> {
        debug!("authenticating with portainer {}", self.base_url);
        let body = serde_json::to_value(AuthRequest { username, password })?;

        let data = self
            .executor
            .execute(Method::POST, &self.url("api/auth"), &[], Some(&body))
            .await?;

        let auth: AuthResponse = decode(data, "authentication response")?;
        debug!("authenticated with portainer in {}", self.base_url);
        Ok(BearerToken::new(auth.jwt))
    }

    /// Id of the first endpoint Portainer reports
    pub async fn get_first_endpoint_id(&self, token: &BearerToken) -> Result<i64> {
        debug!("getting first endpoint id {}", self.base_url);
        let data = self
            .executor
            .execute(Method::GET, &self.url("api/endpoints"), &auth_headers(token), None)
            .await?;
        debug!("received list of endpoints: {}", data);

        let endpoints: Vec<Endpoint> = decode(data, "endpoint list")?;
        endpoints
            .first()
            .map(|endpoint| endpoint.id)
            .ok_or_else(|| {
                StackError::Configuration("portainer does not provide any endpoint".to_string())
            })
    }

    /// Swarm id of an endpoint; `None` resolves the first endpoint
    pub async fn get_swarm_id(&self, token: &BearerToken, endpoint_id: Option<i64>) -> Result<String> {
        debug!("getting swarm id {}", self.base_url);
        let endpoint_id = self.resolve_endpoint(token, endpoint_id).await?;

        let url = self.url(&format!("api/endpoints/{}/docker/swarm", endpoint_id));
        let data = self
            .executor
            .execute(Method::GET, &url, &auth_headers(token), None)
            .await?;
        debug!("received swarm details: {}", data);

        let swarm: SwarmInfo = decode(data, "swarm details")?;
        Ok(swarm.id)
    }

    /// All stacks known to Portainer
    pub async fn list_stacks(&self, token: &BearerToken) -> Result<Vec<Stack>> {
        debug!("getting stacks list {}", self.base_url);
        let data = self
            .executor
            .execute(Method::GET, &self.url("api/stacks"), &auth_headers(token), None)
            .await?;
        debug!("received list of stacks: {}", data);

        decode(data, "stack list")
    }

    /// Id of the stack named exactly `stack_name`, if any
    pub async fn get_current_stack_id(
        &self,
        token: &BearerToken,
        stack_name: &str,
    ) -> Result<Option<String>> {
        debug!("getting current stack id {}", self.base_url);
        let stacks = self.list_stacks(token).await?;

        Ok(stacks
            .into_iter()
            .find(|stack| stack.name == stack_name)
            .map(|stack| stack.id))
    }

    /// Create a swarm stack from `stack_config`
    pub async fn create_stack(
        &self,
        token: &BearerToken,
        swarm_id: &str,
        endpoint_id: Option<i64>,
        stack_name: &str,
        stack_config: &Value,
    ) -> Result<Value> {
        debug!("creating new stack {}", self.base_url);
        let endpoint_id = self.resolve_endpoint(token, endpoint_id).await?;

        let body = serde_json::to_value(CreateStackRequest {
            name: stack_name,
            swarm_id,
            stack_file_content: stack_file_content(stack_config)?,
        })?;

        let mut url = self.url("api/stacks");
        url.query_pairs_mut()
            .append_pair("type", "1")
            .append_pair("method", "string")
            .append_pair("endpointId", &endpoint_id.to_string());

        debug!("sending POST request to {}", url);
        let data = self
            .executor
            .execute(Method::POST, &url, &auth_headers(token), Some(&body))
            .await?;
        debug!("created new stack: {}", data);

        Ok(data)
    }

    /// Replace the content of an existing stack
    ///
    /// A timeout that outlasts every retry is logged and reported as
    /// [`UpdateOutcome::Uncertain`] instead of an error. Other failures
    /// propagate.
    pub async fn update_stack(
        &self,
        token: &BearerToken,
        stack_id: &str,
        endpoint_id: Option<i64>,
        stack_config: &Value,
    ) -> Result<UpdateOutcome> {
        debug!("updating stack {}", self.base_url);
        let endpoint_id = self.resolve_endpoint(token, endpoint_id).await?;

        let stack_file_content = stack_file_content(stack_config)?;
        debug!("StackFileContent: {}", stack_file_content);
        let body = serde_json::to_value(UpdateStackRequest { stack_file_content })?;

        let mut url = self.url(&format!("api/stacks/{}", stack_id));
        url.query_pairs_mut()
            .append_pair("endpointId", &endpoint_id.to_string())
            .append_pair("method", "string")
            .append_pair("type", "1");

        tokio::time::sleep(UPDATE_THROTTLE).await;

        match self
            .executor
            .execute(Method::PUT, &url, &auth_headers(token), Some(&body))
            .await
        {
            Ok(data) => {
                debug!("updated stack: {}", data);
                Ok(UpdateOutcome::Updated(data))
            }
            Err(err) if err.is_timeout() => {
                error!("update of stack {} timed out, state unknown: {}", stack_id, err);
                Ok(UpdateOutcome::Uncertain {
                    reason: err.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn resolve_endpoint(&self, token: &BearerToken, endpoint_id: Option<i64>) -> Result<i64> {
        match endpoint_id {
            Some(id) => Ok(id),
            None => {
                let id = self.get_first_endpoint_id(token).await?;
                debug!("Determined the following endpoint id: {}", id);
                Ok(id)
            }
        }
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url.set_query(None);
        url
    }
}

fn auth_headers(token: &BearerToken) -> Vec<(String, String)> {
    vec![("Authorization".to_string(), token.authorization())]
}

fn decode<D: DeserializeOwned>(data: Value, what: &str) -> Result<D> {
    serde_json::from_value(data)
        .map_err(|e| StackError::UnexpectedResponse(format!("malformed {}: {}", what, e)))
}

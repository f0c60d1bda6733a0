//! Portainer API types

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Bearer token returned by `/api/auth`
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Body of `POST /api/auth`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response of `POST /api/auth`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub jwt: String,
}

/// Registered compute target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Remaining fields, kept as sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `GET /api/endpoints/{id}/docker/swarm`
#[derive(Debug, Clone, Deserialize)]
pub struct SwarmInfo {
    #[serde(rename = "ID")]
    pub id: String,
}

/// Stack record as listed by `GET /api/stacks`
///
/// Portainer 1.x reports string ids and 2.x integer ids; both are kept as
/// an opaque string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    #[serde(rename = "Id", deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    /// Remaining fields, kept as sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn opaque_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Body of `POST /api/stacks`
#[derive(Debug, Clone, Serialize)]
pub struct CreateStackRequest<'a> {
    #[serde(rename = "Name")]
    pub name: &'a str,
    #[serde(rename = "SwarmID")]
    pub swarm_id: &'a str,
    #[serde(rename = "StackFileContent")]
    pub stack_file_content: String,
}

/// Body of `PUT /api/stacks/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStackRequest {
    #[serde(rename = "StackFileContent")]
    pub stack_file_content: String,
}

/// Result of an update call
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Portainer acknowledged the update
    Updated(Value),
    /// Every attempt timed out; the update may or may not have been applied
    Uncertain { reason: String },
}

impl UpdateOutcome {
    pub fn is_uncertain(&self) -> bool {
        matches!(self, UpdateOutcome::Uncertain { .. })
    }
}

/// Serialize a stack configuration the way Portainer stores it
pub fn stack_file_content(stack_config: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(stack_config)?)
}

//! Portainer API client
//!
//! Provides authentication, endpoint/swarm discovery and stack
//! create-or-update against a Portainer instance.

pub mod client;
pub mod executor;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::PortainerClient;
pub use executor::{RequestExecutor, RetryPolicy, RetryScope};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{BearerToken, Endpoint, Stack, UpdateOutcome};

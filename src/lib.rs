//! stackctl - Portainer stack deployment
//!
//! stackctl makes a named Portainer swarm stack match a compose document.
//! It provides:
//!
//! - A Portainer REST client with retrying requests
//! - Endpoint and swarm discovery
//! - Create-or-update deployment of stacks
//! - YAML configuration with environment overrides

pub mod config;
pub mod deploy;
pub mod error;
pub mod portainer;
pub mod stackfile;

pub use error::{Result, StackError};

//! Transport layer for the server
//!
//! All transports implement the [`Transport`] trait and reach the credential
//! store only through the admission actors.
//!
//! # Available Transports
//!
//! - [`http`]: `GET /look` plus health and metrics endpoints

pub mod http;
pub mod origin;


use crate::actor::AdmissionHandle;
use anyhow::Result;
use async_trait::async_trait;

/// Common interface for all transport implementations
///
/// Each transport is responsible for:
/// - Accepting client connections
/// - Extracting the presented key and lookup target
/// - Forwarding admission checks to the actors
/// - Sending responses back to clients
#[async_trait]
pub trait Transport {
    /// Start the transport server
    ///
    /// Runs until an error occurs or the server shuts down.
    async fn start(self, limiter: AdmissionHandle) -> Result<()>;
}

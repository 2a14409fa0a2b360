//! Remote client contract.
//!
//! The server protocol lives outside this crate. Callers implement
//! [`RemoteClient`] on top of their transport; the traits return boxed
//! futures so the pipeline stays object-safe and testable with mocks.

use std::future::Future;
use std::pin::Pin;

use driverpub_settings::{Credentials, ServerEndpoint};

/// Boxed future returned by remote operations.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Failures reported by a remote client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The server host name could not be resolved.
    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server refused the update.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Opens authenticated sessions against the resource-management server.
pub trait RemoteClient: Send + Sync {
    /// Resolves the endpoint and logs in with `credentials`.
    fn connect<'a>(
        &'a self,
        endpoint: &'a ServerEndpoint,
        credentials: &'a Credentials,
    ) -> RemoteFuture<'a, Box<dyn RemoteSession>>;
}

/// One authenticated session, scoped to a single publish call.
///
/// Dropping the session must release its resources; [`close`](Self::close)
/// additionally ends it gracefully on the server.
pub trait RemoteSession: Send + Sync {
    /// Replaces the driver's payload with `archive`.
    fn update_driver<'a>(&'a self, driver_name: &'a str, archive: &'a [u8])
    -> RemoteFuture<'a, ()>;

    /// Creates or replaces a single named resource.
    fn update_entry<'a>(&'a self, name: &'a str, data: &'a [u8]) -> RemoteFuture<'a, ()>;

    /// Ends the session.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

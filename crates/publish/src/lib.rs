//! Driver publish pipeline.
//!
//! This crate implements the **business logic** of publishing a driver
//! project. It has no transport dependencies: the caller supplies a
//! [`RemoteClient`] implementation that talks to the actual server.
//!
//! # Pipeline
//!
//! 1. **Analyze**: walk the target sources through the file filters
//! 2. **Package**: build the driver archive, injecting the debug descriptor
//! 3. **Connect**: open one authenticated session for the whole publish
//! 4. **Update**: send the archive and/or individual entries
//! 5. **Close**: release the session on every exit path

pub mod error;
pub mod publisher;
pub mod remote;
pub mod types;
pub mod updater;

// Re-export primary types for convenience.
pub use error::PublishError;
pub use publisher::Publisher;
pub use remote::{RemoteClient, RemoteError, RemoteFuture, RemoteSession};
pub use types::{PublishEvent, PublishResult, PublishSummary};
pub use updater::Updater;

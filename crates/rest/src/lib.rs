//! HTTP remote client for the resource-management server.
//!
//! Implements the [`RemoteClient`](driverpub_publish::RemoteClient) contract
//! over the server's REST API using `reqwest`.

pub mod client;
pub mod types;

pub use client::{RestClient, RestSession};

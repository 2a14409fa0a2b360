//! Publisher settings for driver deployment.
//!
//! Turns the project's deployment document (JSON) into a validated
//! [`PublisherSettings`] record. The resolver is a pure transform; the
//! only I/O lives in [`load_settings`].

mod error;
mod resolve;
mod types;

pub use error::ConfigError;
pub use resolve::{load_settings, resolve};
pub use types::{Credentials, PublisherSettings, ServerEndpoint, TargetSpec};

/// Name of the deployment settings file in the project root.
pub const DEPLOYMENT_SETTINGS_FILE_NAME: &str = "deployment.json";

/// Port used when the document does not name one.
pub const DEFAULT_PORT: u16 = 9000;

/// Domain used when the document does not name one.
pub const DEFAULT_DOMAIN: &str = "Global";

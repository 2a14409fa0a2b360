//! Settings record types.

use std::fmt;

use driverpub_archive::{FileFilter, TargetSource};

/// Address of the resource-management server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Login credentials for the server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub domain: String,
}

// Keeps the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// A separately published target (`drivers` or `scripts`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Remote name override; drivers fall back to the driver unique name.
    pub name: Option<String>,
    pub source: TargetSource,
}

/// Validated publish settings. Produced once per publish, read-only after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherSettings {
    pub server: ServerEndpoint,
    pub credentials: Credentials,
    pub driver_unique_name: String,
    /// Subfolder of the project holding the driver sources.
    pub source_root_folder: Option<String>,
    pub file_filters: Vec<FileFilter>,
    pub run_from_local_project: bool,
    pub wait_for_debugger: bool,
    pub drivers: Option<TargetSpec>,
    pub scripts: Option<TargetSpec>,
}

impl PublisherSettings {
    /// Source of the single-archive publish: the source root folder, or the
    /// whole project when none is set.
    pub fn source_target(&self) -> TargetSource {
        TargetSource::Directory(self.source_root_folder.clone().unwrap_or_default())
    }

    /// Whether `drivers` and/or `scripts` are declared as separate targets.
    pub fn has_split_targets(&self) -> bool {
        self.drivers.is_some() || self.scripts.is_some()
    }

    /// Remote name the driver archive is published under.
    pub fn driver_name(&self) -> &str {
        self.drivers
            .as_ref()
            .and_then(|spec| spec.name.as_deref())
            .unwrap_or(&self.driver_unique_name)
    }
}

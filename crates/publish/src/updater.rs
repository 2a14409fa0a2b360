//! Bulk and per-entry updaters.
//!
//! Both variants share one `publish` contract against an open
//! [`RemoteSession`]:
//!
//! - **BulkArchive** sends a whole archive as a driver's new payload. The
//!   server accepts or rejects it as a unit.
//! - **PerEntry** sends each named blob on its own. The first failure stops
//!   the run; entries sent before it stay applied remotely (no rollback).

use std::collections::BTreeMap;

use driverpub_archive::ArchiveHandle;
use tracing::{debug, info, warn};

use crate::error::PublishError;
use crate::remote::RemoteSession;

/// A prepared update, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Updater {
    BulkArchive {
        driver_name: String,
        archive: ArchiveHandle,
    },
    PerEntry {
        entries: BTreeMap<String, Vec<u8>>,
    },
}

impl Updater {
    pub fn bulk(driver_name: impl Into<String>, archive: ArchiveHandle) -> Self {
        Self::BulkArchive {
            driver_name: driver_name.into(),
            archive,
        }
    }

    pub fn per_entry(entries: BTreeMap<String, Vec<u8>>) -> Self {
        Self::PerEntry { entries }
    }

    /// Sends the update and returns the remote names that were updated.
    pub async fn publish(&self, session: &dyn RemoteSession) -> Result<Vec<String>, PublishError> {
        match self {
            Self::BulkArchive {
                driver_name,
                archive,
            } => {
                let data = tokio::fs::read(&archive.path).await?;
                debug!(
                    driver = %driver_name,
                    bytes = data.len(),
                    sha256 = %archive.sha256,
                    "uploading driver archive"
                );
                session
                    .update_driver(driver_name, &data)
                    .await
                    .map_err(|e| PublishError::remote(driver_name, e))?;
                info!(driver = %driver_name, "driver updated");
                Ok(vec![driver_name.clone()])
            }
            Self::PerEntry { entries } => {
                let mut updated = Vec::with_capacity(entries.len());
                for (name, data) in entries {
                    if let Err(e) = session.update_entry(name, data).await {
                        warn!(
                            entry = %name,
                            applied = updated.len(),
                            error = %e,
                            "entry update failed, earlier entries remain applied"
                        );
                        return Err(PublishError::remote(name, e));
                    }
                    debug!(entry = %name, bytes = data.len(), "entry updated");
                    updated.push(name.clone());
                }
                Ok(updated)
            }
        }
    }

    /// Remote names this updater will touch.
    pub fn targets(&self) -> Vec<String> {
        match self {
            Self::BulkArchive { driver_name, .. } => vec![driver_name.clone()],
            Self::PerEntry { entries } => entries.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{RemoteError, RemoteFuture};
    use std::collections::{HashMap, HashSet};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    /// Mock session that records updates and fails for selected names.
    #[derive(Default)]
    struct MockSession {
        failing: HashSet<String>,
        drivers: Mutex<HashMap<String, Vec<u8>>>,
        entries: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl MockSession {
        fn failing_on(name: &str) -> Self {
            Self {
                failing: HashSet::from([name.to_string()]),
                ..Default::default()
            }
        }

        fn entry_names(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|(n, _)| n.clone())
                .collect()
        }
    }

    impl RemoteSession for MockSession {
        fn update_driver<'a>(
            &'a self,
            driver_name: &'a str,
            archive: &'a [u8],
        ) -> RemoteFuture<'a, ()> {
            Box::pin(async move {
                if self.failing.contains(driver_name) {
                    return Err(RemoteError::Rejected("driver locked".into()));
                }
                self.drivers
                    .lock()
                    .unwrap()
                    .insert(driver_name.to_string(), archive.to_vec());
                Ok(())
            })
        }

        fn update_entry<'a>(&'a self, name: &'a str, data: &'a [u8]) -> RemoteFuture<'a, ()> {
            Box::pin(async move {
                if self.failing.contains(name) {
                    return Err(RemoteError::Rejected("write refused".into()));
                }
                self.entries
                    .lock()
                    .unwrap()
                    .push((name.to_string(), data.to_vec()));
                Ok(())
            })
        }

        fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async {})
        }
    }

    fn entries(names: &[&str]) -> BTreeMap<String, Vec<u8>> {
        names
            .iter()
            .map(|n| (n.to_string(), n.as_bytes().to_vec()))
            .collect()
    }

    fn archive_on_disk(dir: &std::path::Path, data: &[u8]) -> ArchiveHandle {
        let path = dir.join("driver.zip");
        std::fs::write(&path, data).unwrap();
        ArchiveHandle {
            path,
            size: data.len() as u64,
            sha256: String::new(),
            entries: 1,
        }
    }

    #[tokio::test]
    async fn bulk_sends_whole_archive() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::default();
        let updater = Updater::bulk("MyDriver", archive_on_disk(dir.path(), b"PK-archive"));

        let updated = updater.publish(&session).await.unwrap();

        assert_eq!(updated, vec!["MyDriver".to_string()]);
        assert_eq!(session.drivers.lock().unwrap()["MyDriver"], b"PK-archive");
    }

    #[tokio::test]
    async fn bulk_rejection_names_driver() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::failing_on("MyDriver");
        let updater = Updater::bulk("MyDriver", archive_on_disk(dir.path(), b"PK"));

        let err = updater.publish(&session).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::RemoteUpdate { ref target, .. } if target == "MyDriver"
        ));
        assert!(session.drivers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bulk_missing_archive_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = archive_on_disk(dir.path(), b"PK");
        handle.path = dir.path().join("gone.zip");

        let err = Updater::bulk("MyDriver", handle)
            .publish(&MockSession::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Io(_)));
    }

    #[tokio::test]
    async fn per_entry_sends_each_entry() {
        let session = MockSession::default();
        let updater = Updater::per_entry(entries(&["a.py", "b.py", "c.py"]));

        let updated = updater.publish(&session).await.unwrap();

        assert_eq!(updated, vec!["a.py", "b.py", "c.py"]);
        assert_eq!(session.entry_names(), vec!["a.py", "b.py", "c.py"]);
    }

    #[tokio::test]
    async fn per_entry_failure_keeps_earlier_entries() {
        let session = MockSession::failing_on("b.py");
        let updater = Updater::per_entry(entries(&["a.py", "b.py", "c.py"]));

        let err = updater.publish(&session).await.unwrap_err();

        match err {
            PublishError::RemoteUpdate { target, reason } => {
                assert_eq!(target, "b.py");
                assert!(reason.contains("write refused"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // a.py stays applied; c.py is never attempted.
        assert_eq!(session.entry_names(), vec!["a.py"]);
    }

    #[tokio::test]
    async fn per_entry_empty_is_noop() {
        let session = MockSession::default();
        let updated = Updater::per_entry(BTreeMap::new())
            .publish(&session)
            .await
            .unwrap();
        assert!(updated.is_empty());
    }

    #[test]
    fn targets_lists_remote_names() {
        let updater = Updater::per_entry(entries(&["x.py", "y.py"]));
        assert_eq!(updater.targets(), vec!["x.py", "y.py"]);

        let bulk = Updater::bulk(
            "D",
            ArchiveHandle {
                path: "d.zip".into(),
                size: 0,
                sha256: String::new(),
                entries: 0,
            },
        );
        assert_eq!(bulk.targets(), vec!["D"]);
    }
}

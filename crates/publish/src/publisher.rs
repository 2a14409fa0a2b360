//! Publish pipeline.
//!
//! Runs resolve-time settings through analysis, packaging and the remote
//! update as one sequential unit of work. Blocking filesystem work runs on
//! the blocking pool; network calls race the cancellation token.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use driverpub_archive::{
    Analyzer, ArchiveHandle, ArchiveManifest, DEBUG_DESCRIPTOR_NAME, EntrySource, FileFilter,
    TargetSource, debug_descriptor, default_archive_path,
};
use driverpub_settings::{DEPLOYMENT_SETTINGS_FILE_NAME, PublisherSettings};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::PublishError;
use crate::remote::{RemoteClient, RemoteSession};
use crate::types::{PublishEvent, PublishResult, PublishSummary};
use crate::updater::Updater;

/// Target name used when the session itself cannot be opened.
const SESSION_TARGET: &str = "session";

/// Publishes one project to the remote server.
pub struct Publisher {
    settings: PublisherSettings,
    project_root: PathBuf,
    archive_path: PathBuf,
    client: Arc<dyn RemoteClient>,
    events_tx: Option<mpsc::Sender<PublishEvent>>,
}

impl Publisher {
    /// Creates a publisher for the project at `project_root`.
    ///
    /// The driver archive goes to `<project>/deployment/<driver>.zip` unless
    /// overridden with [`with_archive_path`](Self::with_archive_path).
    pub fn new(
        settings: PublisherSettings,
        project_root: impl Into<PathBuf>,
        client: Arc<dyn RemoteClient>,
    ) -> Self {
        let project_root = project_root.into();
        let project_root = std::path::absolute(&project_root).unwrap_or(project_root);
        let archive_path = default_archive_path(&project_root, settings.driver_name());
        Self {
            settings,
            project_root,
            archive_path,
            client,
            events_tx: None,
        }
    }

    /// Sends progress events to `events_tx`.
    pub fn with_events(mut self, events_tx: mpsc::Sender<PublishEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    pub fn with_archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = path.into();
        self
    }

    pub fn settings(&self) -> &PublisherSettings {
        &self.settings
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Publishes according to the settings shape: separate `drivers` /
    /// `scripts` targets go through [`publish_entries`](Self::publish_entries),
    /// anything else through [`publish_archive`](Self::publish_archive).
    pub async fn publish(&self, cancel: &CancellationToken) -> PublishResult {
        if self.settings.has_split_targets() {
            self.publish_entries(cancel).await
        } else {
            self.publish_archive(cancel).await
        }
    }

    /// Runs [`publish`](Self::publish) on a tokio task so the caller's
    /// thread is never blocked.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<PublishResult> {
        tokio::spawn(async move { self.publish(&cancel).await })
    }

    /// Builds the driver archive without touching the network.
    pub async fn package(&self) -> Result<ArchiveHandle, PublishError> {
        let manifest = self.analyze_driver(&self.settings.source_target()).await?;
        if manifest.is_empty() {
            return Err(PublishError::NothingToPublish);
        }
        self.build_archive(manifest).await
    }

    /// Packages the source root into one archive and uploads it as the
    /// driver's new payload.
    pub async fn publish_archive(&self, cancel: &CancellationToken) -> PublishResult {
        let result = self.run_archive(cancel).await;
        self.finish(result).await
    }

    /// Publishes the `drivers` target as an archive and the `scripts` target
    /// entry by entry, over one session.
    pub async fn publish_entries(&self, cancel: &CancellationToken) -> PublishResult {
        let result = self.run_entries(cancel).await;
        self.finish(result).await
    }

    async fn run_archive(&self, cancel: &CancellationToken) -> PublishResult {
        self.emit_progress(0.0, "Analyzing sources...").await;
        check_cancelled(cancel)?;

        let manifest = self.analyze_driver(&self.settings.source_target()).await?;
        if manifest.is_empty() {
            return Err(PublishError::NothingToPublish);
        }

        self.emit_progress(0.2, "Building archive...").await;
        check_cancelled(cancel)?;
        let archive = self.build_archive(manifest).await?;

        self.emit_progress(0.5, "Uploading driver...").await;
        let updaters = vec![Updater::bulk(self.settings.driver_name(), archive.clone())];
        let updated = self.run_remote(&updaters, cancel).await?;

        Ok(PublishSummary {
            archive: Some(archive),
            updated,
        })
    }

    async fn run_entries(&self, cancel: &CancellationToken) -> PublishResult {
        self.emit_progress(0.0, "Analyzing sources...").await;
        check_cancelled(cancel)?;

        let drivers = match &self.settings.drivers {
            Some(spec) => self.analyze_driver(&spec.source).await?,
            None => ArchiveManifest::new(),
        };
        let scripts = match &self.settings.scripts {
            Some(spec) => {
                let mut manifest = self.analyze(&spec.source).await?;
                drop_reserved(&mut manifest, &self.reserved_paths(true));
                manifest
            }
            None => ArchiveManifest::new(),
        };

        debug!(
            drivers = drivers.len(),
            scripts = scripts.len(),
            "targets analyzed"
        );
        if drivers.is_empty() && scripts.is_empty() {
            return Err(PublishError::NothingToPublish);
        }

        self.emit_progress(0.2, "Preparing updates...").await;
        check_cancelled(cancel)?;

        let mut updaters = Vec::with_capacity(2);
        let mut archive = None;
        if !drivers.is_empty() {
            let handle = self.build_archive(drivers).await?;
            updaters.push(Updater::bulk(self.settings.driver_name(), handle.clone()));
            archive = Some(handle);
        }
        if !scripts.is_empty() {
            updaters.push(Updater::per_entry(read_entries(scripts).await?));
        }

        self.emit_progress(0.5, "Uploading...").await;
        let updated = self.run_remote(&updaters, cancel).await?;

        Ok(PublishSummary { archive, updated })
    }

    /// Opens one session, applies `updaters` in order, and releases the
    /// session whatever the outcome.
    async fn run_remote(
        &self,
        updaters: &[Updater],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, PublishError> {
        check_cancelled(cancel)?;

        let server = &self.settings.server;
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            r = self.client.connect(server, &self.settings.credentials) => {
                r.map_err(|e| PublishError::remote(SESSION_TARGET, e))?
            }
        };
        let targets: Vec<String> = updaters.iter().flat_map(Updater::targets).collect();
        debug!(server = %server, targets = ?targets, "session opened");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PublishError::Cancelled),
            r = apply_all(session.as_ref(), updaters) => r,
        };

        // A cancelled publish abandons the session without waiting on the
        // server; dropping it releases the connection.
        if !matches!(result, Err(PublishError::Cancelled)) {
            session.close().await;
            debug!(server = %server, "session closed");
        }
        result
    }

    /// Analyzes a driver target, keeping the archive's reserved and output
    /// paths out of it.
    async fn analyze_driver(&self, source: &TargetSource) -> Result<ArchiveManifest, PublishError> {
        let mut manifest = self.analyze(source).await?;

        if manifest.remove(DEBUG_DESCRIPTOR_NAME).is_some() {
            warn!(
                entry = DEBUG_DESCRIPTOR_NAME,
                "ignoring project file with reserved archive name"
            );
        }

        drop_reserved(&mut manifest, &self.reserved_paths(false));
        Ok(manifest)
    }

    /// Files the publisher itself reads or writes: the previously built
    /// archive and, when `with_settings` is set, the settings file.
    fn reserved_paths(&self, with_settings: bool) -> Vec<PathBuf> {
        let mut paths = vec![self.archive_path.clone()];
        if with_settings {
            paths.push(self.project_root.join(DEPLOYMENT_SETTINGS_FILE_NAME));
        }
        paths
            .into_iter()
            .filter_map(|p| std::fs::canonicalize(p).ok())
            .collect()
    }

    async fn analyze(&self, source: &TargetSource) -> Result<ArchiveManifest, PublishError> {
        let analyzer = Analyzer::for_target(&self.project_root, source);
        let filters: Vec<FileFilter> = self.settings.file_filters.clone();

        tokio::task::spawn_blocking(move || analyzer.analyze(&filters))
            .await
            .map_err(PublishError::join)?
            .map_err(PublishError::analysis)
    }

    async fn build_archive(&self, manifest: ArchiveManifest) -> Result<ArchiveHandle, PublishError> {
        let extras = self.synthetic_entries();
        let destination = self.archive_path.clone();

        let handle = tokio::task::spawn_blocking(move || {
            driverpub_archive::build(&manifest, &extras, &destination)
        })
        .await
        .map_err(PublishError::join)?
        .map_err(PublishError::build)?;

        info!(
            path = %handle.path.display(),
            entries = handle.entries,
            bytes = handle.size,
            "driver archive ready"
        );
        Ok(handle)
    }

    /// Entries generated in memory rather than read from the project.
    fn synthetic_entries(&self) -> BTreeMap<String, Vec<u8>> {
        let mut extras = BTreeMap::new();
        if self.settings.run_from_local_project {
            extras.insert(
                DEBUG_DESCRIPTOR_NAME.to_string(),
                debug_descriptor(&self.project_root, self.settings.wait_for_debugger),
            );
        }
        extras
    }

    async fn finish(&self, result: PublishResult) -> PublishResult {
        match &result {
            Ok(summary) => {
                self.emit_progress(1.0, "Publish complete!").await;
                self.emit(PublishEvent::Completed).await;
                info!(updated = ?summary.updated, "publish completed");
            }
            Err(e) => {
                let err_msg = e.to_string();
                self.emit(PublishEvent::Failed {
                    error: err_msg.clone(),
                })
                .await;
                error!(error = %err_msg, "publish failed");
            }
        }
        result
    }

    async fn emit_progress(&self, progress: f64, status: &str) {
        self.emit(PublishEvent::Progress {
            progress,
            status: status.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: PublishEvent) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Removes file entries whose real path is one of `reserved`.
fn drop_reserved(manifest: &mut ArchiveManifest, reserved: &[PathBuf]) {
    if reserved.is_empty() {
        return;
    }
    let hits: Vec<String> = manifest
        .iter()
        .filter(|(_, source)| match source {
            EntrySource::File(path) => std::fs::canonicalize(path)
                .map(|real| reserved.contains(&real))
                .unwrap_or(false),
            EntrySource::Bytes(_) => false,
        })
        .map(|(name, _)| name.to_string())
        .collect();
    for name in hits {
        debug!(entry = %name, "skipping publisher input/output file");
        manifest.remove(&name);
    }
}

async fn apply_all(
    session: &dyn RemoteSession,
    updaters: &[Updater],
) -> Result<Vec<String>, PublishError> {
    let mut updated = Vec::new();
    for updater in updaters {
        updated.extend(updater.publish(session).await?);
    }
    Ok(updated)
}

/// Loads every manifest entry into memory for per-entry updates.
async fn read_entries(manifest: ArchiveManifest) -> Result<BTreeMap<String, Vec<u8>>, PublishError> {
    tokio::task::spawn_blocking(move || {
        manifest
            .iter()
            .map(|(name, source)| -> Result<(String, Vec<u8>), PublishError> {
                let data = match source {
                    EntrySource::File(path) => std::fs::read(path)?,
                    EntrySource::Bytes(data) => data.clone(),
                };
                Ok((name.to_string(), data))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
    })
    .await
    .map_err(PublishError::join)?
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), PublishError> {
    if cancel.is_cancelled() {
        Err(PublishError::Cancelled)
    } else {
        Ok(())
    }
}

//! Command-line wiring: settings, remote client, cancellation and output.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use driverpub_publish::{PublishError, PublishEvent, PublishResult, Publisher};
use driverpub_rest::RestClient;
use driverpub_settings::load_settings;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SUCCESS_MESSAGE: &str = "successfully published items";

/// Packages a driver project and publishes it to the server.
#[derive(Debug, Parser)]
#[command(name = "driverpub", version)]
pub struct Args {
    /// Project directory containing deployment.json.
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    pub mode: Mode,

    /// Build the driver archive and stop.
    #[arg(long)]
    pub package_only: bool,

    /// Talk to the server over HTTPS.
    #[arg(long)]
    pub tls: bool,
}

/// Which publish flow to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Pick from the settings: split targets publish entries, else an archive.
    Auto,
    Archive,
    Entries,
}

/// Runs one publish and prints its outcome. Returns whether it succeeded.
pub async fn run(args: Args) -> anyhow::Result<bool> {
    let settings = match load_settings(&args.project) {
        Ok(s) => s,
        Err(e) => {
            report(&Err(PublishError::from(e)));
            return Ok(false);
        }
    };
    info!(
        driver = %settings.driver_name(),
        server = %settings.server,
        "settings loaded"
    );

    let mut client = RestClient::new()?;
    if args.tls {
        client = client.with_tls();
    }

    let (events_tx, events_rx) = mpsc::channel(32);
    let publisher = Publisher::new(settings, &args.project, Arc::new(client)).with_events(events_tx);
    let events = tokio::spawn(log_events(events_rx));

    if args.package_only {
        let result = publisher.package().await;
        drop(publisher);
        let _ = events.await;
        return Ok(match result {
            Ok(handle) => {
                println!("archive written to {}", handle.path.display());
                true
            }
            Err(e) => {
                eprintln!("Failed packaging driver: {e}");
                false
            }
        });
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("SIGINT received, cancelling publish");
            signal_cancel.cancel();
        }
    });

    let publisher = Arc::new(publisher);
    let result = match args.mode {
        Mode::Auto => publisher.clone().spawn(cancel).await?,
        Mode::Archive => publisher.publish_archive(&cancel).await,
        Mode::Entries => publisher.publish_entries(&cancel).await,
    };
    drop(publisher);
    let _ = events.await;

    report(&result);
    Ok(result.is_ok())
}

async fn log_events(mut rx: mpsc::Receiver<PublishEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PublishEvent::Progress { progress, status } => {
                debug!(progress, "{status}");
            }
            PublishEvent::Completed => debug!("publish completed"),
            PublishEvent::Failed { error } => debug!(%error, "publish failed"),
        }
    }
}

fn report(result: &PublishResult) {
    let message = outcome_message(result);
    if result.is_ok() {
        println!("{message}");
    } else {
        eprintln!("{message}");
    }
}

/// User-facing line for a publish outcome.
pub fn outcome_message(result: &PublishResult) -> String {
    match result {
        Ok(_) => SUCCESS_MESSAGE.to_string(),
        Err(PublishError::UnknownHost(_)) => "Failed uploading file: Unknown Host".to_string(),
        Err(e) => format!("Failed uploading file: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driverpub_publish::PublishSummary;

    #[test]
    fn success_message() {
        assert_eq!(
            outcome_message(&Ok(PublishSummary::default())),
            "successfully published items"
        );
    }

    #[test]
    fn unknown_host_message() {
        let result = Err(PublishError::UnknownHost("cs.local".into()));
        assert_eq!(
            outcome_message(&result),
            "Failed uploading file: Unknown Host"
        );
    }

    #[test]
    fn other_failures_carry_cause() {
        let result = Err(PublishError::NothingToPublish);
        assert_eq!(
            outcome_message(&result),
            "Failed uploading file: no items found for publishing"
        );

        let result = Err(PublishError::RemoteUpdate {
            target: "setup.py".into(),
            reason: "500".into(),
        });
        assert!(outcome_message(&result).contains("setup.py"));
    }

    #[test]
    fn args_defaults() {
        let args = Args::parse_from(["driverpub"]);
        assert_eq!(args.project, PathBuf::from("."));
        assert_eq!(args.mode, Mode::Auto);
        assert!(!args.package_only);
        assert!(!args.tls);
    }

    #[test]
    fn args_mode_and_flags() {
        let args = Args::parse_from([
            "driverpub",
            "--project",
            "/work/driver",
            "--mode",
            "entries",
            "--package-only",
        ]);
        assert_eq!(args.project, PathBuf::from("/work/driver"));
        assert_eq!(args.mode, Mode::Entries);
        assert!(args.package_only);
    }

    #[tokio::test]
    async fn missing_settings_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from(["driverpub", "--project", dir.path().to_str().unwrap()]);
        assert!(!run(args).await.unwrap());
    }
}

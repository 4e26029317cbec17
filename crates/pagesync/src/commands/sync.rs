//! `pagesync sync` command implementation.

use std::future::Future;
use std::io;
use std::path::PathBuf;

use clap::Args;
use pagesync_config::{AuthConfig, CliSettings, Config, ConfluenceConfig};
use pagesync_confluence::{
    Authentication, CancelHandle, ClientConfig, ConfluenceClient, JsonIdentityStore, SkipReason,
    SyncConfig, SyncEngine, SyncOutcome, SyncReport, TransformOptions,
};
use tracing::warn;

use crate::error::CliError;
use crate::manifest;
use crate::output::{Output, Tone};

/// Arguments for the sync command.
#[derive(Args)]
pub(crate) struct SyncArgs {
    /// Path to the document manifest (JSON).
    manifest: PathBuf,

    /// Path to configuration file (default: auto-discover pagesync.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report what would change without modifying Confluence.
    #[arg(long)]
    dry_run: bool,

    /// Delete pages whose documents are no longer in the manifest.
    #[arg(long)]
    delete: bool,

    /// Number of documents processed concurrently.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl SyncArgs {
    /// Execute the sync command.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or any document failed to sync.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            dry_run: self.dry_run.then_some(true),
            delete_orphans: self.delete.then_some(true),
            workers: self.workers,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let confluence = config.require_confluence()?;

        let documents = manifest::load(&self.manifest)?;
        output.info(&format!(
            "Syncing {} documents to {} (space {})...",
            documents.len(),
            confluence.base_url,
            confluence.space_key
        ));

        let client = ConfluenceClient::new(client_config(confluence));
        let store = JsonIdentityStore::open(&config.state_path)?;
        let engine = SyncEngine::new(&client, &store, sync_config(&config, confluence));
        cancel_on_interrupt(engine.cancel_handle());
        let report = engine.sync(&documents);

        if confluence.dry_run {
            output.highlight("\n[DRY RUN] No changes made.");
        } else {
            store.save()?;
        }
        print_report(&output, &report);

        if report.is_success() {
            Ok(())
        } else {
            Err(CliError::SyncFailed(report.failed()))
        }
    }
}

/// Cancel the run on Ctrl-C.
///
/// The signal is awaited on a detached thread with its own runtime. Documents
/// already in flight finish; everything else is reported as cancelled.
fn cancel_on_interrupt(cancel: CancelHandle) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!("Ctrl-C will not cancel the sync: {e}");
            return;
        }
    };
    let spawned = std::thread::Builder::new()
        .name("pagesync-interrupt".to_owned())
        .spawn(move || runtime.block_on(cancel_when(tokio::signal::ctrl_c(), cancel)));
    if let Err(e) = spawned {
        warn!("Ctrl-C will not cancel the sync: {e}");
    }
}

async fn cancel_when(signal: impl Future<Output = io::Result<()>>, cancel: CancelHandle) {
    match signal.await {
        Ok(()) => {
            warn!("Interrupted, waiting for in-flight documents");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
    }
}

fn client_config(confluence: &ConfluenceConfig) -> ClientConfig {
    ClientConfig {
        base_url: confluence.base_url.clone(),
        space_key: confluence.space_key.clone(),
        auth: authentication(&confluence.auth),
        dry_run: confluence.dry_run,
    }
}

fn authentication(auth: &AuthConfig) -> Authentication {
    match auth.clone() {
        AuthConfig::Basic { email, api_token } => Authentication::Basic { email, api_token },
        AuthConfig::OAuth2 { access_token } => Authentication::OAuth2 { access_token },
        AuthConfig::Jwt {
            issuer,
            secret,
            expiry_seconds,
        } => Authentication::Jwt {
            issuer,
            secret,
            expiry_seconds,
        },
    }
}

fn sync_config(config: &Config, confluence: &ConfluenceConfig) -> SyncConfig {
    SyncConfig {
        root_page_id: confluence.root_page_id.clone(),
        root_page_name: confluence.root_page_name.clone(),
        dry_run: confluence.dry_run,
        delete_orphans: config.sync.delete_orphans,
        workers: config.sync.workers,
        transform: TransformOptions {
            code_blocks: config.sync.code_blocks,
            notice_message: config.sync.notice_message.clone(),
        },
    }
}

fn print_report(output: &Output, report: &SyncReport) {
    output.info("");
    for result in &report.results {
        let id = result.page_id.as_deref().unwrap_or("-");
        let line = format!(
            "  {:<9} {} ({id})",
            outcome_label(&result.outcome),
            result.relative_path
        );
        output.line(tone(&result.outcome), &line);
    }

    for (result, cause) in report.failures() {
        output.error(&format!("\n{}: {cause}", result.relative_path));
    }

    output.highlight(&format!(
        "\n{} created, {} updated, {} deleted, {} skipped, {} failed",
        report.created(),
        report.updated(),
        report.deleted(),
        report.skipped(),
        report.failed()
    ));
}

fn tone(outcome: &SyncOutcome) -> Tone {
    match outcome {
        SyncOutcome::Created | SyncOutcome::Updated | SyncOutcome::Deleted => Tone::Changed,
        SyncOutcome::Skipped(SkipReason::Unchanged | SkipReason::SyncDisabled) => Tone::Quiet,
        SyncOutcome::Skipped(_) => Tone::Attention,
        SyncOutcome::Failed(_) => Tone::Failure,
    }
}

fn outcome_label(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Created => "created",
        SyncOutcome::Updated => "updated",
        SyncOutcome::Deleted => "deleted",
        SyncOutcome::Skipped(SkipReason::Unchanged) => "unchanged",
        SyncOutcome::Skipped(SkipReason::SyncDisabled) => "disabled",
        SyncOutcome::Skipped(SkipReason::ParentFailed { .. }) => "blocked",
        SyncOutcome::Skipped(SkipReason::Cancelled) => "cancelled",
        SyncOutcome::Failed(_) => "failed",
    }
}

//! `worktime sync`: reconcile local registrations with the remote store.
//!
//! The synchronization runs on the blocking pool while a sync lock observes
//! it and prints progress. Ctrl-C asks the running session to stop. Any
//! failure, cancellation included, exits non-zero.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;

use worktime_core::{paths, Config, RegistrationStore, YamlStore};
use worktime_list::PaginatedListController;
use worktime_sync::{
    LockEvent, LockExit, SyncAccount, SyncAccountService, SyncLockCoordinator, SyncOutcome,
    SyncReport, SyncStatus,
};

use super::{home_dir, open_local_store};

/// Arguments for `worktime sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only report failures.
    #[arg(long)]
    pub quiet: bool,

    /// Remote registrations file (defaults to `~/.worktime/remote/registrations.yaml`).
    #[arg(long)]
    pub remote: Option<PathBuf>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let config = Config::load_at(&home).context("failed to load configuration")?;
        let local = Arc::new(open_local_store(&home)?);
        let remote_path = self
            .remote
            .clone()
            .unwrap_or_else(|| paths::remote_store_path(&home));
        let remote = Arc::new(
            YamlStore::open_at(remote_path.clone())
                .with_context(|| format!("failed to open remote store at {}", remote_path.display()))?,
        );

        let runtime = super::runtime()?;
        let report = runtime.block_on(self.synchronize(&config, local.clone(), remote))?;

        if !self.quiet {
            print_report(&report);
        }
        if report.dataset_changed() {
            let store: Arc<dyn RegistrationStore> = local;
            let mut list = PaginatedListController::new(store, &config.list);
            list.invalidate()
                .context("failed to reload registrations after sync")?;
            if !self.quiet {
                println!("Latest registrations:");
                super::list::print_rows(list.rows());
            }
        }
        Ok(())
    }

    async fn synchronize(
        &self,
        config: &Config,
        local: Arc<YamlStore>,
        remote: Arc<YamlStore>,
    ) -> Result<SyncReport> {
        let account = Arc::new(SyncAccount::new());
        let mut status = account.watch_status();
        let worker = {
            let account = account.clone();
            tokio::task::spawn_blocking(move || account.synchronize(local.as_ref(), remote.as_ref()))
        };

        // Observe only once the session has left idle; a lock activated
        // earlier would see an idle account and complete immediately.
        status
            .wait_for(|status| *status != SyncStatus::Idle)
            .await
            .context("sync account went away before the run began")?;

        let service: Arc<dyn SyncAccountService> = account.clone();
        let coordinator = SyncLockCoordinator::new(service, config.sync.clone());
        let mut lock = coordinator.activate()?;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;
        loop {
            tokio::select! {
                event = lock.next_event() => match event {
                    Some(LockEvent::Progress(action)) if !self.quiet => {
                        println!("  {} {action}", "·".bright_black());
                    }
                    Some(LockEvent::Progress(_)) => {}
                    Some(LockEvent::Completed(outcome)) => {
                        tracing::debug!(outcome = ?outcome, "sync lock completed");
                    }
                    None => break,
                },
                _ = &mut ctrl_c, if !interrupted => {
                    interrupted = true;
                    eprintln!("{} cancelling synchronization…", "!".yellow());
                    account.cancel();
                }
            }
        }
        let exit = lock.wait().await?;

        let result = worker
            .await
            .map_err(|err| anyhow!("sync task join error: {err}"))?;
        match (result, exit) {
            (Ok(report), LockExit::Completed(SyncOutcome::Success)) => {
                if !self.quiet {
                    println!("{} synchronization completed", "✓".green());
                }
                Ok(report)
            }
            (Ok(_), exit) => Err(anyhow!("synchronization ended unexpectedly ({exit:?})")),
            (Err(err), _) => {
                let reason = account
                    .last_sync_history()
                    .and_then(|history| history.failure_reason)
                    .unwrap_or_else(|| err.to_string());
                eprintln!("{} synchronization failed: {reason}", "✗".red());
                Err(err).context("sync failed")
            }
        }
    }
}

fn print_report(report: &SyncReport) {
    if report == &SyncReport::default() {
        println!("Everything up to date.");
        return;
    }
    println!(
        "pushed {}, pulled {}, updated {} remote / {} local",
        report.pushed, report.pulled, report.updated_remote, report.updated_local
    );
    if !report.ghosts.is_empty() {
        let ids: Vec<String> = report.ghosts.iter().map(ToString::to_string).collect();
        println!(
            "{} removed {} registration(s) deleted remotely: {}",
            "!".yellow(),
            report.ghosts.len(),
            ids.join(", ")
        );
    }
}

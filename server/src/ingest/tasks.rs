//! Scheduler-facing glue (spec §6 "Scheduler contract"): owns one
//! `IngestionCoordinator` per configured account and runs them concurrently
//! on each tick. The scheduling *policy* (cron expressions, which cadence is
//! active) lives in `main.rs`'s `tokio-cron-scheduler` wiring — this module
//! only knows how to run one pass and report what happened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::ingest::blacklist::BlacklistEngine;
use crate::ingest::coordinator::IngestionCoordinator;
use crate::ingest::provider::gmail::GmailProvider;
use crate::ingest::provider::MailProviderAdapter;
use crate::ingest::store::EntityStore;
use crate::server_config::AccountConfig;

/// Everything one account's ingestion needs across ticks: its provider
/// client and a flag tracking whether it has caught up, so the scheduler can
/// decide whether the 1-minute or 15-minute cron job should run it this
/// round.
struct AccountRuntime {
    account: AccountConfig,
    provider: GmailProvider,
    caught_up: AtomicBool,
}

/// Owns every account's ingestion state for the life of the process.
/// Constructed once at startup and shared (via `Arc`) between the two cron
/// jobs `main.rs` registers.
pub struct IngestRuntime {
    store: EntityStore,
    blacklist: BlacklistEngine,
    accounts: Vec<AccountRuntime>,
    batch_page_size: u64,
    sync_budget_secs: u64,
}

impl IngestRuntime {
    pub fn new(
        conn: DatabaseConnection,
        accounts: Vec<AccountConfig>,
        whitelist_domains: &[String],
        http_client: reqwest::Client,
        batch_page_size: u64,
        sync_budget_secs: u64,
    ) -> Self {
        let store = EntityStore::new(conn.clone());
        let blacklist = BlacklistEngine::new(conn, whitelist_domains);
        let accounts = accounts
            .into_iter()
            .map(|account| {
                let provider = GmailProvider::new(http_client.clone(), account.refresh_token.clone());
                AccountRuntime { account, provider, caught_up: AtomicBool::new(false) }
            })
            .collect();

        Self { store, blacklist, accounts, batch_page_size, sync_budget_secs }
    }

    /// True once every account has reported caught-up at least once. Before
    /// that, `main.rs` keeps the 1-minute catch-up cadence running instead of
    /// the 15-minute one.
    pub fn all_caught_up(&self) -> bool {
        self.accounts.iter().all(|a| a.caught_up.load(Ordering::Relaxed))
    }

    /// Runs every account's `IngestionCoordinator::run_once` concurrently and
    /// logs a per-account summary. A single account's failure is logged and
    /// does not prevent the others from running.
    pub async fn run_sync_pass(self: &Arc<Self>) {
        let budget = Duration::from_secs(self.sync_budget_secs);
        let mut handles = Vec::with_capacity(self.accounts.len());

        for account_runtime in &self.accounts {
            let runtime = Arc::clone(self);
            let label = account_runtime.account.label.clone();
            let self_address = account_runtime.account.self_address.clone();
            let page_size = self.batch_page_size;

            let handle = tokio::spawn(async move {
                let account_runtime =
                    runtime.accounts.iter().find(|a| a.account.label == label).expect("account present for its own label");
                let coordinator = IngestionCoordinator::new(
                    &label,
                    &self_address,
                    &runtime.store,
                    &runtime.blacklist,
                    &account_runtime.provider as &dyn MailProviderAdapter,
                );

                match coordinator.run_once(page_size, budget).await {
                    Ok(result) => {
                        if result.caught_up {
                            account_runtime.caught_up.store(true, Ordering::Relaxed);
                        }
                        tracing::info!(
                            account = %label,
                            mode = ?result.mode,
                            messages_seen = result.messages_seen,
                            messages_processed = result.messages_processed,
                            companies_created = result.companies_created,
                            domains_created = result.domains_created,
                            contacts_created = result.contacts_created,
                            emails_created = result.emails_created,
                            caught_up = result.caught_up,
                            errors = result.errors.len(),
                            "ingestion pass complete"
                        );
                        for err in &result.errors {
                            tracing::warn!(account = %label, "message processing error: {err}");
                        }
                    }
                    Err(e) => {
                        tracing::error!(account = %label, error = ?e, "ingestion pass failed");
                    }
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            if let Err(join_err) = handle.await {
                tracing::error!(error = ?join_err, "ingestion task panicked");
            }
        }
    }
}

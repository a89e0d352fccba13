// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Account-level sync orchestration.
//!
//! One pass runs folder discovery for every enabled service, then syncs
//! each contact folder: pull remote changes, push local edits, and pull
//! again to absorb the server's authoritative state. Calendar folders
//! are only discovered; their content sync belongs to an external
//! calendaring subsystem. Every per-folder failure is contained and
//! converted into a [`SyncOutcome`], never aborting sibling folders.

use crate::account::Account;
use crate::changes::{SyncContext, pull_remote};
use crate::config::AccountConfig;
use crate::discover::discover_folders;
use crate::error::CardDavError;
use crate::http::HttpClient;
use crate::push::push_local;
use crate::store::ContactStore;
use crate::types::{FolderRecord, Href, Service, SyncOutcome, SyncStatus};

/// Drives discovery and folder syncs for one account.
#[derive(Debug)]
pub struct Synchronizer {
    http: HttpClient,
    /// Discovered folder state.
    pub account: Account,
}

impl Synchronizer {
    /// Creates a synchronizer for the account.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: AccountConfig) -> Result<Self, CardDavError> {
        let http = HttpClient::new(config.clone())?;
        Ok(Self {
            http,
            account: Account::new(config),
        })
    }

    /// Runs folder discovery for every enabled service.
    ///
    /// A failing service yields an error outcome for that service only;
    /// the other service still runs. Folders the server stopped
    /// reporting are flagged deleted, unless that service's home-set
    /// resolution failed.
    pub async fn discover(&mut self) -> Vec<(Service, SyncOutcome)> {
        let mut outcomes = Vec::new();

        let services = [
            (Service::Contacts, self.account.config.sync_contacts),
            (Service::Calendar, self.account.config.sync_calendars),
        ];
        for (service, enabled) in services {
            if !enabled {
                continue;
            }
            let outcome = match discover_folders(&self.http, &mut self.account, service).await {
                Ok(report) => {
                    if report.authoritative {
                        self.account.mark_missing(service, &report.found);
                    }
                    SyncOutcome::success()
                }
                Err(e) => {
                    tracing::warn!(?service, error = %e, "folder discovery failed");
                    SyncOutcome::error("discovery failed", e.to_string())
                }
            };
            outcomes.push((service, outcome));
        }
        outcomes
    }

    /// Syncs one folder against its local store, containing every
    /// failure in the returned outcome.
    pub async fn sync_folder<S: ContactStore>(
        &mut self,
        href: &Href,
        store: &mut S,
    ) -> SyncOutcome {
        let config = self.account.config.clone();
        let Some(folder) = self.account.folder_mut(href) else {
            return SyncOutcome::error("unknown folder", href.to_string());
        };
        if folder.deleted_on_server {
            return SyncOutcome::warning("folder was deleted on the server");
        }

        match folder.kind.service() {
            Service::Calendar => {
                // Calendar content is managed by the calendaring
                // subsystem; discovery already refreshed the record.
                SyncOutcome {
                    status: SyncStatus::Success,
                    message: "delegated to calendaring subsystem".to_string(),
                    detail: String::new(),
                }
            }
            Service::Contacts => {
                match sync_contact_folder(&self.http, &config, folder, store).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!(href = %href, error = %e, "folder sync failed");
                        SyncOutcome::error("sync failed", e.to_string())
                    }
                }
            }
        }
    }
}

/// The pull/push/re-pull cycle for one contact folder.
async fn sync_contact_folder<S: ContactStore>(
    http: &HttpClient,
    config: &AccountConfig,
    folder: &mut FolderRecord,
    store: &mut S,
) -> Result<SyncOutcome, CardDavError> {
    let mut ctx = SyncContext::new();
    pull_remote(http, config, folder, store, &mut ctx).await?;
    ctx.reconcile_groups(store);

    let report = push_local(http, config, folder, store, &mut ctx).await?;

    if report.needs_revert() {
        // Some local edits were rejected; discard local state and pull
        // a clean copy of the server's version.
        tracing::info!(
            href = %folder.href,
            errors = report.permission_errors,
            "reverting folder after permission failure"
        );
        store.clear();
        folder.reset_sync_state();
        let mut ctx = SyncContext::new();
        pull_remote(http, config, folder, store, &mut ctx).await?;
        ctx.reconcile_groups(store);

        if !folder.download_only {
            return Ok(SyncOutcome::warning("local changes reverted to server state"));
        }
    } else if report.applied > 0 {
        // Pull our own writes back to pick up fresh etags and a clean
        // ctag/token.
        pull_remote(http, config, folder, store, &mut ctx).await?;
        ctx.reconcile_groups(store);
    }

    Ok(SyncOutcome::success())
}

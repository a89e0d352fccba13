// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Pushing locally queued changes to the server.
//!
//! The push drains the change log in batches. Every entry is removed
//! from the log exactly once, whatever its outcome: a successful write,
//! a 404 on delete (already gone), or a permission failure. Permission
//! failures are sticky per operation class so one rejected add does not
//! trigger a rejected request for every queued add; the caller reverts
//! the folder with a clean re-pull when any occurred.

use uuid::Uuid;

use crate::changes::SyncContext;
use crate::config::AccountConfig;
use crate::error::CardDavError;
use crate::group::build_group_card;
use crate::http::{DavOutcome, HttpClient, SOFTFAIL_DELETE, SOFTFAIL_PUT};
use crate::merge::{OutgoingCard, build_contact_card};
use crate::store::{ChangeLogEntry, ChangeStatus, ContactStore};
use crate::types::{FolderRecord, Href};

/// Outcome of one push pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PushReport {
    /// Change-log entries drained, including skipped and failed ones.
    pub applied: usize,
    /// Entries that hit a (sticky) permission failure.
    pub permission_errors: usize,
}

impl PushReport {
    /// True when local state was discarded over a permission failure
    /// and the caller must force a clean re-pull.
    #[must_use]
    pub const fn needs_revert(&self) -> bool {
        self.permission_errors > 0
    }
}

/// Per-class sticky permission failures. A download-only folder starts
/// with every class blocked, which skips all writes while still
/// draining the log.
#[derive(Debug)]
struct StickyErrors {
    add: bool,
    modify: bool,
    delete: bool,
}

impl StickyErrors {
    const fn new(download_only: bool) -> Self {
        Self {
            add: download_only,
            modify: download_only,
            delete: download_only,
        }
    }

    const fn blocked(&self, status: ChangeStatus) -> bool {
        match status {
            ChangeStatus::Added => self.add,
            ChangeStatus::Modified => self.modify,
            ChangeStatus::Deleted => self.delete,
        }
    }

    const fn block(&mut self, status: ChangeStatus) {
        match status {
            ChangeStatus::Added => self.add = true,
            ChangeStatus::Modified => self.modify = true,
            ChangeStatus::Deleted => self.delete = true,
        }
    }
}

/// Drains the change log for one folder, pushing each entry remotely.
///
/// # Errors
///
/// Returns hard transport errors. Permission failures (403/405, and
/// non-404 delete rejections) are not errors; they are counted in the
/// report and the affected local copies are dropped so the corrective
/// re-pull restores the server's version.
pub async fn push_local<S: ContactStore>(
    http: &HttpClient,
    config: &AccountConfig,
    folder: &FolderRecord,
    store: &mut S,
    ctx: &mut SyncContext,
) -> Result<PushReport, CardDavError> {
    let mut sticky = StickyErrors::new(folder.download_only);
    let mut report = PushReport::default();
    ctx.progress.reset(store.changes().len());

    loop {
        // Re-snapshot every batch so edits queued while pushing are
        // drained in the same pass.
        let batch: Vec<ChangeLogEntry> = store
            .changes()
            .into_iter()
            .take(config.batch_size.max(1))
            .collect();
        if batch.is_empty() {
            break;
        }

        for entry in batch {
            match entry.status {
                ChangeStatus::Added | ChangeStatus::Modified => {
                    push_upsert(http, config, folder, store, &mut sticky, &mut report, &entry)
                        .await?;
                }
                ChangeStatus::Deleted => {
                    push_delete(http, folder, &mut sticky, &mut report, &entry).await?;
                }
            }
            store.clear_change(&entry.href);
            report.applied += 1;
            ctx.progress.advance(1);
        }
    }

    Ok(report)
}

async fn push_upsert<S: ContactStore>(
    http: &HttpClient,
    config: &AccountConfig,
    folder: &FolderRecord,
    store: &mut S,
    sticky: &mut StickyErrors,
    report: &mut PushReport,
    entry: &ChangeLogEntry,
) -> Result<(), CardDavError> {
    let adding = entry.status == ChangeStatus::Added;

    if store.group(&entry.href).is_some() && !config.sync_groups {
        return Ok(());
    }

    if !sticky.blocked(entry.status) {
        match outgoing_for(store, folder, &entry.href, adding) {
            Some(outgoing) => {
                // An unmodified regeneration needs no network write.
                if adding || outgoing.modified {
                    let req = http.put_vcard(&folder.url_for(&entry.href), outgoing.data);
                    if let DavOutcome::Expected(status) = http.execute(req, SOFTFAIL_PUT).await? {
                        sticky.block(entry.status);
                        tracing::warn!(
                            href = %entry.href,
                            status,
                            adding,
                            "missing permission to write item"
                        );
                    }
                }
            }
            None => {
                tracing::warn!(href = %entry.href, "item in change log but not in store");
            }
        }
    }

    if sticky.blocked(entry.status) {
        // Drop the local copy; the corrective re-pull restores the
        // server's version.
        if store.remove_contact(&entry.href).is_none() {
            store.remove_group(&entry.href);
        }
        report.permission_errors += 1;
    }
    Ok(())
}

async fn push_delete(
    http: &HttpClient,
    folder: &FolderRecord,
    sticky: &mut StickyErrors,
    report: &mut PushReport,
    entry: &ChangeLogEntry,
) -> Result<(), CardDavError> {
    if !sticky.blocked(ChangeStatus::Deleted) {
        let req = http.delete(&folder.url_for(&entry.href));
        if let DavOutcome::Expected(status) = http.execute(req, SOFTFAIL_DELETE).await? {
            // A 404 means the item is already gone, which is what a
            // delete wants anyway.
            if status != 404 {
                sticky.block(ChangeStatus::Deleted);
                tracing::warn!(href = %entry.href, status, "missing permission to delete item");
            }
        }
    }

    if sticky.blocked(ChangeStatus::Deleted) {
        report.permission_errors += 1;
    }
    Ok(())
}

/// Regenerates the outgoing card for a logged item, assigning a fresh
/// UID to contacts pushed for the first time.
fn outgoing_for<S: ContactStore>(
    store: &mut S,
    folder: &FolderRecord,
    href: &Href,
    adding: bool,
) -> Option<OutgoingCard> {
    let needs_uid = adding && store.contact(href).is_some_and(|c| c.uid().is_none());
    if needs_uid {
        store.set_contact_uid(href, &Uuid::new_v4().to_string());
    }

    if let Some(contact) = store.contact(href) {
        return Some(build_contact_card(contact, folder.created_with_version));
    }
    if let Some(group) = store.group(href) {
        let uid = Uuid::new_v4().to_string();
        return Some(build_group_card(group, Some(&uid)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_only_blocks_every_class() {
        let sticky = StickyErrors::new(true);
        assert!(sticky.blocked(ChangeStatus::Added));
        assert!(sticky.blocked(ChangeStatus::Modified));
        assert!(sticky.blocked(ChangeStatus::Deleted));
    }

    #[test]
    fn blocking_one_class_leaves_the_others_open() {
        let mut sticky = StickyErrors::new(false);
        sticky.block(ChangeStatus::Modified);
        assert!(!sticky.blocked(ChangeStatus::Added));
        assert!(sticky.blocked(ChangeStatus::Modified));
        assert!(!sticky.blocked(ChangeStatus::Deleted));
    }
}

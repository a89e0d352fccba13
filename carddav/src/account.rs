// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Account state: the folder list and snapshots of removed folders.

use std::collections::BTreeMap;

use crate::config::AccountConfig;
use crate::types::{FolderRecord, FolderSnapshot, Href, Service};

/// A sync account: configuration plus the folders discovered for it.
#[derive(Debug)]
pub struct Account {
    /// Account configuration.
    pub config: AccountConfig,
    folders: BTreeMap<Href, FolderRecord>,
    snapshots: BTreeMap<Href, FolderSnapshot>,
}

impl Account {
    /// Creates an account with no discovered folders.
    #[must_use]
    pub fn new(config: AccountConfig) -> Self {
        Self {
            config,
            folders: BTreeMap::new(),
            snapshots: BTreeMap::new(),
        }
    }

    /// Looks up a folder by href.
    #[must_use]
    pub fn folder(&self, href: &Href) -> Option<&FolderRecord> {
        self.folders.get(href)
    }

    /// Looks up a folder mutably.
    pub fn folder_mut(&mut self, href: &Href) -> Option<&mut FolderRecord> {
        self.folders.get_mut(href)
    }

    /// All folders, in href order.
    pub fn folders(&self) -> impl Iterator<Item = &FolderRecord> {
        self.folders.values()
    }

    /// Folders of one service class.
    pub fn folders_for(&self, service: Service) -> impl Iterator<Item = &FolderRecord> {
        self.folders
            .values()
            .filter(move |f| f.kind.service() == service)
    }

    /// Registers a newly discovered folder, restoring any saved snapshot
    /// for the same href.
    ///
    /// Snapshot restoration brings back the user-chosen name, color and
    /// download-only flag from before the folder vanished. A saved
    /// download-only override only survives when the rediscovered ACL
    /// still grants write access; a now read-only folder stays
    /// download-only regardless.
    pub fn adopt_folder(&mut self, mut folder: FolderRecord) {
        if let Some(snapshot) = self.snapshots.remove(&folder.href) {
            folder.name = snapshot.name;
            folder.color = snapshot.color;
            if folder.acl.can_write() {
                folder.download_only = snapshot.download_only;
            }
        }
        tracing::debug!(href = %folder.href, name = %folder.name, "adopted folder");
        self.folders.insert(folder.href.clone(), folder);
    }

    /// Updates an already known folder in place, preserving its sync
    /// state (ctag, token, schema version) while taking the freshly
    /// reported name, color and access bits.
    pub fn refresh_folder(&mut self, folder: FolderRecord) {
        if let Some(existing) = self.folders.get_mut(&folder.href) {
            existing.name = folder.name;
            existing.acl = folder.acl;
            existing.shared = folder.shared;
            existing.origin = folder.origin;
            existing.deleted_on_server = false;
            if folder.color.is_some() {
                existing.color = folder.color;
            }
            if !folder.acl.can_write() {
                existing.download_only = true;
            }
        } else {
            self.adopt_folder(folder);
        }
    }

    /// Marks every folder of `service` absent from `found` as deleted on
    /// the server, taking a snapshot so a later rediscovery can restore
    /// local choices.
    pub fn mark_missing(&mut self, service: Service, found: &[Href]) {
        let missing: Vec<Href> = self
            .folders
            .values()
            .filter(|f| f.kind.service() == service && !found.contains(&f.href))
            .map(|f| f.href.clone())
            .collect();

        for href in missing {
            if let Some(folder) = self.folders.get_mut(&href) {
                tracing::info!(href = %href, "folder no longer reported by server");
                folder.deleted_on_server = true;
                self.snapshots.insert(
                    href.clone(),
                    FolderSnapshot {
                        href: href.clone(),
                        name: folder.name.clone(),
                        color: folder.color.clone(),
                        download_only: folder.download_only,
                    },
                );
            }
        }
    }

    /// Drops a folder the user no longer wants, keeping a snapshot.
    pub fn remove_folder(&mut self, href: &Href) -> Option<FolderRecord> {
        let folder = self.folders.remove(href)?;
        self.snapshots.insert(
            href.clone(),
            FolderSnapshot {
                href: href.clone(),
                name: folder.name.clone(),
                color: folder.color.clone(),
                download_only: folder.download_only,
            },
        );
        Some(folder)
    }

    /// Saved snapshot for an href, if any.
    #[must_use]
    pub fn snapshot(&self, href: &Href) -> Option<&FolderSnapshot> {
        self.snapshots.get(href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Acl, FolderKind};

    fn folder(href: &str, acl: u8) -> FolderRecord {
        FolderRecord::new(
            Href::from(href),
            FolderKind::CardDav,
            "Contacts".into(),
            Acl::from_bits(acl),
        )
    }

    #[test]
    fn missing_folders_are_marked_and_snapshotted() {
        let mut account = Account::new(AccountConfig::default());
        let mut f = folder("/books/a/", Acl::ALL);
        f.name = "Renamed".into();
        f.color = Some("#ff0000".into());
        account.adopt_folder(f);
        account.adopt_folder(folder("/books/b/", Acl::ALL));

        account.mark_missing(Service::Contacts, &[Href::from("/books/b/")]);

        let a = account.folder(&Href::from("/books/a/")).unwrap();
        assert!(a.deleted_on_server);
        let b = account.folder(&Href::from("/books/b/")).unwrap();
        assert!(!b.deleted_on_server);
        assert!(account.snapshot(&Href::from("/books/a/")).is_some());
    }

    #[test]
    fn rediscovery_restores_snapshot() {
        let mut account = Account::new(AccountConfig::default());
        let mut f = folder("/books/a/", Acl::ALL);
        f.name = "Team".into();
        f.color = Some("#00ff00".into());
        account.adopt_folder(f);
        account.mark_missing(Service::Contacts, &[]);
        account.remove_folder(&Href::from("/books/a/"));

        account.adopt_folder(folder("/books/a/", Acl::ALL));
        let restored = account.folder(&Href::from("/books/a/")).unwrap();
        assert_eq!(restored.name, "Team");
        assert_eq!(restored.color.as_deref(), Some("#00ff00"));
    }

    #[test]
    fn download_only_override_dropped_for_read_only_rediscovery() {
        let mut account = Account::new(AccountConfig::default());
        let mut f = folder("/books/a/", Acl::ALL);
        f.download_only = false;
        account.adopt_folder(f);
        account.remove_folder(&Href::from("/books/a/"));

        // Rediscovered without write access
        account.adopt_folder(folder("/books/a/", Acl::READ));
        let restored = account.folder(&Href::from("/books/a/")).unwrap();
        assert!(restored.download_only);
    }
}

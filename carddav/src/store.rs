// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Local contact/group storage and the pending-change log.

use std::collections::BTreeMap;

use davsync_vcard::VCard;

use crate::types::{ETag, Href};

/// A contact as stored locally: editable properties plus the server
/// bookkeeping needed for three-way merges.
#[derive(Debug, Clone, Default)]
pub struct LocalContact {
    /// Server item identifier; also the local primary key.
    pub href: Href,
    /// Last seen server etag, `None` for items not yet pushed.
    pub etag: Option<ETag>,
    /// Locally editable properties, keyed by property name. An absent
    /// key and an empty value both mean "no value".
    pub props: BTreeMap<String, String>,
    /// Last card accepted from the server, unmodified. This is the
    /// common ancestor for three-way merges.
    pub baseline: Option<VCard>,
}

impl LocalContact {
    /// Creates a local-only contact awaiting its first push.
    #[must_use]
    pub fn new_local(href: Href) -> Self {
        Self {
            href,
            etag: None,
            props: BTreeMap::new(),
            baseline: None,
        }
    }

    /// Reads a property, `None` when absent or empty.
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Sets a property; an empty value removes it.
    pub fn set_prop(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.props.remove(name);
        } else {
            self.props.insert(name.to_string(), value);
        }
    }

    /// The contact's stable UID, distinct from its href.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.prop("uid")
    }

    /// Marks `card` as the new server baseline under `etag`.
    pub fn accept_from_server(&mut self, etag: ETag, card: VCard) {
        self.baseline = Some(card);
        self.etag = Some(etag);
    }
}

/// A mailing-list group as stored locally. Membership is kept as member
/// UIDs; the remote document carries them as `urn:uuid:` references.
#[derive(Debug, Clone, Default)]
pub struct LocalGroup {
    /// Server item identifier.
    pub href: Href,
    /// Last seen server etag.
    pub etag: Option<ETag>,
    /// Group display name.
    pub name: String,
    /// Current local membership, as member UIDs, in order.
    pub members: Vec<String>,
    /// Last group card accepted from the server.
    pub baseline: Option<VCard>,
}

/// Direction-agnostic change status of a logged item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Created locally, not yet on the server.
    Added,
    /// Modified locally since the last baseline.
    Modified,
    /// Deleted locally, still on the server.
    Deleted,
}

/// One pending local change awaiting push.
#[derive(Debug, Clone)]
pub struct ChangeLogEntry {
    /// The item the change applies to.
    pub href: Href,
    /// What happened to it.
    pub status: ChangeStatus,
}

/// Per-folder local storage.
///
/// The change log keeps at most one entry per href; recording a change
/// replaces any earlier entry for the same item.
pub trait ContactStore {
    /// Looks up a contact by href.
    fn contact(&self, href: &Href) -> Option<&LocalContact>;

    /// Inserts or replaces a contact.
    fn upsert_contact(&mut self, contact: LocalContact);

    /// Removes a contact, returning it when present.
    fn remove_contact(&mut self, href: &Href) -> Option<LocalContact>;

    /// Finds a contact by its stable UID.
    fn contact_by_uid(&self, uid: &str) -> Option<&LocalContact>;

    /// Assigns a UID to a contact that has none yet.
    fn set_contact_uid(&mut self, href: &Href, uid: &str);

    /// Looks up a group by href.
    fn group(&self, href: &Href) -> Option<&LocalGroup>;

    /// Inserts or replaces a group.
    fn upsert_group(&mut self, group: LocalGroup);

    /// Removes a group, returning it when present.
    fn remove_group(&mut self, href: &Href) -> Option<LocalGroup>;

    /// All stored hrefs, contacts and groups alike.
    fn hrefs(&self) -> Vec<Href>;

    /// Removes everything, including the change log. Used when a
    /// permission failure forces a clean re-pull.
    fn clear(&mut self);

    /// Records a pending local change.
    fn log_change(&mut self, href: Href, status: ChangeStatus);

    /// Snapshot of the pending change log, in insertion order.
    fn changes(&self) -> Vec<ChangeLogEntry>;

    /// Hrefs currently logged with the given status.
    fn pending(&self, status: ChangeStatus) -> Vec<Href> {
        self.changes()
            .into_iter()
            .filter(|e| e.status == status)
            .map(|e| e.href)
            .collect()
    }

    /// Drops the change-log entry for an item after it was processed.
    fn clear_change(&mut self, href: &Href);
}

/// In-memory [`ContactStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    contacts: BTreeMap<Href, LocalContact>,
    groups: BTreeMap<Href, LocalGroup>,
    change_log: Vec<ChangeLogEntry>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored contacts.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Number of stored groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl ContactStore for MemoryStore {
    fn contact(&self, href: &Href) -> Option<&LocalContact> {
        self.contacts.get(href)
    }

    fn upsert_contact(&mut self, contact: LocalContact) {
        self.contacts.insert(contact.href.clone(), contact);
    }

    fn remove_contact(&mut self, href: &Href) -> Option<LocalContact> {
        self.contacts.remove(href)
    }

    fn contact_by_uid(&self, uid: &str) -> Option<&LocalContact> {
        self.contacts.values().find(|c| c.uid() == Some(uid))
    }

    fn set_contact_uid(&mut self, href: &Href, uid: &str) {
        if let Some(contact) = self.contacts.get_mut(href) {
            contact.set_prop("uid", uid);
        }
    }

    fn group(&self, href: &Href) -> Option<&LocalGroup> {
        self.groups.get(href)
    }

    fn upsert_group(&mut self, group: LocalGroup) {
        self.groups.insert(group.href.clone(), group);
    }

    fn remove_group(&mut self, href: &Href) -> Option<LocalGroup> {
        self.groups.remove(href)
    }

    fn hrefs(&self) -> Vec<Href> {
        self.contacts
            .keys()
            .chain(self.groups.keys())
            .cloned()
            .collect()
    }

    fn clear(&mut self) {
        self.contacts.clear();
        self.groups.clear();
        self.change_log.clear();
    }

    fn log_change(&mut self, href: Href, status: ChangeStatus) {
        self.change_log.retain(|e| e.href != href);
        self.change_log.push(ChangeLogEntry { href, status });
    }

    fn changes(&self) -> Vec<ChangeLogEntry> {
        self.change_log.clone()
    }

    fn clear_change(&mut self, href: &Href) {
        self.change_log.retain(|e| e.href != *href);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_log_keeps_one_entry_per_href() {
        let mut store = MemoryStore::new();
        let href = Href::from("/books/a/1.vcf");
        store.log_change(href.clone(), ChangeStatus::Added);
        store.log_change(href.clone(), ChangeStatus::Modified);
        let changes = store.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, ChangeStatus::Modified);

        store.clear_change(&href);
        assert!(store.changes().is_empty());
    }

    #[test]
    fn contact_by_uid_is_distinct_from_href() {
        let mut store = MemoryStore::new();
        let href = Href::from("/books/a/item-7.vcf");
        let mut contact = LocalContact::new_local(href.clone());
        contact.set_prop("uid", "1b7f-22");
        store.upsert_contact(contact);

        assert!(store.contact_by_uid("1b7f-22").is_some());
        assert!(store.contact_by_uid("item-7").is_none());
        assert!(store.contact(&href).is_some());
    }

    #[test]
    fn empty_prop_value_removes_the_key() {
        let mut contact = LocalContact::new_local(Href::from("/books/a/1.vcf"));
        contact.set_prop("display_name", "Jane");
        assert_eq!(contact.prop("display_name"), Some("Jane"));
        contact.set_prop("display_name", "");
        assert_eq!(contact.prop("display_name"), None);
    }

    #[test]
    fn pending_filters_by_status() {
        let mut store = MemoryStore::new();
        store.log_change(Href::from("/a/1.vcf"), ChangeStatus::Added);
        store.log_change(Href::from("/a/2.vcf"), ChangeStatus::Deleted);
        store.log_change(Href::from("/a/3.vcf"), ChangeStatus::Deleted);

        assert_eq!(store.pending(ChangeStatus::Added).len(), 1);
        assert_eq!(store.pending(ChangeStatus::Deleted).len(), 2);
    }
}

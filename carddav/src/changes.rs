// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Remote change detection and application.
//!
//! A pull first tries an incremental sync-collection report against the
//! stored token. When no token is stored, or the server rejects it, the
//! engine falls back to a full listing driven by the collection ctag,
//! looping until the ctag reads the same before and after the listing.
//! Changed items are downloaded in multiget batches, removals are
//! applied in paced chunks, and group cards seen along the way are
//! reconciled once at the end of the pass.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use davsync_vcard::VCard;

use crate::config::AccountConfig;
use crate::error::CardDavError;
use crate::group::{group_members, group_name, is_group_card, merge_members};
use crate::http::{DavOutcome, DavResponse, HttpClient, SOFTFAIL_TOKEN};
use crate::merge::apply_remote_card;
use crate::request::{AddressbookMultiGetRequest, Prop, PropFindRequest, SyncCollectionRequest};
use crate::response::MultiStatus;
use crate::store::{ChangeStatus, ContactStore, LocalContact, LocalGroup};
use crate::types::{ETag, FolderRecord, Href, SchemaVersion, SyncProgress};

/// Bound on the ctag stabilization loop. A server whose ctag changes on
/// every probe past this bound aborts the folder's sync.
pub const MAX_CTAG_PROBES: usize = 20;

/// State scoped to one sync pass of one folder.
///
/// Group cards seen while applying downloads are parked here and
/// reconciled at pass end, because members referenced by UID may not
/// exist locally until their own download has been applied.
#[derive(Debug, Default)]
pub struct SyncContext {
    groups_seen: BTreeMap<Href, SeenGroup>,
    /// Pass progress, for callers that want to display it.
    pub progress: SyncProgress,
}

#[derive(Debug)]
struct SeenGroup {
    old: Option<VCard>,
    new: VCard,
}

impl SyncContext {
    /// Creates a fresh per-pass context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn note_group(&mut self, href: Href, old: Option<VCard>, new: VCard) {
        self.groups_seen.insert(href, SeenGroup { old, new });
    }

    /// Reconciles membership of every group seen during the pass and
    /// drains the parked cards.
    pub fn reconcile_groups<S: ContactStore>(&mut self, store: &mut S) {
        let seen = std::mem::take(&mut self.groups_seen);
        for (href, SeenGroup { old, new }) in seen {
            let Some(group) = store.group(&href) else {
                continue;
            };
            let old_members = old.as_ref().map(group_members).unwrap_or_default();
            let new_members = group_members(&new);
            let mut merged = group.clone();
            merged.members = merge_members(&old_members, &new_members, &group.members);
            store.upsert_group(merged);
        }
    }
}

/// Pulls remote changes for one folder into the local store.
///
/// # Errors
///
/// Returns [`CardDavError::UnstableCollection`] when the ctag keeps
/// changing for [`MAX_CTAG_PROBES`] listing passes, and any hard
/// transport or parse error. A rejected sync token is not an error; it
/// falls back to the full listing.
pub async fn pull_remote<S: ContactStore>(
    http: &HttpClient,
    config: &AccountConfig,
    folder: &mut FolderRecord,
    store: &mut S,
    ctx: &mut SyncContext,
) -> Result<(), CardDavError> {
    if folder.token.is_some() {
        if token_sync(http, config, folder, store, ctx).await? {
            return Ok(());
        }
        // Stale token; start over with a full listing.
        folder.reset_sync_state();
    }

    for probe in 0..=MAX_CTAG_PROBES {
        if probe == MAX_CTAG_PROBES {
            return Err(CardDavError::UnstableCollection(folder.href.clone()));
        }
        if !ctag_sync(http, config, folder, store, ctx).await? {
            break;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeClass {
    Add,
    Modify,
}

/// Incremental pull via a sync-collection report. Returns false when
/// the token path is unusable and a full listing is required.
async fn token_sync<S: ContactStore>(
    http: &HttpClient,
    config: &AccountConfig,
    folder: &mut FolderRecord,
    store: &mut S,
    ctx: &mut SyncContext,
) -> Result<bool, CardDavError> {
    ctx.progress.reset(0);

    let token = folder.token.clone().unwrap_or_default();
    let body = SyncCollectionRequest::new(token).build()?;
    let req = http.report(&folder.url(), "0", body)?;
    let resp = match http.execute(req, SOFTFAIL_TOKEN).await? {
        DavOutcome::Success(resp) => resp,
        DavOutcome::Expected(status) => {
            tracing::debug!(status, "sync token rejected, falling back to full listing");
            return Ok(false);
        }
    };

    let multi = MultiStatus::from_xml(&resp.body)?;
    let Some(new_token) = multi.sync_token.clone() else {
        return Ok(false);
    };

    let local_deletes = store.pending(ChangeStatus::Deleted);
    let mut changed: BTreeMap<Href, ChangeClass> = BTreeMap::new();
    let mut deleted: Vec<Href> = Vec::new();

    for item in &multi.responses {
        if item.is_removed() {
            if local_exists(store, &item.href) {
                deleted.push(item.href.clone());
            }
            continue;
        }

        let props = item.ok_props();
        let Some(etag) = props.get_etag else {
            tracing::warn!(href = %item.href, "sync report entry without etag, skipping");
            continue;
        };

        if local_exists(store, &item.href) {
            if local_etag(store, &item.href).as_ref() != Some(&etag) {
                changed.insert(item.href.clone(), ChangeClass::Modify);
            }
        } else if !local_deletes.contains(&item.href) {
            // Deleted locally but not yet pushed; do not re-add.
            changed.insert(item.href.clone(), ChangeClass::Add);
        }
    }

    ctx.progress.reset(changed.len() + deleted.len());
    multiget(http, config, folder, store, ctx, &changed).await?;
    delete_local(store, ctx, &deleted, config).await;

    folder.token = Some(new_token);
    Ok(true)
}

/// One ctag probe plus, when it moved, a full etag listing. Returns
/// whether the ctag changed, i.e. whether another probe is needed.
async fn ctag_sync<S: ContactStore>(
    http: &HttpClient,
    config: &AccountConfig,
    folder: &mut FolderRecord,
    store: &mut S,
    ctx: &mut SyncContext,
) -> Result<bool, CardDavError> {
    ctx.progress.reset(0);

    let mut probe = PropFindRequest::new();
    probe.add_property(Prop::GetCtag);
    probe.add_property(Prop::SyncToken);
    let req = http.propfind(&folder.url(), "0", probe.build()?)?;
    let resp = require_success(http, req).await?;

    let multi = MultiStatus::from_xml(&resp.body)?;
    let props = multi
        .response_for(folder.href.as_str())
        .map(crate::response::ResponseItem::ok_props)
        .unwrap_or_default();
    let ctag = props.get_ctag;
    let token = props.sync_token;

    if ctag.is_some() && ctag == folder.ctag {
        return Ok(false);
    }

    let mut listing = PropFindRequest::new();
    listing.add_property(Prop::GetETag);
    let req = http.propfind(&folder.url(), "1", listing.build()?)?;
    let resp = require_success(http, req).await?;

    let local_deletes = store.pending(ChangeStatus::Deleted);
    let local_adds = store.pending(ChangeStatus::Added);
    let multi = MultiStatus::from_xml(&resp.body)?;
    let mut found: BTreeSet<Href> = BTreeSet::new();
    let mut changed: BTreeMap<Href, ChangeClass> = BTreeMap::new();

    for item in &multi.responses {
        // Some servers (Radicale) report the collection itself, and a
        // query for it would return everything again.
        if item.href.matches(folder.href.as_str()) {
            continue;
        }
        let props = item.ok_props();
        let Some(etag) = props.get_etag else {
            continue;
        };

        found.insert(item.href.clone());
        if local_exists(store, &item.href) {
            if local_etag(store, &item.href).as_ref() != Some(&etag) {
                changed.insert(item.href.clone(), ChangeClass::Modify);
            }
        } else if !local_deletes.contains(&item.href) {
            changed.insert(item.href.clone(), ChangeClass::Add);
        }
    }

    // Everything local the server no longer lists was deleted remotely,
    // except items still waiting for their first push.
    let deleted: Vec<Href> = store
        .hrefs()
        .into_iter()
        .filter(|h| !found.contains(h) && !local_adds.contains(h))
        .collect();

    ctx.progress.reset(changed.len() + deleted.len());
    multiget(http, config, folder, store, ctx, &changed).await?;
    delete_local(store, ctx, &deleted, config).await;

    // A server without ctag support gets a single listing pass.
    let Some(ctag) = ctag else {
        return Ok(false);
    };
    folder.ctag = Some(ctag);
    if token.is_some() {
        folder.token = token;
    }
    Ok(true)
}

/// Downloads the classified items in batches and applies each one.
async fn multiget<S: ContactStore>(
    http: &HttpClient,
    config: &AccountConfig,
    folder: &FolderRecord,
    store: &mut S,
    ctx: &mut SyncContext,
    changed: &BTreeMap<Href, ChangeClass>,
) -> Result<(), CardDavError> {
    if changed.is_empty() {
        return Ok(());
    }
    let adds = changed.values().filter(|c| **c == ChangeClass::Add).count();
    tracing::debug!(adds, mods = changed.len() - adds, "downloading changed items");

    let hrefs: Vec<Href> = changed.keys().cloned().collect();
    let mut processed: BTreeSet<Href> = BTreeSet::new();

    for chunk in hrefs.chunks(config.batch_size.max(1)) {
        let mut req = AddressbookMultiGetRequest::new();
        for href in chunk {
            req.add_href(href.as_str().to_string());
        }
        let request = http.report(&folder.url(), "1", req.build()?)?;
        let resp = require_success(http, request).await?;
        let multi = MultiStatus::from_xml(&resp.body)?;

        for item in &multi.responses {
            ctx.progress.advance(1);
            if !changed.contains_key(&item.href) || processed.contains(&item.href) {
                tracing::warn!(href = %item.href, "unrequested or repeated multiget entry, skipping");
                continue;
            }
            let props = item.ok_props();
            let (Some(etag), Some(raw)) = (props.get_etag, props.address_data) else {
                tracing::warn!(href = %item.href, "multiget entry without etag or body, skipping");
                continue;
            };
            processed.insert(item.href.clone());

            if let Err(e) = apply_server_card(
                store,
                ctx,
                config.sync_groups,
                folder.created_with_version,
                &item.href,
                etag,
                &raw,
            ) {
                tracing::warn!(href = %item.href, error = %e, "unparsable card, skipping");
            }
        }
    }
    Ok(())
}

/// Applies one downloaded card: group cards update the group store and
/// are parked for the pass-end reconciliation, contact cards go through
/// the three-way field merge.
fn apply_server_card<S: ContactStore>(
    store: &mut S,
    ctx: &mut SyncContext,
    sync_groups: bool,
    created_with: SchemaVersion,
    href: &Href,
    etag: ETag,
    raw: &str,
) -> Result<(), CardDavError> {
    let card = davsync_vcard::parse(raw.trim())?;

    if is_group_card(&card) {
        if !sync_groups {
            return Ok(());
        }
        let mut group = store.group(href).cloned().unwrap_or_else(|| LocalGroup {
            href: href.clone(),
            name: group_name(&card),
            ..LocalGroup::default()
        });
        ctx.note_group(href.clone(), group.baseline.clone(), card.clone());
        group.etag = Some(etag);
        group.baseline = Some(card);
        store.upsert_group(group);
        return Ok(());
    }

    let mut contact = store
        .contact(href)
        .cloned()
        .unwrap_or_else(|| LocalContact::new_local(href.clone()));
    apply_remote_card(&mut contact, &card, created_with);
    contact.accept_from_server(etag, card);
    store.upsert_contact(contact);
    Ok(())
}

/// Removes items the server deleted, in paced chunks so callers polling
/// the progress counter see the pass advance.
async fn delete_local<S: ContactStore>(
    store: &mut S,
    ctx: &mut SyncContext,
    hrefs: &[Href],
    config: &AccountConfig,
) {
    for chunk in hrefs.chunks(config.batch_size.max(1)) {
        if config.pacing_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.pacing_ms)).await;
        }
        for href in chunk {
            if store.remove_contact(href).is_none() {
                store.remove_group(href);
            }
        }
        ctx.progress.advance(chunk.len());
    }
}

async fn require_success(
    http: &HttpClient,
    req: reqwest::RequestBuilder,
) -> Result<DavResponse, CardDavError> {
    match http.execute(req, &[]).await? {
        DavOutcome::Success(resp) => Ok(resp),
        DavOutcome::Expected(status) => Err(CardDavError::InvalidResponse(format!(
            "unexpected soft failure {status}"
        ))),
    }
}

fn local_exists<S: ContactStore>(store: &S, href: &Href) -> bool {
    store.contact(href).is_some() || store.group(href).is_some()
}

fn local_etag<S: ContactStore>(store: &S, href: &Href) -> Option<ETag> {
    store
        .contact(href)
        .and_then(|c| c.etag.clone())
        .or_else(|| store.group(href).and_then(|g| g.etag.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const GROUP_CARD: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Team\r\nN:Team\r\nX-ADDRESSBOOKSERVER-KIND:group\r\nX-ADDRESSBOOKSERVER-MEMBER:urn:uuid:a\r\nX-ADDRESSBOOKSERVER-MEMBER:urn:uuid:d\r\nEND:VCARD\r\n";

    #[test]
    fn server_card_becomes_local_contact() {
        let mut store = MemoryStore::new();
        let mut ctx = SyncContext::new();
        let href = Href::from("/books/jane/contacts/1.vcf");
        let raw = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jane Doe\r\nUID:u-1\r\nEND:VCARD\r\n";

        apply_server_card(
            &mut store,
            &mut ctx,
            true,
            SchemaVersion::CURRENT,
            &href,
            ETag::new("\"e1\"".into()),
            raw,
        )
        .unwrap();

        let contact = store.contact(&href).unwrap();
        assert_eq!(contact.prop("display_name"), Some("Jane Doe"));
        assert_eq!(contact.uid(), Some("u-1"));
        assert_eq!(contact.etag.as_ref().unwrap().as_str(), "\"e1\"");
        assert!(contact.baseline.is_some());
    }

    #[test]
    fn group_card_is_parked_not_stored_as_contact() {
        let mut store = MemoryStore::new();
        let mut ctx = SyncContext::new();
        let href = Href::from("/books/jane/contacts/team.vcf");

        apply_server_card(
            &mut store,
            &mut ctx,
            true,
            SchemaVersion::CURRENT,
            &href,
            ETag::new("\"g1\"".into()),
            GROUP_CARD,
        )
        .unwrap();

        assert!(store.contact(&href).is_none());
        let group = store.group(&href).unwrap();
        assert_eq!(group.name, "Team");
        assert!(ctx.groups_seen.contains_key(&href));
    }

    #[test]
    fn group_cards_are_ignored_when_group_sync_is_off() {
        let mut store = MemoryStore::new();
        let mut ctx = SyncContext::new();
        let href = Href::from("/books/jane/contacts/team.vcf");

        apply_server_card(
            &mut store,
            &mut ctx,
            false,
            SchemaVersion::CURRENT,
            &href,
            ETag::new("\"g1\"".into()),
            GROUP_CARD,
        )
        .unwrap();

        assert!(store.contact(&href).is_none());
        assert!(store.group(&href).is_none());
        assert!(ctx.groups_seen.is_empty());
    }

    #[test]
    fn reconcile_merges_membership_at_pass_end() {
        let mut store = MemoryStore::new();
        let mut ctx = SyncContext::new();
        let href = Href::from("/books/jane/contacts/team.vcf");

        // Baseline knew A and B; local state added E.
        let old = davsync_vcard::parse(
            "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Team\r\nX-ADDRESSBOOKSERVER-KIND:group\r\nX-ADDRESSBOOKSERVER-MEMBER:urn:uuid:a\r\nX-ADDRESSBOOKSERVER-MEMBER:urn:uuid:b\r\nEND:VCARD\r\n",
        )
        .unwrap();
        store.upsert_group(LocalGroup {
            href: href.clone(),
            etag: None,
            name: "Team".into(),
            members: vec!["a".into(), "b".into(), "e".into()],
            baseline: Some(old.clone()),
        });

        // Server dropped B and added D.
        let new = davsync_vcard::parse(GROUP_CARD).unwrap();
        ctx.note_group(href.clone(), Some(old), new);
        ctx.reconcile_groups(&mut store);

        let group = store.group(&href).unwrap();
        assert_eq!(group.members, vec!["a", "d", "e"]);
        assert!(ctx.groups_seen.is_empty());
    }
}

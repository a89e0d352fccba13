// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Mailing-list group handling: membership merge and group cards.
//!
//! Group cards carry `X-ADDRESSBOOKSERVER-KIND:group` and one
//! `X-ADDRESSBOOKSERVER-MEMBER:urn:uuid:<uid>` entry per member. Members
//! are referenced by contact UID, not by href.

use davsync_vcard::{Entry, VCard};

use crate::merge::OutgoingCard;
use crate::store::LocalGroup;

const MEMBER_FIELD: &str = "x-addressbookserver-member";
const KIND_FIELD: &str = "x-addressbookserver-kind";
const MEMBER_PREFIX: &str = "urn:uuid:";

/// True when the card describes a group rather than a contact.
#[must_use]
pub fn is_group_card(card: &VCard) -> bool {
    card.first(KIND_FIELD)
        .is_some_and(|e| e.value.flatten().eq_ignore_ascii_case("group"))
}

/// Group display name carried by the card.
#[must_use]
pub fn group_name(card: &VCard) -> String {
    card.first("fn")
        .map(|e| e.value.flatten())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Unlabeled Group".to_string())
}

/// Member UIDs listed on the card, in document order.
#[must_use]
pub fn group_members(card: &VCard) -> Vec<String> {
    card.get(MEMBER_FIELD)
        .unwrap_or_default()
        .iter()
        .map(|e| {
            let v = e.value.flatten();
            v.strip_prefix(MEMBER_PREFIX).unwrap_or(&v).to_string()
        })
        .collect()
}

/// Three-way membership merge.
///
/// The server's new list is authoritative for order and for removals it
/// made itself; local additions the server has not seen are appended;
/// local removals win even when the server still lists the member.
#[must_use]
pub fn merge_members(
    old_remote: &[String],
    new_remote: &[String],
    current_local: &[String],
) -> Vec<String> {
    let removed_by_server: Vec<&String> = old_remote
        .iter()
        .filter(|m| !new_remote.contains(m))
        .collect();

    let mut result: Vec<String> = new_remote.to_vec();

    for member in current_local {
        if !result.contains(member) && !removed_by_server.contains(&member) {
            result.push(member.clone());
        }
    }

    result.retain(|member| !(old_remote.contains(member) && !current_local.contains(member)));

    result
}

/// Regenerates the outgoing group card from the baseline, the local
/// name and the local member list. `uid` supplies the group's own UID
/// when the baseline does not carry one yet.
#[must_use]
pub fn build_group_card(group: &LocalGroup, uid: Option<&str>) -> OutgoingCard {
    let baseline = group.baseline.clone().unwrap_or_default();
    let mut card = baseline.clone();

    if !card.has("version") {
        card.set_single("version", "3.0");
    }
    card.set_single("fn", group.name.as_str());
    card.set_single("n", group.name.as_str());
    card.set_single(KIND_FIELD, "group");
    if !card.has("uid") {
        if let Some(uid) = uid {
            card.set_single("uid", uid);
        }
    }

    // The member list is rebuilt from scratch, not merged entry-wise.
    let members = card.entries_mut(MEMBER_FIELD);
    members.clear();
    for member in &group.members {
        members.push(Entry::new(format!("{MEMBER_PREFIX}{member}")));
    }
    if group.members.is_empty() {
        card.remove(MEMBER_FIELD);
    }

    let data = davsync_vcard::format(&card);
    let old = davsync_vcard::format(&baseline);
    OutgoingCard {
        modified: data != old,
        data,
    }
}

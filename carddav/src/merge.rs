// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Three-way, field-level merge between the server's card and local edits.
//!
//! Download direction: a local property is only overwritten when the
//! server value actually changed between the baseline card and the
//! incoming card, so local edits that were not pushed yet survive a
//! pull. Upload direction: the outgoing card is the baseline with every
//! local property written back through the same field table, and a
//! `modified` flag reports whether the result differs from the baseline
//! at all.

use davsync_vcard::{Entry, VCard, Value};

use crate::fields::{FIELDS, FieldDescriptor, FieldKind};
use crate::store::LocalContact;
use crate::types::SchemaVersion;

/// Year Apple Contacts substitutes for a date with no year in vCard 3,
/// paired with an `x-apple-omit-year` parameter.
pub const OMIT_YEAR_MARK: &str = "1604";

/// Separator used to pack list-valued properties into one local string.
pub const LIST_SEPARATOR: char = '\u{1a}';

/// One entry of an aggregate (phone/email) property, as serialized into
/// the local JSON value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaggedValue {
    /// Type tags of the entry.
    pub meta: Vec<String>,
    /// The entry value.
    pub value: String,
}

/// Result of regenerating the outgoing card for a push.
#[derive(Debug, Clone)]
pub struct OutgoingCard {
    /// The serialized card.
    pub data: String,
    /// True when the card differs from the baseline, i.e. a network
    /// write is warranted.
    pub modified: bool,
}

/// Extracts the comparison value of a property from `card`, `None` when
/// the addressed entry does not exist.
#[must_use]
pub fn remote_value(
    desc: &FieldDescriptor,
    card: Option<&VCard>,
    created_with: SchemaVersion,
) -> Option<String> {
    let card = card?;
    let entry_idx = desc.resolve_entry(card)?;
    let entry = card.entry(desc.field, entry_idx)?;

    match desc.kind {
        FieldKind::CompositeIndex(slot) => {
            Some(entry.value.component(slot.index(created_with)).to_string())
        }
        FieldKind::AggregateList => {
            let entries: Vec<TaggedValue> = card
                .get(desc.field)
                .unwrap_or_default()
                .iter()
                .map(|e| TaggedValue {
                    meta: e.tags(desc.tag_class).to_vec(),
                    value: e.value.flatten(),
                })
                .collect();
            Some(serde_json::to_string(&entries).unwrap_or_default())
        }
        FieldKind::Simple | FieldKind::TaggedType | FieldKind::Date | FieldKind::Photo => {
            let v = if desc.list {
                match &entry.value {
                    Value::Text(s) => s.clone(),
                    Value::List(items) => items.join(&LIST_SEPARATOR.to_string()),
                }
            } else {
                entry.value.flatten()
            };
            if !desc.prefix.is_empty() {
                if let Some(stripped) = v.strip_prefix(desc.prefix) {
                    return Some(stripped.to_string());
                }
            }
            Some(v)
        }
    }
}

/// Applies an incoming server card onto the local property set,
/// property by property, honoring the three-way merge rule.
pub fn apply_remote_card(
    contact: &mut LocalContact,
    incoming: &VCard,
    created_with: SchemaVersion,
) {
    let baseline = contact.baseline.clone();
    for desc in FIELDS {
        if !desc.available(created_with) {
            continue;
        }

        let new_value = remote_value(desc, Some(incoming), created_with);
        let old_value = remote_value(desc, baseline.as_ref(), created_with);
        if new_value == old_value {
            continue;
        }

        match desc.kind {
            FieldKind::Photo => apply_photo(contact, incoming, desc, new_value.as_deref()),
            FieldKind::Date => apply_date(contact, incoming, desc, new_value.as_deref()),
            FieldKind::AggregateList => {
                apply_aggregate(contact, desc, new_value.as_deref());
            }
            FieldKind::Simple | FieldKind::CompositeIndex(_) | FieldKind::TaggedType => {
                contact.set_prop(desc.property, new_value.unwrap_or_default());
            }
        }
    }
}

fn apply_photo(
    contact: &mut LocalContact,
    incoming: &VCard,
    desc: &FieldDescriptor,
    new_value: Option<&str>,
) {
    match new_value {
        Some(v) if !v.is_empty() => {
            // Only inline (base64 encoded) photos are stored; URI-valued
            // photos are left alone.
            let inline = incoming
                .first(desc.field)
                .is_some_and(|e| !e.tags("encoding").is_empty());
            if inline {
                contact.set_prop("photo", v);
            }
        }
        _ => contact.set_prop("photo", ""),
    }
}

fn apply_date(
    contact: &mut LocalContact,
    incoming: &VCard,
    desc: &FieldDescriptor,
    new_value: Option<&str>,
) {
    let parsed = new_value.and_then(|v| {
        let omit_year = incoming
            .first(desc.field)
            .map(|e| e.tags("x-apple-omit-year").to_vec())
            .unwrap_or_default();
        parse_vcard_date(v, &omit_year)
    });
    match parsed {
        Some((year, month, day)) => {
            contact.set_prop("birth_year", year);
            contact.set_prop("birth_month", month);
            contact.set_prop("birth_day", day);
        }
        None => {
            contact.set_prop("birth_year", "");
            contact.set_prop("birth_month", "");
            contact.set_prop("birth_day", "");
        }
    }
}

fn apply_aggregate(contact: &mut LocalContact, desc: &FieldDescriptor, new_value: Option<&str>) {
    contact.set_prop(desc.property, new_value.unwrap_or_default());

    let entries: Vec<TaggedValue> = new_value
        .and_then(|v| serde_json::from_str(v).ok())
        .unwrap_or_default();

    if desc.field == "email" {
        let primary = entries.first().map(|e| e.value.clone()).unwrap_or_default();
        let secondary: Vec<String> = entries.iter().skip(1).map(|e| e.value.clone()).collect();
        contact.set_prop("primary_email", primary);
        contact.set_prop("second_email", secondary.join(", "));
    } else {
        for (prop, numbers) in phone_fields(&entries) {
            contact.set_prop(prop, numbers.join(", "));
        }
    }
}

/// Distributes phone entries onto the legacy scalar properties: CELL,
/// FAX, PAGER and WORK tagged numbers are claimed in that order, every
/// remaining number lands in `home_phone`.
fn phone_fields(entries: &[TaggedValue]) -> Vec<(&'static str, Vec<String>)> {
    const MAP: [(&str, &str); 5] = [
        ("CELL", "cellular_number"),
        ("FAX", "fax_number"),
        ("PAGER", "pager_number"),
        ("WORK", "work_phone"),
        ("", "home_phone"),
    ];

    let mut remaining: Vec<&TaggedValue> = entries.iter().collect();
    let mut out = Vec::with_capacity(MAP.len());
    for (tag, prop) in MAP {
        let mut claimed = Vec::new();
        remaining.retain(|e| {
            if tag.is_empty() || e.meta.iter().any(|m| m == tag) {
                claimed.push(e.value.clone());
                false
            } else {
                true
            }
        });
        out.push((prop, claimed));
    }
    out
}

/// Parses an RFC 2426 BDAY value (with or without hyphens) into year,
/// month and day strings. A year matching the `x-apple-omit-year`
/// parameter comes back empty.
#[must_use]
pub fn parse_vcard_date(value: &str, omit_year: &[String]) -> Option<(String, String, String)> {
    let digits: String = value
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .filter(char::is_ascii_digit)
        .collect();
    if digits.len() < 8 {
        return None;
    }
    let year = digits[0..4].to_string();
    let month = digits[4..6].to_string();
    let day = digits[6..8].to_string();
    let year = if omit_year.iter().any(|y| *y == year) {
        String::new()
    } else {
        year
    };
    Some((year, month, day))
}

/// Regenerates the outgoing card for a contact from its baseline and
/// local properties.
#[must_use]
pub fn build_contact_card(contact: &LocalContact, created_with: SchemaVersion) -> OutgoingCard {
    let baseline = contact.baseline.clone().unwrap_or_default();
    let mut card = baseline.clone();

    for desc in FIELDS {
        if !desc.available(created_with) {
            continue;
        }

        match desc.kind {
            FieldKind::Photo => write_photo(&mut card, contact, desc),
            FieldKind::Date => write_date(&mut card, contact, desc),
            FieldKind::AggregateList => write_aggregate(&mut card, contact, desc),
            FieldKind::Simple | FieldKind::CompositeIndex(_) | FieldKind::TaggedType => {
                let value = contact.prop(desc.property).unwrap_or_default().to_string();
                write_value(&mut card, desc, &value, created_with);
            }
        }
    }

    // Servers reject cards without these.
    if !card.has("version") {
        card.set_single("version", "3.0");
    }
    if !card.has("fn") {
        card.set_single("fn", " ");
    }
    if !card.has("n") {
        card.set_single(
            "n",
            vec![
                " ".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ],
        );
    }

    let data = davsync_vcard::format(&card);
    let old = davsync_vcard::format(&baseline);
    OutgoingCard {
        modified: data != old,
        data,
    }
}

/// Writes one plain/composite/tagged property value into the card,
/// creating or clearing the addressed entry as needed. An empty value
/// clears; a fully cleared entry is dropped by the serializer.
fn write_value(card: &mut VCard, desc: &FieldDescriptor, value: &str, created_with: SchemaVersion) {
    let store = !value.is_empty();
    let existing = desc.resolve_entry(card);

    let entry_idx = match (store, existing) {
        (_, Some(idx)) => idx,
        (true, None) => {
            let mut entry = Entry::default();
            let tags = desc.default_tags();
            if !tags.is_empty() {
                entry.set_tags(desc.tag_class, tags);
            }
            if let FieldKind::CompositeIndex(slot) = desc.kind {
                entry.value = Value::List(vec![String::new(); slot.width()]);
            }
            card.push(desc.field, entry)
        }
        (false, None) => return,
    };

    let Some(entry) = card.entry_mut(desc.field, entry_idx) else {
        return;
    };

    match desc.kind {
        FieldKind::CompositeIndex(slot) => {
            entry
                .value
                .set_component(slot.index(created_with), if store { value } else { "" });
        }
        _ if desc.list => {
            entry.value = if store {
                Value::List(value.split(LIST_SEPARATOR).map(str::to_string).collect())
            } else {
                Value::List(Vec::new())
            };
        }
        _ => {
            entry.value = if store {
                Value::Text(format!("{}{value}", desc.prefix))
            } else {
                Value::Text(String::new())
            };
        }
    }
}

fn write_photo(card: &mut VCard, contact: &LocalContact, desc: &FieldDescriptor) {
    if let Some(photo) = contact.prop("photo") {
        card.set_single(desc.field, photo);
        if let Some(entry) = card.entry_mut(desc.field, 0) {
            entry.set_tags("encoding", vec!["b".to_string()]);
            entry.set_tags("type", vec!["JPEG".to_string()]);
        }
    }
}

fn write_date(card: &mut VCard, contact: &LocalContact, desc: &FieldDescriptor) {
    let year = contact
        .prop("birth_year")
        .map_or_else(|| OMIT_YEAR_MARK.to_string(), str::to_string);
    let month = contact.prop("birth_month").unwrap_or_default();
    let day = contact.prop("birth_day").unwrap_or_default();

    let value = match (
        year.parse::<i16>().ok(),
        month.parse::<i8>().ok().filter(|m| *m > 0),
        day.parse::<i8>().ok().filter(|d| *d > 0),
    ) {
        (Some(y), Some(m), Some(d)) if jiff::civil::Date::new(y, m, d).is_ok() => {
            format!("{year}-{m:02}-{d:02}")
        }
        _ => String::new(),
    };
    write_value(card, desc, &value, SchemaVersion::CURRENT);

    if !value.is_empty() && year == OMIT_YEAR_MARK {
        if let Some(entry) = card.entry_mut(desc.field, 0) {
            entry.set_tags("x-apple-omit-year", vec![OMIT_YEAR_MARK.to_string()]);
        }
    }
}

/// Writes every aggregate entry back, clearing entries beyond the local
/// list so removals reach the server.
fn write_aggregate(card: &mut VCard, contact: &LocalContact, desc: &FieldDescriptor) {
    let locals: Vec<TaggedValue> = contact
        .prop(desc.property)
        .and_then(|v| serde_json::from_str(v).ok())
        .unwrap_or_default();

    let existing = card.count(desc.field);
    let total = locals.len().max(existing);

    for i in 0..total {
        let (value, meta) = locals.get(i).map_or_else(
            || (String::new(), Vec::new()),
            |l| (l.value.clone(), l.meta.clone()),
        );

        if i >= card.count(desc.field) {
            card.push(desc.field, Entry::default());
        }
        if let Some(entry) = card.entry_mut(desc.field, i) {
            entry.value = Value::Text(value.clone());
            if !value.is_empty() {
                let tags = if meta.is_empty() {
                    desc.default_tags()
                } else {
                    meta
                };
                entry.set_tags(desc.tag_class, tags);
            }
        }
    }
}

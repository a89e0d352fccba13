// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Canonical vCard serialization.

use crate::{Entry, VCard, Value};

/// Serializes a card into its canonical textual form.
///
/// The output is deterministic: `version` first, remaining fields in
/// document order, parameters in sorted class order, CRLF line endings and
/// no folding. Entries whose value is entirely empty are dropped, which is
/// how component-wise clears (`N:;;;;`) erase a property. Feeding the
/// output back through [`crate::parse`] and formatting again yields the
/// same bytes; the sync engine's change detection depends on that.
#[must_use]
pub fn format(card: &VCard) -> String {
    let mut out = String::from("BEGIN:VCARD\r\n");

    if let Some(entries) = card.get("version") {
        for entry in entries {
            write_entry(&mut out, "version", entry);
        }
    }
    for (name, entries) in card.iter() {
        if name == "version" {
            continue;
        }
        for entry in entries {
            write_entry(&mut out, name, entry);
        }
    }

    out.push_str("END:VCARD\r\n");
    out
}

fn write_entry(out: &mut String, name: &str, entry: &Entry) {
    if entry.value.is_empty() {
        return;
    }

    if let Some(group) = &entry.group {
        out.push_str(group);
        out.push('.');
    }
    out.push_str(&name.to_ascii_uppercase());

    for (class, tags) in &entry.meta {
        if tags.is_empty() {
            continue;
        }
        out.push(';');
        out.push_str(&class.to_ascii_uppercase());
        out.push('=');
        out.push_str(&tags.join(","));
    }

    out.push(':');
    match &entry.value {
        Value::Text(s) => out.push_str(&escape(s)),
        Value::List(items) => {
            let sep = if name == "categories" { ',' } else { ';' };
            let mut first = true;
            for item in items {
                if !first {
                    out.push(sep);
                }
                first = false;
                out.push_str(&escape(item));
            }
        }
    }
    out.push_str("\r\n");
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Entry;

    #[test]
    fn format_orders_version_first() {
        let mut card = VCard::new();
        card.set_single("fn", "Jane Doe");
        card.set_single("version", "3.0");
        let text = format(&card);
        assert_eq!(text, "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jane Doe\r\nEND:VCARD\r\n");
    }

    #[test]
    fn format_drops_entries_with_all_empty_components() {
        let mut card = VCard::new();
        card.set_single("version", "3.0");
        card.set_single("n", Value::List(vec![String::new(); 5]));
        let text = format(&card);
        assert!(!text.contains("N:"));
    }

    #[test]
    fn format_escapes_separators() {
        let mut card = VCard::new();
        card.set_single("note", "a;b,c\nd");
        assert!(format(&card).contains("NOTE:a\\;b\\,c\\nd"));
    }

    #[test]
    fn format_emits_sorted_params() {
        let mut card = VCard::new();
        let mut entry = Entry::new("x");
        entry.set_tags("type", vec!["JPEG".into()]);
        entry.set_tags("encoding", vec!["b".into()]);
        card.entries_mut("photo").push(entry);
        assert!(format(&card).contains("PHOTO;ENCODING=b;TYPE=JPEG:x"));
    }
}

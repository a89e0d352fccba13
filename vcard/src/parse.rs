// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Content-line scanner for vCard 3.0 documents.

use std::collections::BTreeMap;

use crate::{Entry, VCard, VCardError, Value};

/// Parses a vCard document.
///
/// Folded lines are unfolded, parameter names are lowercased, `type` tags
/// are uppercased, and compound values (`N`, `ADR`, ... — any value with an
/// unescaped `;`, or `,` for `CATEGORIES`) are split into components.
/// Unknown properties are kept verbatim so regeneration is lossless.
///
/// # Errors
///
/// Returns an error if the `BEGIN:VCARD`/`END:VCARD` envelope is missing or
/// a content line has no `:` separator.
pub fn parse(input: &str) -> Result<VCard, VCardError> {
    let mut lines = unfold(input);

    let first = lines.next().ok_or(VCardError::MissingBegin)?;
    if !first.eq_ignore_ascii_case("BEGIN:VCARD") {
        return Err(VCardError::MissingBegin);
    }

    let mut card = VCard::new();
    let mut ended = false;

    for line in lines {
        if line.eq_ignore_ascii_case("END:VCARD") {
            ended = true;
            break;
        }
        if line.is_empty() {
            continue;
        }
        let (name, entry) = parse_line(&line)?;
        card.push(&name, entry);
    }

    if ended { Ok(card) } else { Err(VCardError::MissingEnd) }
}

/// Unfolds continuation lines (leading space or tab) into logical lines.
fn unfold(input: &str) -> impl Iterator<Item = String> {
    let mut logical: Vec<String> = Vec::new();
    for raw in input.lines() {
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some(last) = logical.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        logical.push(raw.trim_end_matches('\r').to_string());
    }
    logical.into_iter()
}

fn parse_line(line: &str) -> Result<(String, Entry), VCardError> {
    let colon = find_unescaped(line, ':').ok_or_else(|| VCardError::MalformedLine(line.into()))?;
    let (head, raw_value) = (&line[..colon], &line[colon + 1..]);

    let mut parts = split_unescaped(head, ';').into_iter();
    let name_part = parts.next().unwrap_or_default();

    // item1.EMAIL -> group "item1", name "email"
    let (group, name) = match name_part.split_once('.') {
        Some((group, name)) => (Some(group.to_string()), name.to_ascii_lowercase()),
        None => (None, name_part.to_ascii_lowercase()),
    };

    let mut meta: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for param in parts {
        if param.is_empty() {
            continue;
        }
        let (class, values) = match param.split_once('=') {
            Some((class, values)) => (class.to_ascii_lowercase(), values),
            // vCard 2.1 style bare parameter, treated as a type tag.
            None => ("type".to_string(), param.as_str()),
        };
        let uppercase = class == "type" || class == "x-service-type";
        let normalized: Vec<String> = values
            .trim_matches('"')
            .split(',')
            .filter(|v| !v.is_empty())
            .map(|v| {
                if uppercase {
                    v.to_ascii_uppercase()
                } else {
                    v.to_string()
                }
            })
            .collect();
        meta.entry(class).or_default().extend(normalized);
    }

    let value = parse_value(&name, raw_value);
    Ok((name, Entry { group, value, meta }))
}

fn parse_value(name: &str, raw: &str) -> Value {
    if name == "categories" {
        let items = split_unescaped(raw, ',');
        if items.len() > 1 {
            return Value::List(items.into_iter().map(|c| unescape(&c)).collect());
        }
    } else if find_unescaped(raw, ';').is_some() {
        return Value::List(
            split_unescaped(raw, ';')
                .into_iter()
                .map(|c| unescape(&c))
                .collect(),
        );
    }
    Value::Text(unescape(raw))
}

/// Position of the first `needle` not preceded by a backslash.
fn find_unescaped(s: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == needle {
            return Some(i);
        }
    }
    None
}

fn split_unescaped(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    parts.push(current);
    parts
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

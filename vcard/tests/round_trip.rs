// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Round-trip stability: formatting a parsed document and re-parsing the
//! result must be lossless, and parse∘format must be byte-idempotent.

use davsync_vcard::{Entry, VCard, Value, format, parse};

fn round_trip(card: &VCard) {
    let first = format(card);
    let reparsed = parse(&first).expect("generated card must parse");
    let second = format(&reparsed);
    assert_eq!(first, second, "parse∘format is not idempotent");
}

#[test]
fn minimal_card_is_stable() {
    let mut card = VCard::new();
    card.set_single("version", "3.0");
    card.set_single("fn", "Jane Doe");
    round_trip(&card);
}

#[test]
fn compound_fields_are_stable() {
    let mut card = VCard::new();
    card.set_single("version", "3.0");
    card.set_single("fn", "Jane Doe");
    card.set_single(
        "n",
        Value::List(vec![
            "Doe".into(),
            "Jane".into(),
            "Q".into(),
            "Dr.".into(),
            "Jr.".into(),
        ]),
    );
    card.set_single(
        "adr",
        Value::List(vec![
            String::new(),
            String::new(),
            "1 Main St".into(),
            "Springfield".into(),
            "IL".into(),
            "62701".into(),
            "USA".into(),
        ]),
    );
    round_trip(&card);
}

#[test]
fn tagged_entries_are_stable() {
    let mut card = VCard::new();
    card.set_single("version", "3.0");
    card.set_single("fn", "Jane Doe");

    let mut home = Entry::new("jane@example.com");
    home.set_tags("type", vec!["HOME".into(), "PREF".into()]);
    card.entries_mut("email").push(home);

    let mut work = Entry::new("jd@corp.example");
    work.set_tags("type", vec!["WORK".into()]);
    card.entries_mut("email").push(work);

    let mut impp = Entry::new("xmpp:jane@jabber.example");
    impp.set_tags("x-service-type", vec!["JABBER".into()]);
    card.entries_mut("impp").push(impp);

    round_trip(&card);
}

#[test]
fn escaped_values_are_stable() {
    let mut card = VCard::new();
    card.set_single("version", "3.0");
    card.set_single("fn", "Jane Doe");
    card.set_single("note", "line one\nsemi; comma, back\\slash");
    card.set_single(
        "categories",
        Value::List(vec!["work".into(), "a,b".into(), "friends".into()]),
    );
    round_trip(&card);
}

#[test]
fn foreign_card_parses_and_stabilizes() {
    // Folded, mixed-case, 2.1-style bare params; one canonical pass may
    // rewrite the bytes, the second must not.
    let input = "BEGIN:VCARD\r\n\
                 VERSION:3.0\r\n\
                 FN:Jane\r\n\
                 \x20\x20Doe\r\n\
                 Tel;HOME;type=voice:+1 555 0100\r\n\
                 BDAY;X-APPLE-OMIT-YEAR=1604:1604-03-15\r\n\
                 END:VCARD\r\n";
    let card = parse(input).expect("foreign card must parse");
    assert_eq!(card.first("fn").unwrap().value, Value::Text("Jane Doe".into()));
    assert!(card.first("tel").unwrap().has_tag("type", "HOME"));
    round_trip(&card);
}

#[test]
fn group_document_is_stable() {
    let mut card = VCard::new();
    card.set_single("version", "3.0");
    card.set_single("fn", "Team");
    card.set_single("n", "Team");
    card.set_single("x-addressbookserver-kind", "group");
    card.entries_mut("x-addressbookserver-member")
        .push(Entry::new("urn:uuid:11111111-1111-1111-1111-111111111111"));
    card.entries_mut("x-addressbookserver-member")
        .push(Entry::new("urn:uuid:22222222-2222-2222-2222-222222222222"));
    round_trip(&card);
}

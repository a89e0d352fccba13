// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Declarative mapping between local contact properties and vCard fields.
//!
//! Every locally tracked property is described by one [`FieldDescriptor`];
//! the merge engine interprets the table with a single generic resolver
//! instead of per-property code paths. Descriptors carry a minimum schema
//! version: a folder created before a property existed never has that
//! property written, which would otherwise wipe data the older schema
//! could not represent.

use davsync_vcard::VCard;

use crate::types::SchemaVersion;

/// First schema version carrying the base property set.
pub const SCHEMA_BASE: SchemaVersion = SchemaVersion(0, 4, 0);
/// Middle names were added in 0.8.8.
pub const SCHEMA_MIDDLE_NAME: SchemaVersion = SchemaVersion(0, 8, 8);
/// The address component order was corrected in 0.8.11; see
/// [`AdrSlot::index`].
pub const SCHEMA_ADR_ORDER_FIX: SchemaVersion = SchemaVersion(0, 8, 11);
/// Stable contact UIDs were added in 0.10.36.
pub const SCHEMA_UID: SchemaVersion = SchemaVersion(0, 10, 36);
/// Name prefix/suffix were added in 0.12.13.
pub const SCHEMA_NAME_AFFIXES: SchemaVersion = SchemaVersion(0, 12, 13);

/// Correct ADR component order (post 0.8.11): the RFC 2426 layout.
const ADR_ORDER: [&str; 7] = [
    "OfficeBox", "ExtAddr", "Street", "City", "State", "ZipCode", "Country",
];

/// ADR component order written by folders created before 0.8.11, with
/// State/ZipCode/Country scrambled. Frozen for compatibility with
/// documents those folders already pushed; never extend it.
const ADR_ORDER_LEGACY: [&str; 7] = [
    "OfficeBox", "ExtAddr", "Street", "City", "Country", "ZipCode", "State",
];

/// Named component of a postal address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdrSlot {
    /// Street address line.
    Street,
    /// City.
    City,
    /// State or province.
    State,
    /// Postal code.
    ZipCode,
    /// Country.
    Country,
}

impl AdrSlot {
    const fn name(self) -> &'static str {
        match self {
            Self::Street => "Street",
            Self::City => "City",
            Self::State => "State",
            Self::ZipCode => "ZipCode",
            Self::Country => "Country",
        }
    }

    /// Component index of this slot within an ADR value, honoring the
    /// component order of the schema the folder was created under.
    #[must_use]
    pub fn index(self, created_with: SchemaVersion) -> usize {
        let order = if created_with < SCHEMA_ADR_ORDER_FIX {
            &ADR_ORDER_LEGACY
        } else {
            &ADR_ORDER
        };
        order
            .iter()
            .position(|n| *n == self.name())
            .unwrap_or_default()
    }
}

/// Which component of a compound value a property maps to.
#[derive(Debug, Clone, Copy)]
pub enum CompositeSlot {
    /// Fixed component index; `width` is the component count written when
    /// the entry is created.
    Fixed {
        /// Component index.
        index: usize,
        /// Compound width on creation.
        width: usize,
    },
    /// Address component; the index depends on the folder schema version.
    Adr(AdrSlot),
}

impl CompositeSlot {
    /// Resolves the component index for a folder schema version.
    #[must_use]
    pub fn index(self, created_with: SchemaVersion) -> usize {
        match self {
            Self::Fixed { index, .. } => index,
            Self::Adr(slot) => slot.index(created_with),
        }
    }

    /// Component count written when a new entry is created.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Fixed { width, .. } => width,
            Self::Adr(_) => 7,
        }
    }
}

/// How a property's value relates to its vCard field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Whole scalar value of the first entry.
    Simple,
    /// One component of a compound value.
    CompositeIndex(CompositeSlot),
    /// Scalar value of the entry selected by type tag, with an optional
    /// URI prefix stripped on read and restored on write.
    TaggedType,
    /// All entries of a repeatable field, serialized as a JSON list of
    /// `{meta, value}` objects.
    AggregateList,
    /// Date value decomposed into year/month/day properties.
    Date,
    /// Inline photo data.
    Photo,
}

/// One row of the field mapping table.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Local property name.
    pub property: &'static str,
    /// vCard field name (lowercase).
    pub field: &'static str,
    /// Schema version this property first appeared in.
    pub min_version: SchemaVersion,
    /// Tag selecting the entry within a repeated field, when needed.
    pub tag: Option<&'static str>,
    /// Parameter class the tag lives in.
    pub tag_class: &'static str,
    /// Value prefix (IM URIs).
    pub prefix: &'static str,
    /// Interpretation of the value.
    pub kind: FieldKind,
    /// Treat the value as a `;`-separated list joined with `\u{1a}`
    /// locally (categories).
    pub list: bool,
}

impl FieldDescriptor {
    const fn simple(property: &'static str, field: &'static str) -> Self {
        Self {
            property,
            field,
            min_version: SCHEMA_BASE,
            tag: None,
            tag_class: "type",
            prefix: "",
            kind: FieldKind::Simple,
            list: false,
        }
    }

    const fn name_part(property: &'static str, index: usize, min_version: SchemaVersion) -> Self {
        Self {
            property,
            field: "n",
            min_version,
            tag: None,
            tag_class: "type",
            prefix: "",
            kind: FieldKind::CompositeIndex(CompositeSlot::Fixed { index, width: 5 }),
            list: false,
        }
    }

    const fn adr(property: &'static str, tag: &'static str, slot: AdrSlot) -> Self {
        Self {
            property,
            field: "adr",
            min_version: SCHEMA_BASE,
            tag: Some(tag),
            tag_class: "type",
            prefix: "",
            kind: FieldKind::CompositeIndex(CompositeSlot::Adr(slot)),
            list: false,
        }
    }

    const fn impp(property: &'static str, tag: &'static str, prefix: &'static str) -> Self {
        Self {
            property,
            field: "impp",
            min_version: SCHEMA_BASE,
            tag: Some(tag),
            tag_class: "x-service-type",
            prefix,
            kind: FieldKind::TaggedType,
            list: false,
        }
    }

    /// True when this property is available on a folder created under
    /// `version`.
    #[must_use]
    pub fn available(&self, version: SchemaVersion) -> bool {
        self.min_version <= version
    }

    /// Resolves which entry of the field this descriptor addresses in
    /// `card`, `None` when no matching entry exists yet.
    #[must_use]
    pub fn resolve_entry(&self, card: &VCard) -> Option<usize> {
        let entries = card.get(self.field)?;
        if entries.is_empty() {
            return None;
        }
        match self.tag {
            None => Some(0),
            Some(tag) => entries
                .iter()
                .position(|e| e.has_tag(self.tag_class, tag)),
        }
    }

    /// Default tags stamped onto a newly created entry.
    #[must_use]
    pub fn default_tags(&self) -> Vec<String> {
        match self.kind {
            FieldKind::AggregateList => {
                let default = if self.field == "tel" { "VOICE" } else { "OTHER" };
                vec![default.to_string()]
            }
            _ => self.tag.map(|t| vec![t.to_string()]).unwrap_or_default(),
        }
    }
}

/// The full property table, interpreted by the merge engine in order.
pub const FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::simple("display_name", "fn"),
    FieldDescriptor::name_part("first_name", 1, SCHEMA_BASE),
    FieldDescriptor::name_part("name_prefix", 3, SCHEMA_NAME_AFFIXES),
    FieldDescriptor::name_part("middle_name", 2, SCHEMA_MIDDLE_NAME),
    FieldDescriptor::name_part("name_suffix", 4, SCHEMA_NAME_AFFIXES),
    FieldDescriptor {
        min_version: SCHEMA_UID,
        ..FieldDescriptor::simple("uid", "uid")
    },
    FieldDescriptor {
        kind: FieldKind::AggregateList,
        ..FieldDescriptor::simple("phones_json", "tel")
    },
    FieldDescriptor {
        kind: FieldKind::AggregateList,
        ..FieldDescriptor::simple("emails_json", "email")
    },
    FieldDescriptor::name_part("last_name", 0, SCHEMA_BASE),
    FieldDescriptor::simple("nickname", "nickname"),
    FieldDescriptor {
        kind: FieldKind::Date,
        ..FieldDescriptor::simple("birthday", "bday")
    },
    FieldDescriptor {
        kind: FieldKind::Photo,
        ..FieldDescriptor::simple("photo", "photo")
    },
    FieldDescriptor::adr("home_city", "HOME", AdrSlot::City),
    FieldDescriptor::adr("home_country", "HOME", AdrSlot::Country),
    FieldDescriptor::adr("home_zip_code", "HOME", AdrSlot::ZipCode),
    FieldDescriptor::adr("home_state", "HOME", AdrSlot::State),
    FieldDescriptor::adr("home_street", "HOME", AdrSlot::Street),
    FieldDescriptor::adr("work_city", "WORK", AdrSlot::City),
    FieldDescriptor::adr("work_country", "WORK", AdrSlot::Country),
    FieldDescriptor::adr("work_zip_code", "WORK", AdrSlot::ZipCode),
    FieldDescriptor::adr("work_state", "WORK", AdrSlot::State),
    FieldDescriptor::adr("work_street", "WORK", AdrSlot::Street),
    FieldDescriptor {
        list: true,
        ..FieldDescriptor::simple("categories", "categories")
    },
    FieldDescriptor::simple("job_title", "title"),
    FieldDescriptor {
        kind: FieldKind::CompositeIndex(CompositeSlot::Fixed { index: 1, width: 2 }),
        ..FieldDescriptor::simple("department", "org")
    },
    FieldDescriptor {
        kind: FieldKind::CompositeIndex(CompositeSlot::Fixed { index: 0, width: 2 }),
        ..FieldDescriptor::simple("company", "org")
    },
    FieldDescriptor {
        tag: Some("WORK"),
        kind: FieldKind::TaggedType,
        ..FieldDescriptor::simple("website_work", "url")
    },
    FieldDescriptor {
        tag: Some("HOME"),
        kind: FieldKind::TaggedType,
        ..FieldDescriptor::simple("website_home", "url")
    },
    FieldDescriptor::simple("notes", "note"),
    FieldDescriptor::simple("prefers_html", "x-mozilla-html"),
    FieldDescriptor::simple("custom1", "x-mozilla-custom1"),
    FieldDescriptor::simple("custom2", "x-mozilla-custom2"),
    FieldDescriptor::simple("custom3", "x-mozilla-custom3"),
    FieldDescriptor::simple("custom4", "x-mozilla-custom4"),
    FieldDescriptor::impp("im_googletalk", "GOOGLETALK", "xmpp:"),
    FieldDescriptor::impp("im_jabber", "JABBER", "xmpp:"),
    FieldDescriptor::impp("im_yahoo", "YAHOO", "ymsgr:"),
    FieldDescriptor::impp("im_qq", "QQ", "x-apple:"),
    FieldDescriptor::impp("im_aim", "AIM", "aim:"),
    FieldDescriptor::impp("im_msn", "MSN", "msnim:"),
    FieldDescriptor::impp("im_skype", "SKYPE", "skype:"),
    FieldDescriptor::impp("im_icq", "ICQ", "aim:"),
    FieldDescriptor::impp("im_irc", "IRC", "irc:"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adr_index_depends_on_folder_schema() {
        let legacy = SchemaVersion(0, 8, 8);
        let fixed = SchemaVersion(0, 8, 11);
        assert_eq!(AdrSlot::Street.index(legacy), 2);
        assert_eq!(AdrSlot::Street.index(fixed), 2);
        assert_eq!(AdrSlot::Country.index(legacy), 4);
        assert_eq!(AdrSlot::Country.index(fixed), 6);
        assert_eq!(AdrSlot::State.index(legacy), 6);
        assert_eq!(AdrSlot::State.index(fixed), 4);
        assert_eq!(AdrSlot::ZipCode.index(legacy), 5);
        assert_eq!(AdrSlot::ZipCode.index(fixed), 5);
    }

    #[test]
    fn version_gate_excludes_later_properties() {
        let table = FIELDS;
        let old_folder = SchemaVersion(0, 8, 8);
        let affixes = table
            .iter()
            .find(|d| d.property == "name_prefix")
            .unwrap();
        assert!(!affixes.available(old_folder));
        let middle = table.iter().find(|d| d.property == "middle_name").unwrap();
        assert!(middle.available(old_folder));
        assert!(affixes.available(SchemaVersion::CURRENT));
    }

    #[test]
    fn tagged_entry_resolution() {
        let card = davsync_vcard::parse(
            "BEGIN:VCARD\r\nVERSION:3.0\r\nURL;TYPE=HOME:https://example.org\r\nURL;TYPE=WORK:https://example.com\r\nEND:VCARD\r\n",
        )
        .unwrap();
        let home = FIELDS.iter().find(|d| d.property == "website_home").unwrap();
        let work = FIELDS.iter().find(|d| d.property == "website_work").unwrap();
        assert_eq!(home.resolve_entry(&card), Some(0));
        assert_eq!(work.resolve_entry(&card), Some(1));
    }

    #[test]
    fn default_tags_for_aggregates() {
        let phones = FIELDS.iter().find(|d| d.property == "phones_json").unwrap();
        let emails = FIELDS.iter().find(|d| d.property == "emails_json").unwrap();
        assert_eq!(phones.default_tags(), vec!["VOICE".to_string()]);
        assert_eq!(emails.default_tags(), vec!["OTHER".to_string()]);
    }
}

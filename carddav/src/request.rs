// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for WebDAV/CardDAV operations.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::CardDavError;
use crate::xml::ns;

/// PROPFIND request builder.
#[derive(Debug)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

/// Properties to request in PROPFIND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Principal of the authenticated user.
    CurrentUserPrincipal,
    /// Effective privileges of the authenticated user.
    CurrentUserPrivilegeSet,
    /// Address book home set.
    AddressbookHomeSet,
    /// Calendar home set.
    CalendarHomeSet,
    /// Collection tag.
    GetCtag,
    /// Collection sync token.
    SyncToken,
    /// Subscription source of a subscribed collection.
    Source,
    /// Display color.
    CalendarColor,
    /// Principals the user may read calendars for.
    CalendarProxyReadFor,
    /// Principals the user may write calendars for.
    CalendarProxyWriteFor,
    /// Group principals the user belongs to.
    GroupMembership,
}

impl Prop {
    const fn name(self) -> &'static str {
        match self {
            Self::DisplayName => "displayname",
            Self::ResourceType => "resourcetype",
            Self::GetETag => "getetag",
            Self::CurrentUserPrincipal => "current-user-principal",
            Self::CurrentUserPrivilegeSet => "current-user-privilege-set",
            Self::AddressbookHomeSet => "addressbook-home-set",
            Self::CalendarHomeSet => "calendar-home-set",
            Self::GetCtag => "getctag",
            Self::SyncToken => "sync-token",
            Self::Source => "source",
            Self::CalendarColor => "calendar-color",
            Self::CalendarProxyReadFor => "calendar-proxy-read-for",
            Self::CalendarProxyWriteFor => "calendar-proxy-write-for",
            Self::GroupMembership => "group-membership",
        }
    }

    /// XML prefix and namespace the property lives in.
    const fn prefix(self) -> (&'static str, &'static str) {
        match self {
            Self::DisplayName
            | Self::ResourceType
            | Self::GetETag
            | Self::CurrentUserPrincipal
            | Self::CurrentUserPrivilegeSet
            | Self::SyncToken
            | Self::GroupMembership => ("D", ns::DAV),
            Self::AddressbookHomeSet => ("card", ns::CARDDAV),
            Self::CalendarHomeSet => ("C", ns::CALDAV),
            Self::GetCtag
            | Self::Source
            | Self::CalendarProxyReadFor
            | Self::CalendarProxyWriteFor => ("cs", ns::CALENDARSERVER),
            Self::CalendarColor => ("apple", ns::APPLE),
        }
    }
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        self.props.push(prop);
        self
    }

    /// Builds the XML body for the PROPFIND request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <D:propfind xmlns:D="DAV:" ...>
        let mut propfind = BytesStart::new("D:propfind");
        propfind.push_attribute(("xmlns:D", ns::DAV));
        for (prefix, uri) in [
            ("card", ns::CARDDAV),
            ("C", ns::CALDAV),
            ("cs", ns::CALENDARSERVER),
            ("apple", ns::APPLE),
        ] {
            if self.props.iter().any(|p| p.prefix().0 == prefix) {
                propfind.push_attribute((format!("xmlns:{prefix}").as_str(), uri));
            }
        }
        writer.write_event(Event::Start(propfind))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;

        for prop in &self.props {
            let (prefix, _) = prop.prefix();
            let name = format!("{prefix}:{}", prop.name());
            writer.write_event(Event::Empty(BytesStart::new(name.as_str())))?;
        }

        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
        writer.write_event(Event::End(BytesEnd::new("D:propfind")))?;

        into_string(writer)
    }
}

impl Default for PropFindRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// sync-collection REPORT request builder.
#[derive(Debug)]
pub struct SyncCollectionRequest {
    token: String,
}

impl SyncCollectionRequest {
    /// Creates a new sync-collection request. An empty token requests
    /// the full listing plus an initial token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Builds the XML body for the sync-collection request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <D:sync-collection xmlns:D="DAV:">
        let mut report = BytesStart::new("D:sync-collection");
        report.push_attribute(("xmlns:D", ns::DAV));
        writer.write_event(Event::Start(report))?;

        if self.token.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new("D:sync-token")))?;
        } else {
            writer.write_event(Event::Start(BytesStart::new("D:sync-token")))?;
            writer.write_event(Event::Text(BytesText::new(&self.token)))?;
            writer.write_event(Event::End(BytesEnd::new("D:sync-token")))?;
        }

        writer.write_event(Event::Start(BytesStart::new("D:sync-level")))?;
        writer.write_event(Event::Text(BytesText::new("1")))?;
        writer.write_event(Event::End(BytesEnd::new("D:sync-level")))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Empty(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        writer.write_event(Event::End(BytesEnd::new("D:sync-collection")))?;

        into_string(writer)
    }
}

/// addressbook-multiget REPORT request builder.
#[derive(Debug)]
pub struct AddressbookMultiGetRequest {
    hrefs: Vec<String>,
}

impl AddressbookMultiGetRequest {
    /// Creates a new addressbook multiget request.
    #[must_use]
    pub fn new() -> Self {
        Self { hrefs: Vec::new() }
    }

    /// Adds an href to the request.
    pub fn add_href(&mut self, href: String) -> &mut Self {
        self.hrefs.push(href);
        self
    }

    /// Builds the XML body for the addressbook multiget request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <card:addressbook-multiget xmlns:D="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
        let mut multiget = BytesStart::new("card:addressbook-multiget");
        multiget.push_attribute(("xmlns:D", ns::DAV));
        multiget.push_attribute(("xmlns:card", ns::CARDDAV));
        writer.write_event(Event::Start(multiget))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Empty(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::Empty(BytesStart::new("card:address-data")))?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        for href in &self.hrefs {
            writer.write_event(Event::Start(BytesStart::new("D:href")))?;
            writer.write_event(Event::Text(BytesText::new(href.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new("D:href")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("card:addressbook-multiget")))?;

        into_string(writer)
    }
}

impl Default for AddressbookMultiGetRequest {
    fn default() -> Self {
        Self::new()
    }
}

fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, CardDavError> {
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| CardDavError::Xml(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propfind_declares_only_used_namespaces() {
        let mut req = PropFindRequest::new();
        req.add_property(Prop::CurrentUserPrincipal);
        let body = req.build().unwrap();
        assert!(body.contains("xmlns:D=\"DAV:\""));
        assert!(!body.contains("xmlns:card"));
        assert!(body.contains("<D:current-user-principal/>"));

        let mut req = PropFindRequest::new();
        req.add_property(Prop::AddressbookHomeSet);
        req.add_property(Prop::GetCtag);
        let body = req.build().unwrap();
        assert!(body.contains("xmlns:card=\"urn:ietf:params:xml:ns:carddav\""));
        assert!(body.contains("xmlns:cs=\"http://calendarserver.org/ns/\""));
        assert!(body.contains("<card:addressbook-home-set/>"));
        assert!(body.contains("<cs:getctag/>"));
    }

    #[test]
    fn sync_collection_with_empty_token() {
        let body = SyncCollectionRequest::new("").build().unwrap();
        assert!(body.contains("<D:sync-token/>"));
        assert!(body.contains("<D:sync-level>1</D:sync-level>"));
        assert!(body.contains("<D:getetag/>"));
    }

    #[test]
    fn sync_collection_with_token() {
        let body = SyncCollectionRequest::new("http://example.com/sync/9")
            .build()
            .unwrap();
        assert!(body.contains("<D:sync-token>http://example.com/sync/9</D:sync-token>"));
    }

    #[test]
    fn multiget_lists_hrefs() {
        let mut req = AddressbookMultiGetRequest::new();
        req.add_href("/books/jane/contacts/a.vcf".to_string());
        req.add_href("/books/jane/contacts/b.vcf".to_string());
        let body = req.build().unwrap();
        assert!(body.contains("<card:address-data/>"));
        assert!(body.contains("<D:href>/books/jane/contacts/a.vcf</D:href>"));
        assert!(body.contains("<D:href>/books/jane/contacts/b.vcf</D:href>"));
    }
}

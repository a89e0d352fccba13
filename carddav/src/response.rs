// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for WebDAV/CardDAV operations.

use quick_xml::events::Event;

use crate::error::CardDavError;
use crate::types::{ETag, Href};

/// `WebDAV` multistatus response.
#[derive(Debug, Clone)]
pub struct MultiStatus {
    /// The response items.
    pub responses: Vec<ResponseItem>,
    /// Top-level sync token, present on sync-collection reports.
    pub sync_token: Option<String>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// Href the response refers to.
    pub href: Href,
    /// Property groups, one per reported status.
    pub prop_stats: Vec<PropStat>,
    /// Response-level status; sync-collection tombstones carry a 404
    /// here with no propstat at all.
    pub status: Option<String>,
}

/// Property stat with status and value.
#[derive(Debug, Clone)]
pub struct PropStat {
    /// The parsed properties.
    pub props: Properties,
    /// Raw status line for this group.
    pub status: String,
}

/// WebDAV/CardDAV properties.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// `d:displayname`.
    pub display_name: Option<String>,
    /// `d:getetag`.
    pub get_etag: Option<ETag>,
    /// `cs:getctag`.
    pub get_ctag: Option<String>,
    /// `d:sync-token`, when requested as a property.
    pub sync_token: Option<String>,
    /// `card:address-data` payload.
    pub address_data: Option<String>,
    /// `d:current-user-principal`.
    pub current_user_principal: Option<Href>,
    /// Addressbook/calendar home-set hrefs.
    pub home_set: Vec<Href>,
    /// Proxy home hrefs granted by other principals.
    pub proxy_home_set: Vec<Href>,
    /// Group principals the user belongs to.
    pub group_membership: Vec<Href>,
    /// Privilege names from `d:current-user-privilege-set`.
    pub privileges: Vec<String>,
    /// `cs:source` of a subscribed calendar.
    pub source: Option<Href>,
    /// `apple:calendar-color`.
    pub color: Option<String>,
    /// Resourcetype contains `d:collection`.
    pub is_collection: bool,
    /// Resourcetype contains `card:addressbook`.
    pub is_addressbook: bool,
    /// Resourcetype contains `cal:calendar`.
    pub is_calendar: bool,
    /// Resourcetype contains `cs:subscribed`.
    pub is_subscription: bool,
}

impl ResponseItem {
    /// Merges the properties of every 2xx propstat into one view.
    #[must_use]
    pub fn ok_props(&self) -> Properties {
        let mut merged = Properties::default();
        for prop_stat in &self.prop_stats {
            if !is_ok_status(&prop_stat.status) {
                continue;
            }
            let p = &prop_stat.props;
            merge_opt(&mut merged.display_name, &p.display_name);
            merge_opt(&mut merged.get_etag, &p.get_etag);
            merge_opt(&mut merged.get_ctag, &p.get_ctag);
            merge_opt(&mut merged.sync_token, &p.sync_token);
            merge_opt(&mut merged.address_data, &p.address_data);
            merge_opt(&mut merged.current_user_principal, &p.current_user_principal);
            merged.home_set.extend(p.home_set.iter().cloned());
            merged.proxy_home_set.extend(p.proxy_home_set.iter().cloned());
            merged.group_membership.extend(p.group_membership.iter().cloned());
            merged.privileges.extend(p.privileges.iter().cloned());
            merge_opt(&mut merged.source, &p.source);
            merge_opt(&mut merged.color, &p.color);
            merged.is_collection |= p.is_collection;
            merged.is_addressbook |= p.is_addressbook;
            merged.is_calendar |= p.is_calendar;
            merged.is_subscription |= p.is_subscription;
        }
        merged
    }

    /// True when the response-level status marks the item as gone.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.contains("404") || s.contains("410"))
    }
}

fn is_ok_status(status: &str) -> bool {
    status.contains("200") || status.contains("207")
}

fn merge_opt<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if dst.is_none() && src.is_some() {
        dst.clone_from(src);
    }
}

impl MultiStatus {
    /// Parses a multistatus response from XML.
    ///
    /// # Errors
    ///
    /// Returns an error if XML parsing fails.
    #[expect(clippy::too_many_lines)]
    pub fn from_xml(xml: &str) -> Result<Self, CardDavError> {
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        reader.config_mut().check_end_names = true;

        let mut responses = Vec::new();
        let mut sync_token = None;
        let mut current_response: Option<ResponseItem> = None;
        let mut current_prop_stats: Vec<PropStat> = Vec::new();
        let mut current_props: Properties = Properties::default();
        let mut in_prop = false;
        let mut in_response = false;
        let mut in_propstat = false;

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::End(ref e) if e.name().local_name().into_inner() == b"multistatus" => break,
                Event::Eof => break,

                Event::Start(ref e) => {
                    match e.name().local_name().into_inner() {
                        b"response" => {
                            in_response = true;
                            current_response = Some(ResponseItem {
                                href: Href::new(String::new()),
                                prop_stats: Vec::new(),
                                status: None,
                            });
                        }
                        b"href" if in_response && !in_prop => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                let href = text.xml_content()?.to_string();
                                if let Some(ref mut resp) = current_response {
                                    resp.href = Href::new(href);
                                }
                            }
                        }
                        b"propstat" if in_response => {
                            in_propstat = true;
                            current_props = Properties::default();
                        }

                        b"prop" => in_prop = true,

                        b"displayname" if in_prop => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                current_props.display_name = Some(text.xml_content()?.to_string());
                            }
                        }
                        b"resourcetype" if in_prop => {
                            current_props.is_collection = true;
                            loop {
                                match reader.read_event_into(&mut buf)? {
                                    Event::End(ref e)
                                        if e.name().local_name().into_inner()
                                            == b"resourcetype" =>
                                    {
                                        break;
                                    }
                                    Event::Start(ref e) | Event::Empty(ref e) => {
                                        match e.name().local_name().into_inner() {
                                            b"addressbook" => current_props.is_addressbook = true,
                                            b"calendar" => current_props.is_calendar = true,
                                            b"subscribed" => current_props.is_subscription = true,
                                            _ => {}
                                        }
                                    }
                                    Event::Eof => {
                                        return Err(CardDavError::Xml(
                                            "Unexpected EOF".to_string(),
                                        ));
                                    }
                                    _ => {}
                                }
                            }
                        }
                        b"getetag" if in_prop => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                current_props.get_etag =
                                    Some(ETag::new(text.xml_content()?.to_string()));
                            }
                        }
                        b"getctag" if in_prop => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                current_props.get_ctag = Some(text.xml_content()?.to_string());
                            }
                        }
                        b"sync-token" if in_prop => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                current_props.sync_token = Some(text.xml_content()?.to_string());
                            }
                        }
                        b"sync-token" if !in_response => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                sync_token = Some(text.xml_content()?.to_string());
                            }
                        }
                        b"address-data" if in_prop => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                current_props.address_data = Some(text.xml_content()?.to_string());
                            }
                        }
                        b"calendar-color" if in_prop => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                current_props.color = Some(text.xml_content()?.to_string());
                            }
                        }
                        b"current-user-principal" if in_prop => {
                            current_props.current_user_principal =
                                read_single_href(&mut reader, b"current-user-principal")?;
                        }
                        b"source" if in_prop => {
                            current_props.source = read_single_href(&mut reader, b"source")?;
                        }
                        b"addressbook-home-set" | b"calendar-home-set" if in_prop => {
                            let end: &[u8] = if e.name().local_name().into_inner()
                                == b"addressbook-home-set"
                            {
                                b"addressbook-home-set"
                            } else {
                                b"calendar-home-set"
                            };
                            read_hrefs(&mut reader, end, &mut current_props.home_set)?;
                        }
                        b"calendar-proxy-read-for" | b"calendar-proxy-write-for" if in_prop => {
                            let end: &[u8] = if e.name().local_name().into_inner()
                                == b"calendar-proxy-read-for"
                            {
                                b"calendar-proxy-read-for"
                            } else {
                                b"calendar-proxy-write-for"
                            };
                            read_hrefs(&mut reader, end, &mut current_props.proxy_home_set)?;
                        }
                        b"group-membership" if in_prop => {
                            read_hrefs(
                                &mut reader,
                                b"group-membership",
                                &mut current_props.group_membership,
                            )?;
                        }
                        b"current-user-privilege-set" if in_prop => {
                            read_privileges(&mut reader, &mut current_props.privileges)?;
                        }
                        b"status" if in_propstat => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                let status = text.xml_content()?.to_string();
                                current_prop_stats.push(PropStat {
                                    props: current_props.clone(),
                                    status,
                                });
                            }
                        }
                        b"status" if in_response => {
                            if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                                if let Some(ref mut resp) = current_response {
                                    resp.status = Some(text.xml_content()?.to_string());
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => match e.name().local_name().into_inner() {
                    b"response" if in_response => {
                        in_response = false;
                        if let Some(mut resp) = current_response.take() {
                            resp.prop_stats.clone_from(&current_prop_stats);
                            current_prop_stats.clear();
                            responses.push(resp);
                        }
                    }
                    b"propstat" if in_propstat => {
                        in_propstat = false;
                    }
                    b"prop" => {
                        in_prop = false;
                    }
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            responses,
            sync_token,
        })
    }

    /// Finds the response item whose href names the requested path,
    /// tolerating percent-encoding differences.
    #[must_use]
    pub fn response_for(&self, path: &str) -> Option<&ResponseItem> {
        self.responses.iter().find(|r| r.href.matches(path))
    }
}

fn read_single_href<R: std::io::BufRead>(
    reader: &mut quick_xml::Reader<R>,
    end: &[u8],
) -> Result<Option<Href>, CardDavError> {
    let mut hrefs = Vec::new();
    read_hrefs(reader, end, &mut hrefs)?;
    Ok(hrefs.into_iter().next())
}

fn read_hrefs<R: std::io::BufRead>(
    reader: &mut quick_xml::Reader<R>,
    end: &[u8],
    out: &mut Vec<Href>,
) -> Result<(), CardDavError> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::End(ref e) if e.name().local_name().into_inner() == end => break,
            Event::Start(ref e) if e.name().local_name().into_inner() == b"href" => {
                if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                    out.push(Href::new(text.xml_content()?.to_string()));
                }
            }
            Event::Eof => return Err(CardDavError::Xml("Unexpected EOF".to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn read_privileges<R: std::io::BufRead>(
    reader: &mut quick_xml::Reader<R>,
    out: &mut Vec<String>,
) -> Result<(), CardDavError> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::End(ref e)
                if e.name().local_name().into_inner() == b"current-user-privilege-set" =>
            {
                break;
            }
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = e.name().local_name().into_inner().to_vec();
                if name != b"privilege" {
                    out.push(String::from_utf8_lossy(&name).to_string());
                }
            }
            Event::Eof => return Err(CardDavError::Xml("Unexpected EOF".to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRINCIPAL_XML: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/.well-known/carddav</d:href>
    <d:propstat>
      <d:prop>
        <d:current-user-principal>
          <d:href>/principals/users/jane/</d:href>
        </d:current-user-principal>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn parses_current_user_principal() {
        let ms = MultiStatus::from_xml(PRINCIPAL_XML).unwrap();
        let props = ms.responses[0].ok_props();
        assert_eq!(
            props.current_user_principal.unwrap().as_str(),
            "/principals/users/jane/"
        );
    }

    #[test]
    fn parses_resourcetype_and_privileges() {
        let xml = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/books/jane/contacts/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/><card:addressbook/></d:resourcetype>
        <d:displayname>Contacts</d:displayname>
        <d:current-user-privilege-set>
          <d:privilege><d:read/></d:privilege>
          <d:privilege><d:write-content/></d:privilege>
        </d:current-user-privilege-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        let ms = MultiStatus::from_xml(xml).unwrap();
        let props = ms.responses[0].ok_props();
        assert!(props.is_addressbook);
        assert!(props.is_collection);
        assert!(!props.is_calendar);
        assert_eq!(props.display_name.as_deref(), Some("Contacts"));
        assert_eq!(props.privileges, vec!["read", "write-content"]);
    }

    #[test]
    fn parses_sync_collection_report() {
        let xml = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/books/jane/contacts/a.vcf</d:href>
    <d:propstat>
      <d:prop><d:getetag>"33441-34321"</d:getetag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/books/jane/contacts/gone.vcf</d:href>
    <d:status>HTTP/1.1 404 Not Found</d:status>
  </d:response>
  <d:sync-token>http://example.com/sync/1234</d:sync-token>
</d:multistatus>"#;
        let ms = MultiStatus::from_xml(xml).unwrap();
        assert_eq!(ms.sync_token.as_deref(), Some("http://example.com/sync/1234"));
        assert_eq!(
            ms.responses[0].ok_props().get_etag.unwrap().as_str(),
            "\"33441-34321\""
        );
        assert!(!ms.responses[0].is_removed());
        assert!(ms.responses[1].is_removed());
    }

    #[test]
    fn response_for_matches_encoded_href() {
        let xml = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/books/j%C3%A4ne/</d:href>
    <d:propstat>
      <d:prop><d:displayname>Umlaut</d:displayname></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        let ms = MultiStatus::from_xml(xml).unwrap();
        assert!(ms.response_for("/books/jäne/").is_some());
    }

    #[test]
    fn missing_props_reported_as_404_are_ignored() {
        let xml = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:cs="http://calendarserver.org/ns/">
  <d:response>
    <d:href>/books/jane/contacts/</d:href>
    <d:propstat>
      <d:prop><cs:getctag>ctag-7</cs:getctag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
    <d:propstat>
      <d:prop><d:sync-token/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        let ms = MultiStatus::from_xml(xml).unwrap();
        let props = ms.responses[0].ok_props();
        assert_eq!(props.get_ctag.as_deref(), Some("ctag-7"));
        assert!(props.sync_token.is_none());
    }
}

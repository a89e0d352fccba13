// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Folder discovery: the principal, home-set and collection walk.
//!
//! Discovery runs once per service class and per account sync. It
//! resolves the current-user principal from the service root, expands
//! the principal into the set of home collections (own, proxied, and
//! one level of group membership), then lists each home at depth 1 and
//! folds every readable matching collection into the account's folder
//! list.

use std::collections::BTreeSet;

use reqwest::Url;

use crate::account::Account;
use crate::error::CardDavError;
use crate::http::{DavOutcome, DavResponse, HttpClient, SOFTFAIL_MISSING};
use crate::request::{Prop, PropFindRequest};
use crate::response::{MultiStatus, Properties};
use crate::types::{Acl, FolderKind, FolderRecord, Href, Service};

/// Result of one discovery pass for a service.
#[derive(Debug)]
pub struct DiscoveryReport {
    /// Hrefs of every collection the server reported for the service.
    pub found: Vec<Href>,
    /// Whether the home-set resolution produced at least one home
    /// collection. When false the existing folder list must not be
    /// pruned: an empty home list cannot be told apart from a transient
    /// server failure, and pruning on it would delete healthy folders.
    pub authoritative: bool,
}

/// Runs the discovery walk for one service and folds every reported
/// collection into the account's folder list.
///
/// Known folders are refreshed in place, new ones are adopted (with
/// cached snapshot restoration). Pruning folders the server stopped
/// reporting is left to the caller, gated on
/// [`DiscoveryReport::authoritative`].
///
/// # Errors
///
/// Returns [`CardDavError::ServiceNotConfigured`] when the provider has
/// no URL for the service, [`CardDavError::PrincipalNotFound`] when the
/// service root does not expose a current-user principal, and any hard
/// transport or parse error. Per-home and per-group probes answering
/// 403/404 are soft failures and merely skip that resource.
pub async fn discover_folders(
    http: &HttpClient,
    account: &mut Account,
    service: Service,
) -> Result<DiscoveryReport, CardDavError> {
    let root = account
        .config
        .provider
        .discovery_url(service)
        .ok_or(CardDavError::ServiceNotConfigured(service))?;
    let base = parse_url(&root)?;

    let principal = resolve_principal(http, &root).await?;
    tracing::debug!(principal = %principal, "resolved current-user principal");

    let (own, homes) = resolve_home_sets(http, &base, &principal, service).await?;
    if homes.is_empty() {
        tracing::warn!(?service, "no home collection resolved, keeping folder list");
        return Ok(DiscoveryReport {
            found: Vec::new(),
            authoritative: false,
        });
    }

    let mut found = Vec::new();
    for home in &homes {
        let url = join_url(&base, home.as_str())?;
        let body = collection_props(service)?;
        // Some servers report a proxy home-set and then 404 the listing.
        let Some(listing) = run_propfind(http, &url, "1", body, SOFTFAIL_MISSING).await? else {
            continue;
        };
        let origin = listing
            .origin
            .clone()
            .unwrap_or_else(|| base.origin().ascii_serialization());

        let multi = MultiStatus::from_xml(&listing.body)?;
        for item in &multi.responses {
            let props = item.ok_props();
            let Some(kind) = collection_kind(service, &props) else {
                continue;
            };

            let acl = acl_from_privileges(&props.privileges);
            if !acl.can_read() {
                continue;
            }

            // Subscribed calendars point at their feed, not at the
            // collection that announced them.
            let href = if kind == FolderKind::Ics {
                match props.source.clone() {
                    Some(source) => source,
                    None => continue,
                }
            } else {
                item.href.clone()
            };

            let name = props
                .display_name
                .clone()
                .unwrap_or_else(|| default_name(service).to_string());

            let mut folder = FolderRecord::new(href.clone(), kind, name, acl);
            folder.shared = !own.contains(home);
            folder.origin = origin.clone();
            if service == Service::Calendar {
                folder.color = props.color.as_deref().map(|c| c.chars().take(7).collect());
            }

            found.push(href);
            account.refresh_folder(folder);
        }
    }

    Ok(DiscoveryReport {
        found,
        authoritative: true,
    })
}

async fn resolve_principal(http: &HttpClient, root: &str) -> Result<Href, CardDavError> {
    let mut req = PropFindRequest::new();
    req.add_property(Prop::CurrentUserPrincipal);
    let resp = run_propfind(http, root, "0", req.build()?, &[])
        .await?
        .ok_or_else(|| CardDavError::PrincipalNotFound(root.to_string()))?;

    let multi = MultiStatus::from_xml(&resp.body)?;
    multi
        .responses
        .iter()
        .find_map(|item| item.ok_props().current_user_principal)
        .ok_or_else(|| CardDavError::PrincipalNotFound(root.to_string()))
}

/// Expands the principal into `(own, all)` home-set lists. `own` keeps
/// only the user's directly owned homes so collections found under a
/// proxied or group home can be flagged shared.
async fn resolve_home_sets(
    http: &HttpClient,
    base: &Url,
    principal: &Href,
    service: Service,
) -> Result<(Vec<Href>, Vec<Href>), CardDavError> {
    let url = join_url(base, principal.as_str())?;
    let Some(resp) = run_propfind(http, &url, "0", home_set_props(service, true)?, &[]).await?
    else {
        return Ok((Vec::new(), Vec::new()));
    };

    let mut own = Vec::new();
    let mut homes = Vec::new();
    let mut groups = Vec::new();
    let multi = MultiStatus::from_xml(&resp.body)?;
    for item in &multi.responses {
        let props = item.ok_props();
        own.extend(props.home_set.iter().cloned());
        homes.extend(props.home_set);
        homes.extend(props.proxy_home_set);
        groups.extend(props.group_membership);
    }

    // Some servers 403 a direct query on a group principal, and one
    // level deep is as far as the walk goes, so the group query drops
    // the membership property and soft-fails.
    let group_body = home_set_props(service, false)?;
    for group in &groups {
        let url = join_url(base, group.as_str())?;
        let Some(resp) =
            run_propfind(http, &url, "0", group_body.clone(), SOFTFAIL_MISSING).await?
        else {
            continue;
        };
        let multi = MultiStatus::from_xml(&resp.body)?;
        for item in &multi.responses {
            homes.extend(item.ok_props().home_set);
        }
    }

    // Proxy and group expansion may re-report the owned homes.
    let mut seen = BTreeSet::new();
    homes.retain(|h| seen.insert(h.clone()));

    Ok((own, homes))
}

fn home_set_props(service: Service, with_membership: bool) -> Result<String, CardDavError> {
    let mut req = PropFindRequest::new();
    match service {
        Service::Contacts => {
            req.add_property(Prop::AddressbookHomeSet);
        }
        Service::Calendar => {
            req.add_property(Prop::CalendarHomeSet);
            req.add_property(Prop::CalendarProxyWriteFor);
            req.add_property(Prop::CalendarProxyReadFor);
        }
    }
    if with_membership {
        req.add_property(Prop::GroupMembership);
    }
    req.build()
}

fn collection_props(service: Service) -> Result<String, CardDavError> {
    let mut req = PropFindRequest::new();
    req.add_property(Prop::CurrentUserPrivilegeSet);
    req.add_property(Prop::ResourceType);
    req.add_property(Prop::DisplayName);
    if service == Service::Calendar {
        req.add_property(Prop::CalendarColor);
        req.add_property(Prop::Source);
    }
    req.build()
}

fn collection_kind(service: Service, props: &Properties) -> Option<FolderKind> {
    match service {
        Service::Contacts if props.is_addressbook => Some(FolderKind::CardDav),
        Service::Calendar if props.is_calendar => Some(FolderKind::CalDav),
        Service::Calendar if props.is_subscription => Some(FolderKind::Ics),
        _ => None,
    }
}

/// Derives the access bitmask from the reported privilege names.
///
/// `all` grants everything, as does `read` + `write`. Plain `read`
/// starts the mask, and the fine-grained `write-content`, `bind` and
/// `unbind` privileges add their bits individually. No `read` means no
/// access at all.
#[must_use]
pub fn acl_from_privileges(privileges: &[String]) -> Acl {
    let has = |name: &str| privileges.iter().any(|p| p == name);

    let mut bits = 0;
    if has("all") {
        bits = Acl::ALL;
    } else if has("read") {
        bits = Acl::READ;
        if has("write") {
            bits = Acl::ALL;
        } else {
            if has("write-content") {
                bits |= Acl::WRITE_CONTENT;
            }
            if has("bind") {
                bits |= Acl::CREATE;
            }
            if has("unbind") {
                bits |= Acl::DELETE;
            }
        }
    }
    Acl::from_bits(bits)
}

const fn default_name(service: Service) -> &'static str {
    match service {
        Service::Contacts => "Contacts",
        Service::Calendar => "Calendar",
    }
}

async fn run_propfind(
    http: &HttpClient,
    url: &str,
    depth: &str,
    body: String,
    softfail: &[u16],
) -> Result<Option<DavResponse>, CardDavError> {
    let req = http.propfind(url, depth, body)?;
    match http.execute(req, softfail).await? {
        DavOutcome::Success(resp) => Ok(Some(resp)),
        DavOutcome::Expected(_) => Ok(None),
    }
}

fn parse_url(url: &str) -> Result<Url, CardDavError> {
    Url::parse(url).map_err(|e| CardDavError::Http(format!("invalid URL {url}: {e}")))
}

fn join_url(base: &Url, href: &str) -> Result<String, CardDavError> {
    let joined = base
        .join(href)
        .map_err(|e| CardDavError::Http(format!("invalid href {href}: {e}")))?;
    Ok(joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn privs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn all_privilege_grants_full_mask() {
        assert_eq!(acl_from_privileges(&privs(&["all"])).bits(), 0xF);
    }

    #[test]
    fn read_plus_write_grants_full_mask() {
        assert_eq!(acl_from_privileges(&privs(&["read", "write"])).bits(), 0xF);
    }

    #[test]
    fn read_only_grants_read_bit() {
        let acl = acl_from_privileges(&privs(&["read"]));
        assert_eq!(acl.bits(), 0x1);
        assert!(acl.can_read());
        assert!(!acl.can_write());
    }

    #[test]
    fn fine_grained_bits_are_additive() {
        let acl = acl_from_privileges(&privs(&["read", "write-content", "bind"]));
        assert_eq!(acl.bits(), 0x1 | 0x2 | 0x4);
    }

    #[test]
    fn write_without_read_grants_nothing() {
        let acl = acl_from_privileges(&privs(&["write"]));
        assert!(!acl.can_read());
        assert_eq!(acl.bits(), 0);
    }
}

// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

use crate::types::Service;

/// `DAV` authentication method.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "type")]
pub enum AuthMethod {
    /// No authentication.
    #[serde(rename = "none")]
    #[default]
    None,
    /// Basic authentication (username/password).
    #[serde(rename = "basic")]
    Basic {
        /// Username for authentication.
        username: String,
        /// Password for authentication.
        password: String,
    },
    /// Bearer token authentication (OAuth).
    #[serde(rename = "bearer")]
    Bearer {
        /// Bearer token.
        token: String,
    },
}

/// Known providers with fixed discovery endpoints. `Custom` carries the
/// user-entered server URL; the `Dav` variants perform well-known
/// bootstrapping against that URL instead of using it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "provider")]
pub enum ServiceProvider {
    /// User-entered URLs, one per service.
    #[serde(rename = "custom")]
    Custom {
        /// `CardDAV` discovery URL, if contacts are enabled.
        carddav_url: Option<String>,
        /// `CalDAV` discovery URL, if calendars are enabled.
        caldav_url: Option<String>,
    },
    /// Single server URL, bootstrapped via `/.well-known/{carddav,caldav}`.
    #[serde(rename = "discovery")]
    WellKnown {
        /// Server base URL.
        server_url: String,
    },
    /// Fruux preset.
    #[serde(rename = "fruux")]
    Fruux,
    /// mailbox.org preset.
    #[serde(rename = "mbo")]
    MailboxOrg,
    /// iCloud preset.
    #[serde(rename = "icloud")]
    ICloud,
}

impl ServiceProvider {
    /// Resolves the discovery URL for a service, or `None` when the
    /// provider does not carry that service.
    #[must_use]
    pub fn discovery_url(&self, service: Service) -> Option<String> {
        match self {
            Self::Custom {
                carddav_url,
                caldav_url,
            } => match service {
                Service::Contacts => carddav_url.clone(),
                Service::Calendar => caldav_url.clone(),
            },
            Self::WellKnown { server_url } => {
                let base = server_url.trim_end_matches('/');
                Some(match service {
                    Service::Contacts => format!("{base}/.well-known/carddav"),
                    Service::Calendar => format!("{base}/.well-known/caldav"),
                })
            }
            Self::Fruux => Some("https://dav.fruux.com".to_string()),
            Self::MailboxOrg => Some("https://dav.mailbox.org".to_string()),
            Self::ICloud => Some(match service {
                Service::Contacts => "https://contacts.icloud.com".to_string(),
                Service::Calendar => "https://caldav.icloud.com".to_string(),
            }),
        }
    }
}

/// `CardDAV`/`CalDAV` account configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AccountConfig {
    /// Account display name.
    pub name: String,
    /// Where to look for the service endpoints.
    pub provider: ServiceProvider,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Sync contacts collections.
    #[serde(default = "default_true")]
    pub sync_contacts: bool,
    /// Sync calendar collections.
    #[serde(default = "default_true")]
    pub sync_calendars: bool,
    /// Sync mailing-list groups alongside plain contacts.
    #[serde(default = "default_true")]
    pub sync_groups: bool,
    /// Largest number of items fetched or deleted per request batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Delay between bulk item requests, in milliseconds. Some servers
    /// throttle rapid-fire deletes.
    #[serde(default = "default_pacing")]
    pub pacing_ms: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_true() -> bool {
    true
}

const fn default_timeout() -> u64 {
    30
}

const fn default_pacing() -> u64 {
    50
}

const fn default_batch_size() -> usize {
    50
}

fn default_user_agent() -> String {
    concat!("davsync-carddav/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: ServiceProvider::Custom {
                carddav_url: None,
                caldav_url: None,
            },
            auth: AuthMethod::default(),
            sync_contacts: default_true(),
            sync_calendars: default_true(),
            sync_groups: default_true(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout(),
            pacing_ms: default_pacing(),
            user_agent: default_user_agent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_bootstrap_urls() {
        let provider = ServiceProvider::WellKnown {
            server_url: "https://dav.example.com/".to_string(),
        };
        assert_eq!(
            provider.discovery_url(Service::Contacts).as_deref(),
            Some("https://dav.example.com/.well-known/carddav")
        );
        assert_eq!(
            provider.discovery_url(Service::Calendar).as_deref(),
            Some("https://dav.example.com/.well-known/caldav")
        );
    }

    #[test]
    fn custom_provider_may_omit_a_service() {
        let provider = ServiceProvider::Custom {
            carddav_url: Some("https://dav.example.com/contacts".to_string()),
            caldav_url: None,
        };
        assert!(provider.discovery_url(Service::Contacts).is_some());
        assert!(provider.discovery_url(Service::Calendar).is_none());
    }

    #[test]
    fn icloud_preset_splits_by_service() {
        let provider = ServiceProvider::ICloud;
        assert_eq!(
            provider.discovery_url(Service::Contacts).as_deref(),
            Some("https://contacts.icloud.com")
        );
        assert_eq!(
            provider.discovery_url(Service::Calendar).as_deref(),
            Some("https://caldav.icloud.com")
        );
    }
}

// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

use crate::types::Href;

/// `CardDAV` engine errors.
///
/// Soft transport failures (expected non-2xx statuses) are not errors;
/// they surface as [`crate::http::DavOutcome::Expected`]. Everything here
/// is a hard failure that aborts the current folder or service operation.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CardDavError {
    /// HTTP layer error (connection, timeout, unexpected status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Unexpected non-2xx status outside the soft-fail set.
    #[error("unexpected status {status} for {path}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
    },

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// vCard codec error.
    #[error("vCard error: {0}")]
    VCard(#[from] davsync_vcard::VCardError),

    /// No server configured for the requested service.
    #[error("no server configured for service {0:?}")]
    ServiceNotConfigured(crate::types::Service),

    /// The current-user principal could not be resolved.
    #[error("principal not found on {0}")]
    PrincipalNotFound(String),

    /// The collection tag kept changing across the bounded full-sync loop.
    #[error("collection tag of {0} never stabilized")]
    UnstableCollection(Href),

    /// A response was missing a node the protocol requires.
    #[error("invalid server response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CardDavError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<quick_xml::Error> for CardDavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::encoding::EncodingError> for CardDavError {
    fn from(e: quick_xml::encoding::EncodingError) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<std::io::Error> for CardDavError {
    fn from(e: std::io::Error) -> Self {
        Self::Xml(format!("IO error: {e}"))
    }
}

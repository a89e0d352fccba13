// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP client wrapper with authentication and soft-fail handling.

use reqwest::{Client, Method, RequestBuilder};

use crate::config::{AccountConfig, AuthMethod};
use crate::error::CardDavError;
use crate::types::ETag;

/// Soft-fail set for discovery probes: a home or group principal that
/// answers 403/404 is skipped, not fatal.
pub const SOFTFAIL_MISSING: &[u16] = &[403, 404];

/// Soft-fail set for sync-collection reports. Sabre answers 415 on an
/// empty collection with token 0 and 403 on an invalid token; both mean
/// "fall back to a full listing".
pub const SOFTFAIL_TOKEN: &[u16] = &[403, 415];

/// Soft-fail set for item writes; both mark a permission failure.
pub const SOFTFAIL_PUT: &[u16] = &[403, 405];

/// Soft-fail set for item deletes. A 404 here means the item is already
/// gone, which is as good as deleted.
pub const SOFTFAIL_DELETE: &[u16] = &[403, 404, 405];

/// Outcome of a DAV request: either a successful response or a status
/// code the caller declared as expected.
#[derive(Debug)]
pub enum DavOutcome {
    /// A 2xx response.
    Success(DavResponse),
    /// One of the caller's soft-fail statuses.
    Expected(u16),
}

/// Decoded pieces of a successful DAV response.
#[derive(Debug)]
pub struct DavResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
    /// `ETag` header, when present.
    pub etag: Option<ETag>,
    /// Origin (`scheme://host[:port]`) the request finally resolved
    /// against, after redirects.
    pub origin: Option<String>,
}

/// HTTP client for `CardDAV`/`CalDAV` operations.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    config: AccountConfig,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: AccountConfig) -> Result<Self, CardDavError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, config })
    }

    /// Builds a request with authentication headers.
    pub fn build_request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self.client.request(method, url);

        match &self.config.auth {
            AuthMethod::Basic { username, password } => {
                req = req.basic_auth(username, Some(password));
            }
            AuthMethod::Bearer { token } => {
                req = req.bearer_auth(token);
            }
            AuthMethod::None => {}
        }

        req
    }

    /// Builds a PROPFIND request with the given depth and XML body.
    ///
    /// # Errors
    ///
    /// Returns an error if the method name is rejected.
    pub fn propfind(&self, url: &str, depth: &str, body: String) -> Result<RequestBuilder, CardDavError> {
        Ok(self
            .build_request(dav_method(b"PROPFIND")?, url)
            .header("Depth", depth.to_string())
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body))
    }

    /// Builds a REPORT request with the given depth and XML body.
    /// sync-collection uses depth 0, multiget depth 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the method name is rejected.
    pub fn report(
        &self,
        url: &str,
        depth: &str,
        body: String,
    ) -> Result<RequestBuilder, CardDavError> {
        Ok(self
            .build_request(dav_method(b"REPORT")?, url)
            .header("Depth", depth.to_string())
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body))
    }

    /// Executes a request, classifying the status code.
    ///
    /// A 2xx status yields [`DavOutcome::Success`]; a status named in
    /// `softfail` yields [`DavOutcome::Expected`]; anything else is a
    /// [`CardDavError::Status`] error.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is neither
    /// successful nor declared as expected.
    pub async fn execute(
        &self,
        req: RequestBuilder,
        softfail: &[u16],
    ) -> Result<DavOutcome, CardDavError> {
        let resp = req.send().await?;

        let status = resp.status().as_u16();
        if softfail.contains(&status) {
            tracing::debug!(status, "request soft-failed");
            return Ok(DavOutcome::Expected(status));
        }

        if !resp.status().is_success() {
            let path = resp.url().path().to_string();
            return Err(CardDavError::Status { status, path });
        }

        let etag = resp
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(|s| ETag::new(s.to_string()));
        let origin = Some(resp.url().origin().ascii_serialization());
        let body = resp.text().await.unwrap_or_default();

        Ok(DavOutcome::Success(DavResponse {
            status,
            body,
            etag,
            origin,
        }))
    }

    /// Builds a PUT request carrying a vCard body.
    pub fn put_vcard(&self, url: &str, body: String) -> RequestBuilder {
        self.build_request(Method::PUT, url)
            .header("Content-Type", "text/vcard; charset=utf-8")
            .body(body)
    }

    /// Builds a DELETE request.
    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.build_request(Method::DELETE, url)
    }
}

fn dav_method(name: &'static [u8]) -> Result<Method, CardDavError> {
    Method::from_bytes(name).map_err(|e| CardDavError::Http(format!("Invalid method: {e}")))
}

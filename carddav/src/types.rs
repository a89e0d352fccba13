// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;

/// Collection or item path on the server.
///
/// A `Href` is the server-unique identifier of a collection or item, such
/// as `/remote.php/carddav/addressbooks/jane/contacts/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Href(String);

impl Href {
    /// Creates a new `Href` from a string.
    #[must_use]
    pub const fn new(href: String) -> Self {
        Self(href)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares two hrefs, tolerating percent-encoding differences on
    /// either side. Some servers report encoded hrefs in one response and
    /// decoded ones in another.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0 == other
            || percent_decode(&self.0) == other
            || self.0 == percent_decode(other)
            || percent_decode(&self.0) == percent_decode(other)
    }
}

/// Decodes `%XX` escapes, leaving malformed escapes untouched.
#[must_use]
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            // Both escape digits are ASCII, so the slice is on char
            // boundaries.
            if let Ok(b) = u8::from_str_radix(&s[i + 1..=i + 2], 16) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}

impl Deref for Href {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Href {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Href {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Href {
    fn from(href: String) -> Self {
        Self(href)
    }
}

impl From<&str> for Href {
    fn from(href: &str) -> Self {
        Self(href.to_string())
    }
}

/// Entity tag for per-item change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag(String);

impl ETag {
    /// Creates a new `ETag` from a string.
    #[must_use]
    pub const fn new(etag: String) -> Self {
        Self(etag)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ETag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ETag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ETag {
    fn from(etag: String) -> Self {
        Self(etag)
    }
}

impl From<&str> for ETag {
    fn from(etag: &str) -> Self {
        Self(etag.to_string())
    }
}

/// Service class an account can sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Address books (`CardDAV`).
    Contacts,
    /// Calendars (`CalDAV`).
    Calendar,
}

/// Kind of a discovered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    /// `CardDAV` address book.
    CardDav,
    /// `CalDAV` calendar.
    CalDav,
    /// Subscribed read-only ICS feed.
    Ics,
}

impl FolderKind {
    /// The service class this folder belongs to.
    #[must_use]
    pub const fn service(self) -> Service {
        match self {
            Self::CardDav => Service::Contacts,
            Self::CalDav | Self::Ics => Service::Calendar,
        }
    }
}

/// Access bitmask of a collection: read=1, write-content=2, create=4,
/// delete=8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Acl(u8);

impl Acl {
    /// Read access.
    pub const READ: u8 = 0x1;
    /// Write-content access.
    pub const WRITE_CONTENT: u8 = 0x2;
    /// Create-binding access.
    pub const CREATE: u8 = 0x4;
    /// Delete-binding access.
    pub const DELETE: u8 = 0x8;
    /// Full control.
    pub const ALL: u8 = 0xF;

    /// Creates an `Acl` from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    /// Raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when read access is granted.
    #[must_use]
    pub const fn can_read(self) -> bool {
        self.0 & Self::READ != 0
    }

    /// True when any write bit is granted.
    #[must_use]
    pub const fn can_write(self) -> bool {
        self.0 & (Self::WRITE_CONTENT | Self::CREATE | Self::DELETE) != 0
    }
}

/// Schema version stamp, `major.minor.patch`, ordered numerically.
///
/// Folders remember the version they were created under; mapping-table
/// entries newer than that version are never applied to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion(pub u16, pub u16, pub u16);

impl SchemaVersion {
    /// The version stamped onto newly created folders.
    pub const CURRENT: Self = Self(0, 12, 13);
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// A discovered server collection mapped to a local folder.
#[derive(Debug, Clone)]
pub struct FolderRecord {
    /// Server-unique collection identifier.
    pub href: Href,
    /// Collection kind.
    pub kind: FolderKind,
    /// Display name reported by the server.
    pub name: String,
    /// True when the collection came from a shared/proxy home set.
    pub shared: bool,
    /// Access bitmask.
    pub acl: Acl,
    /// True when local edits must not be pushed.
    pub download_only: bool,
    /// Origin (`scheme://host[:port]`) the home set resolved against;
    /// plain-path hrefs are addressed relative to it.
    pub origin: String,
    /// Last seen collection tag.
    pub ctag: Option<String>,
    /// Last seen sync token, when the server supports collection sync.
    pub token: Option<String>,
    /// User-chosen or server-provided display color.
    pub color: Option<String>,
    /// Schema version at folder creation; gates mapping-table fields.
    pub created_with_version: SchemaVersion,
    /// Set when the server stopped reporting this collection.
    pub deleted_on_server: bool,
}

impl FolderRecord {
    /// Creates a folder record for a newly discovered collection.
    #[must_use]
    pub fn new(href: Href, kind: FolderKind, name: String, acl: Acl) -> Self {
        Self {
            href,
            kind,
            name,
            shared: false,
            acl,
            download_only: !acl.can_write(),
            origin: String::new(),
            ctag: None,
            token: None,
            color: None,
            created_with_version: SchemaVersion::CURRENT,
            deleted_on_server: false,
        }
    }

    /// Clears the change-detection state, forcing the next sync to run a
    /// full listing pass.
    pub fn reset_sync_state(&mut self) {
        self.ctag = None;
        self.token = None;
    }

    /// Absolute URL for an item href inside this folder. Hrefs that
    /// already carry a scheme are returned as-is; plain paths resolve
    /// against the folder's origin.
    #[must_use]
    pub fn url_for(&self, href: &Href) -> String {
        let path = href.as_str();
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.origin)
        }
    }

    /// Absolute URL of the collection itself.
    #[must_use]
    pub fn url(&self) -> String {
        self.url_for(&self.href)
    }
}

/// Folder state retained across a delete/recreate cycle so user-chosen
/// bindings can be restored when the same href reappears.
#[derive(Debug, Clone)]
pub struct FolderSnapshot {
    /// Href the snapshot belongs to.
    pub href: Href,
    /// Saved display name.
    pub name: String,
    /// Saved color.
    pub color: Option<String>,
    /// Saved download-only flag. Only restored when the rediscovered ACL
    /// still grants write access.
    pub download_only: bool,
}

/// Terminal status of a folder or account sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Everything applied.
    Success,
    /// Completed with a user-visible caveat.
    Warning,
    /// Aborted with an error.
    Error,
}

/// Terminal result of a sync pass; replaces signalling through raised
/// errors with an explicit value.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Terminal status.
    pub status: SyncStatus,
    /// Short machine-friendly message key.
    pub message: String,
    /// Optional human-oriented detail.
    pub detail: String,
}

impl SyncOutcome {
    /// Successful outcome with no message.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: SyncStatus::Success,
            message: String::new(),
            detail: String::new(),
        }
    }

    /// Warning outcome with a message key.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Warning,
            message: message.into(),
            detail: String::new(),
        }
    }

    /// Error outcome with a message key and detail.
    #[must_use]
    pub fn error(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            message: message.into(),
            detail: detail.into(),
        }
    }

    /// True when the pass ended in [`SyncStatus::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }
}

/// Progress counters for status reporting; no correctness dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncProgress {
    /// Items processed in the current phase.
    pub done: usize,
    /// Items expected in the current phase.
    pub total: usize,
}

impl SyncProgress {
    /// Resets the counters for a new phase.
    pub fn reset(&mut self, total: usize) {
        self.done = 0;
        self.total = total;
    }

    /// Advances the done counter by `n`.
    pub fn advance(&mut self, n: usize) {
        self.done += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acl_gating() {
        let read_only = Acl::from_bits(Acl::READ);
        assert!(read_only.can_read());
        assert!(!read_only.can_write());

        let all = Acl::from_bits(Acl::ALL);
        assert_eq!(all.bits(), 0xF);
        assert!(all.can_write());
    }

    #[test]
    fn folder_defaults_download_only_from_acl() {
        let folder = FolderRecord::new(
            Href::from("/books/a/"),
            FolderKind::CardDav,
            "A".into(),
            Acl::from_bits(Acl::READ),
        );
        assert!(folder.download_only);

        let folder = FolderRecord::new(
            Href::from("/books/b/"),
            FolderKind::CardDav,
            "B".into(),
            Acl::from_bits(Acl::ALL),
        );
        assert!(!folder.download_only);
    }

    #[test]
    fn href_matches_tolerates_percent_encoding() {
        let href = Href::from("/books/j%C3%A4ne/");
        assert!(href.matches("/books/jäne/"));
        assert!(href.matches("/books/j%C3%A4ne/"));
        assert!(!href.matches("/books/other/"));
    }

    #[test]
    fn malformed_escapes_pass_through_undecoded() {
        // A multi-byte character right after a stray percent sign must
        // not be split mid-character.
        let href = Href::from("/books/%aä/x.vcf");
        assert!(!href.matches("/books/other/"));
        assert!(href.matches("/books/%aä/x.vcf"));
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz%41"), "%zzA");
    }

    #[test]
    fn schema_versions_order_numerically() {
        assert!(SchemaVersion(0, 8, 11) > SchemaVersion(0, 8, 8));
        assert!(SchemaVersion(0, 12, 13) > SchemaVersion(0, 8, 11));
        assert!(SchemaVersion(0, 10, 36) < SchemaVersion(0, 12, 0));
    }
}

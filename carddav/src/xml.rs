// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! XML namespaces used in WebDAV request bodies.

/// XML namespaces used in `CardDAV`/`CalDAV`.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CardDAV` namespace.
    pub const CARDDAV: &str = "urn:ietf:params:xml:ns:carddav";

    /// `CalDAV` namespace.
    pub const CALDAV: &str = "urn:ietf:params:xml:ns:caldav";

    /// CalendarServer extensions (ctag, source).
    pub const CALENDARSERVER: &str = "http://calendarserver.org/ns/";

    /// Apple iCal extensions (calendar-color).
    pub const APPLE: &str = "http://apple.com/ns/ical/";
}

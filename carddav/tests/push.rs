// SPDX-FileCopyrightText: 2025-2026 davsync contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Local change push and revert-cycle integration tests with wiremock.

use davsync_carddav::{
    AccountConfig, Acl, AuthMethod, ChangeStatus, ContactStore, ETag, FolderKind, FolderRecord,
    HttpClient, Href, LocalContact, LocalGroup, MemoryStore, ServiceProvider, SyncContext,
    SyncStatus, Synchronizer, push_local,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FOLDER_PATH: &str = "/books/jane/contacts/";

const CARD_A: &str = "BEGIN:VCARD
VERSION:3.0
UID:uid-a
FN:Jane Doe
N:Doe;Jane;;;
END:VCARD";

fn config(server: &MockServer) -> AccountConfig {
    AccountConfig {
        name: "test".to_string(),
        provider: ServiceProvider::Custom {
            carddav_url: Some(format!("{}/dav/", server.uri())),
            caldav_url: None,
        },
        auth: AuthMethod::None,
        pacing_ms: 0,
        ..AccountConfig::default()
    }
}

fn folder(server: &MockServer) -> FolderRecord {
    let mut folder = FolderRecord::new(
        Href::from(FOLDER_PATH),
        FolderKind::CardDav,
        "Contacts".to_string(),
        Acl::from_bits(Acl::ALL),
    );
    folder.origin = server.uri();
    folder
}

#[tokio::test]
#[ignore = "require network"]
async fn change_log_is_drained_exactly_once() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/books/jane/contacts/new.vcf"))
        .and(header("Content-Type", "text/vcard; charset=utf-8"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    // Already gone on the server, which is what a delete wants anyway.
    Mock::given(method("DELETE"))
        .and(path("/books/jane/contacts/gone.vcf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/books/jane/contacts/old.vcf"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(&server);
    let http = HttpClient::new(cfg.clone()).expect("client");
    let folder = folder(&server);

    let mut store = MemoryStore::new();
    let added = Href::from("/books/jane/contacts/new.vcf");
    let mut contact = LocalContact::new_local(added.clone());
    contact.set_prop("display_name", "Jane Doe");
    store.upsert_contact(contact);
    store.log_change(added.clone(), ChangeStatus::Added);
    store.log_change(Href::from("/books/jane/contacts/gone.vcf"), ChangeStatus::Deleted);
    store.log_change(Href::from("/books/jane/contacts/old.vcf"), ChangeStatus::Deleted);

    let mut ctx = SyncContext::new();
    let report = push_local(&http, &cfg, &folder, &mut store, &mut ctx)
        .await
        .expect("push");

    assert_eq!(report.applied, 3);
    assert_eq!(report.permission_errors, 0);
    assert!(!report.needs_revert());
    assert!(store.changes().is_empty());
    // The first push stamped a UID onto the new contact.
    assert!(store.contact(&added).and_then(|c| c.uid().map(String::from)).is_some());
}

#[tokio::test]
#[ignore = "require network"]
async fn rejected_add_is_sticky_for_the_whole_class() {
    let server = MockServer::start().await;

    // Only the first add may reach the wire; the rejection must stick.
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(&server);
    let http = HttpClient::new(cfg.clone()).expect("client");
    let folder = folder(&server);

    let mut store = MemoryStore::new();
    for name in ["a1", "a2"] {
        let href = Href::from(format!("/books/jane/contacts/{name}.vcf").as_str());
        let mut contact = LocalContact::new_local(href.clone());
        contact.set_prop("display_name", name);
        store.upsert_contact(contact);
        store.log_change(href, ChangeStatus::Added);
    }

    let mut ctx = SyncContext::new();
    let report = push_local(&http, &cfg, &folder, &mut store, &mut ctx)
        .await
        .expect("push");

    assert_eq!(report.applied, 2);
    assert_eq!(report.permission_errors, 2);
    assert!(report.needs_revert());
    assert!(store.changes().is_empty());
    assert_eq!(store.contact_count(), 0);
}

#[tokio::test]
#[ignore = "require network"]
async fn download_only_folder_drains_without_touching_the_server() {
    let server = MockServer::start().await;
    // No mocks mounted: any request would fail the push with a hard 404.

    let cfg = config(&server);
    let http = HttpClient::new(cfg.clone()).expect("client");
    let mut folder = folder(&server);
    folder.download_only = true;

    let mut store = MemoryStore::new();
    let href = Href::from("/books/jane/contacts/local-edit.vcf");
    store.upsert_contact(LocalContact::new_local(href.clone()));
    store.log_change(href.clone(), ChangeStatus::Added);
    store.log_change(Href::from("/books/jane/contacts/x.vcf"), ChangeStatus::Deleted);

    let mut ctx = SyncContext::new();
    let report = push_local(&http, &cfg, &folder, &mut store, &mut ctx)
        .await
        .expect("push");

    assert_eq!(report.applied, 2);
    assert_eq!(report.permission_errors, 2);
    assert!(store.changes().is_empty());
    assert!(store.contact(&href).is_none());
}

#[tokio::test]
#[ignore = "require network"]
async fn group_changes_are_skipped_when_group_sync_is_off() {
    let server = MockServer::start().await;
    // No mocks mounted: the skipped group must never reach the wire.

    let mut cfg = config(&server);
    cfg.sync_groups = false;
    let http = HttpClient::new(cfg.clone()).expect("client");
    let folder = folder(&server);

    let mut store = MemoryStore::new();
    let href = Href::from("/books/jane/contacts/team.vcf");
    store.upsert_group(LocalGroup {
        href: href.clone(),
        name: "Team".to_string(),
        members: vec!["uid-a".to_string()],
        ..LocalGroup::default()
    });
    store.log_change(href.clone(), ChangeStatus::Added);

    let mut ctx = SyncContext::new();
    let report = push_local(&http, &cfg, &folder, &mut store, &mut ctx)
        .await
        .expect("push");

    // The entry is drained, but the group itself stays local.
    assert_eq!(report.applied, 1);
    assert_eq!(report.permission_errors, 0);
    assert!(store.changes().is_empty());
    assert!(store.group(&href).is_some());
}

#[tokio::test]
#[ignore = "require network"]
async fn rejected_edit_reverts_the_folder_to_server_state() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path(FOLDER_PATH))
        .and(header("Depth", "0"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<d:multistatus xmlns:d="DAV:" xmlns:cs="http://calendarserver.org/ns/">
  <d:response>
    <d:href>/books/jane/contacts/</d:href>
    <d:propstat>
      <d:prop><cs:getctag>c-1</cs:getctag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#,
            "application/xml",
        ))
        .mount(&server)
        .await;

    Mock::given(method("PROPFIND"))
        .and(path(FOLDER_PATH))
        .and(header("Depth", "1"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/books/jane/contacts/a.vcf</d:href>
    <d:propstat>
      <d:prop><d:getetag>"e-a"</d:getetag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#,
            "application/xml",
        ))
        .mount(&server)
        .await;

    // Only the corrective re-pull needs the card body.
    Mock::given(method("REPORT"))
        .and(path(FOLDER_PATH))
        .and(body_string_contains("addressbook-multiget"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="utf-8" ?>
<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/books/jane/contacts/a.vcf</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"e-a"</d:getetag>
        <card:address-data>{CARD_A}</card:address-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#
            ),
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/books/jane/contacts/a.vcf"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let mut sync = Synchronizer::new(config(&server)).expect("client");
    sync.account.adopt_folder(folder(&server));

    let mut store = MemoryStore::new();
    let href = Href::from("/books/jane/contacts/a.vcf");
    let mut contact = LocalContact::new_local(href.clone());
    contact.accept_from_server(
        ETag::new("\"e-a\"".to_string()),
        davsync_vcard::parse(CARD_A).expect("card"),
    );
    contact.set_prop("uid", "uid-a");
    contact.set_prop("display_name", "Janet");
    store.upsert_contact(contact);
    store.log_change(href.clone(), ChangeStatus::Modified);

    let outcome = sync.sync_folder(&Href::from(FOLDER_PATH), &mut store).await;

    assert_eq!(outcome.status, SyncStatus::Warning);
    assert_eq!(outcome.message, "local changes reverted to server state");
    assert!(store.changes().is_empty());
    let restored = store.contact(&href).expect("restored from server");
    assert_eq!(restored.prop("display_name"), Some("Jane Doe"));
}

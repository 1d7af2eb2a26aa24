//! Integration tests for `XmlImporter` against a mock HTTP server.

use std::time::Duration;

use httptest::{matchers::*, responders::*, Expectation, Server};
use tokio::sync::oneshot;

use xml_fetch::{Capabilities, FetchConfig, FetchError, NetworkErrorKind, XmlImporter};

fn importer() -> XmlImporter {
    let config = FetchConfig {
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    XmlImporter::detect(&Capabilities::detect(), config).expect("transport should build")
}

#[tokio::test]
async fn test_load_appends_cache_busting_timestamp() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/feed.xml"),
            request::query(matches("^[0-9]{13}$")),
        ])
        .respond_with(status_code(200).body("<feed><title>News</title></feed>")),
    );

    let doc = importer()
        .load(&server.url("/feed.xml").to_string(), false)
        .await
        .expect("import should succeed");
    let root = doc.document_element().expect("root element");
    assert_eq!(doc.name(root), Some("feed"));
    assert_eq!(doc.text_content(root), "News");
}

#[tokio::test]
async fn test_load_keeps_existing_query() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/feed.xml"),
            request::query(matches("^lang=en&[0-9]{13}$")),
        ])
        .respond_with(status_code(200).body("<feed/>")),
    );

    importer()
        .load(&server.url("/feed.xml?lang=en").to_string(), false)
        .await
        .expect("import should succeed");
}

#[tokio::test]
async fn test_allow_cache_sends_url_unchanged() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/style.xsl"),
            request::query(matches("^v=3$")),
        ])
        .respond_with(status_code(200).body("<s/>")),
    );

    importer()
        .load(&server.url("/style.xsl?v=3").to_string(), true)
        .await
        .expect("import should succeed");
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/gone.xml"))
            .respond_with(status_code(410).body("<error/>")),
    );

    let err = importer()
        .load(&server.url("/gone.xml").to_string(), true)
        .await
        .expect_err("410 should fail the import");
    assert_eq!(err.network_kind(), Some(NetworkErrorKind::Status(410)));
}

#[tokio::test]
async fn test_malformed_body_is_an_xml_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/broken.xml"))
            .respond_with(status_code(200).body("<feed><entry></feed>")),
    );

    let err = importer()
        .load(&server.url("/broken.xml").to_string(), true)
        .await
        .expect_err("malformed body should fail");
    assert!(matches!(err, FetchError::Xml(_)));
}

#[tokio::test]
async fn test_import_xml_delivers_to_callback() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/data.xml"))
            .respond_with(status_code(200).body(r#"<data count="2"><v>1</v><v>2</v></data>"#)),
    );

    let importer = importer();
    let (tx, rx) = oneshot::channel();
    let handle = importer
        .import_xml(
            &server.url("/data.xml").to_string(),
            move |result| {
                let _ = tx.send(result);
            },
            false,
        )
        .expect("import should start");
    assert!(handle.expect_xml());
    assert!(handle.url().contains("/data.xml?"));

    let doc = rx.await.expect("callback").expect("document");
    let root = doc.document_element().expect("root element");
    assert_eq!(doc.attribute(root, "count"), Some("2"));
    assert_eq!(doc.children(root).len(), 2);
    assert!(importer.fetcher().registry().is_empty());
}

#[test]
fn test_no_transport_fails_explicitly() {
    let result = XmlImporter::detect(&Capabilities::none(), FetchConfig::default());
    assert!(matches!(result, Err(FetchError::TransportUnavailable)));
}

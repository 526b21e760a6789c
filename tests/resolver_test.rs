//! Resolution protocol tests against a mock backend: the manual POST, the
//! legacy page scrape, and the documented fallback between them.

use mockito::Matcher;
use nexus_nowait::core::types::{DownloadMode, DownloadRequest};
use nexus_nowait::resolver::{DownloadResolver, ResolveError};
use nexus_nowait::transport::{Transport, TransportError};

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn resolver() -> DownloadResolver {
    DownloadResolver::new(Transport::new(reqwest::Client::new(), 5_000))
}

fn manual_request(server_url: &str) -> DownloadRequest {
    DownloadRequest {
        file_id: "42".to_string(),
        game_id: Some("1704".to_string()),
        source_href: format!("{server_url}/skyrim/mods/5?tab=files&file_id=42"),
        mode: DownloadMode::Manual,
    }
}

fn legacy_request(server_url: &str) -> DownloadRequest {
    DownloadRequest {
        file_id: "42".to_string(),
        game_id: Some("1704".to_string()),
        source_href: format!("{server_url}/skyrim/mods/5?tab=files&file_id=42&nmm=1"),
        mode: DownloadMode::LegacyManager,
    }
}

#[tokio::test]
async fn manual_post_resolves_from_json_body() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/Core/Libs/Common/Managers/Downloads")
        .match_query(Matcher::Any)
        .match_header("x-requested-with", "XMLHttpRequest")
        .match_body("fid=42&game_id=1704")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"url":"https://files.example/download/42/file.zip"}"#)
        .create_async()
        .await;

    let url = resolver()
        .resolve(&manual_request(&server.url()))
        .await
        .unwrap();
    assert_eq!(url, "https://files.example/download/42/file.zip");
    mock.assert_async().await;
}

#[tokio::test]
async fn manual_post_surfaces_http_status() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    let _post = server
        .mock("POST", "/Core/Libs/Common/Managers/Downloads")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let err = resolver()
        .resolve(&manual_request(&server.url()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Transport(TransportError::HttpStatus(500))
    ));
}

#[tokio::test]
async fn manual_post_without_url_is_an_extraction_miss() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    let _post = server
        .mock("POST", "/Core/Libs/Common/Managers/Downloads")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let err = resolver()
        .resolve(&manual_request(&server.url()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::ExtractionMiss));
}

#[tokio::test]
async fn legacy_scrape_skips_the_post_entirely() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/skyrim/mods/5")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"<html><body>
                <a id="slowDownloadButton" data-download-url="nxm://skyrim/mods/5/files/42">slow</a>
            </body></html>"#,
        )
        .create_async()
        .await;
    let post = server
        .mock("POST", "/Core/Libs/Common/Managers/Downloads")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let url = resolver()
        .resolve(&legacy_request(&server.url()))
        .await
        .unwrap();
    assert_eq!(url, "nxm://skyrim/mods/5/files/42");
    page.assert_async().await;
    post.assert_async().await;
}

#[tokio::test]
async fn legacy_scrape_falls_back_to_manual_post() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    let _page = server
        .mock("GET", "/skyrim/mods/5")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html><body><p>nothing useful here</p></body></html>")
        .create_async()
        .await;
    let post = server
        .mock("POST", "/Core/Libs/Common/Managers/Downloads")
        .match_query(Matcher::Any)
        .expect(1)
        .with_status(200)
        .with_body(r#"{"url":"https://files.example/download/42/file.zip"}"#)
        .create_async()
        .await;

    let url = resolver()
        .resolve(&legacy_request(&server.url()))
        .await
        .unwrap();
    assert_eq!(url, "https://files.example/download/42/file.zip");
    post.assert_async().await;
}

#[tokio::test]
async fn legacy_get_failure_also_falls_back() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    let _page = server
        .mock("GET", "/skyrim/mods/5")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;
    let post = server
        .mock("POST", "/Core/Libs/Common/Managers/Downloads")
        .match_query(Matcher::Any)
        .expect(1)
        .with_status(200)
        .with_body(r#"{"url":"https://files.example/download/42/file.zip"}"#)
        .create_async()
        .await;

    let result = resolver().resolve(&legacy_request(&server.url())).await;
    assert!(result.is_ok());
    post.assert_async().await;
}

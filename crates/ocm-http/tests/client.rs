use std::sync::Arc;
use std::time::Duration;

use ocm_core::{ContentError, RemoteContentService};
use ocm_http::{DefaultContentApiClient, HttpClientConfig};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> DefaultContentApiClient {
    let config = HttpClientConfig::new()
        .with_base_url(server.uri())
        .with_retry_delay(Duration::from_millis(10));
    DefaultContentApiClient::new(&config).unwrap()
}

// ── Endpoints ───────────────────────────────────────────────────

#[tokio::test]
async fn menus_are_fetched_from_menus_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "menus": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let raw = client_for(&server).get_menus().await.unwrap();
    assert_eq!(raw.0, json!({ "menus": [] }));
}

#[tokio::test]
async fn content_list_sends_page_and_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/content/home"))
        .and(query_param("page", "3"))
        .and(query_param("items", "20"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "content": { "elements": [] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let raw = client_for(&server)
        .get_content_list("/content/home", 3, 20)
        .await
        .unwrap();
    assert!(raw.0["content"]["elements"].is_array());
}

#[tokio::test]
async fn bearer_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menus"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "menus": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpClientConfig::new()
        .with_base_url(server.uri())
        .with_token("secret");
    let client = DefaultContentApiClient::new(&config).unwrap();
    assert!(client.get_menus().await.is_ok());
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menus"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/menus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "menus": [] })))
        .mount(&server)
        .await;

    assert!(client_for(&server).get_menus().await.is_ok());
}

#[tokio::test]
async fn not_found_is_a_network_error_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).get_element("/element/7").await.unwrap_err();
    assert!(matches!(
        err,
        ContentError::Network {
            status_code: Some(404),
            ..
        }
    ));
}

#[tokio::test]
async fn malformed_body_is_a_parsing_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menus"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_menus().await.unwrap_err();
    assert!(matches!(err, ContentError::Parsing { .. }));
}

#[tokio::test]
async fn cancel_fails_requests_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menus"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "menus": [] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = Arc::new(client_for(&server));
    let pending = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.get_menus().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.cancel_active_requests();

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("cancelled request should resolve promptly")
        .unwrap();
    assert_eq!(result.unwrap_err(), ContentError::Cancelled);
}

//! `AdkClient` against a mock agent server.

mod common;

use futures::StreamExt;
use parley_client::{AdkClient, AgentBackend, ClientError, CreateSessionRequest, RunAgentRequest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_session_maps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/helper/users/u_test/sessions/s_test"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (context, _) = common::context(&server.uri());
    let client = AdkClient::new(server.uri());

    let err = client.get_session(&context.identity()).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("Not Found"));
}

#[tokio::test]
async fn create_session_sends_requested_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apps/helper/users/u_test/sessions"))
        .and(body_json(json!({"session_id": "s_test", "state": {}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "s_test"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AdkClient::new(server.uri());
    let response = client
        .create_session(
            "helper",
            &"u_test".parse().unwrap(),
            &CreateSessionRequest::with_id("s_test"),
        )
        .await
        .unwrap();

    assert_eq!(response, json!({"id": "s_test"}));
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apps/helper/users/u_test/sessions/s_test"))
        .and(body_json(json!({"state": {}})))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let (context, _) = common::context(&server.uri());
    let client = AdkClient::new(server.uri());

    let response = client.create_session_at(&context.identity()).await.unwrap();
    assert!(response.is_null());
}

#[tokio::test]
async fn run_sse_streams_body() {
    let server = MockServer::start().await;
    let (context, _) = common::context(&server.uri());
    let request = RunAgentRequest::streaming(&context.identity(), "hi");

    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .and(header("accept", "text/event-stream"))
        .and(body_json(&request))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string("data: {\"text\":\"hey\"}\n\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = AdkClient::new(server.uri());
    let mut body = client.run_sse(&request).await.unwrap();

    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend(chunk.unwrap());
    }
    assert_eq!(bytes, b"data: {\"text\":\"hey\"}\n\n");
}

#[tokio::test]
async fn run_sse_error_status_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(ResponseTemplate::new(500).set_body_string("agent crashed"))
        .mount(&server)
        .await;

    let (context, _) = common::context(&server.uri());
    let client = AdkClient::new(server.uri());

    let Err(err) = client
        .run_sse(&RunAgentRequest::streaming(&context.identity(), "hi"))
        .await
    else {
        panic!("expected an error");
    };
    assert!(matches!(
        err,
        ClientError::Http { status: 500, ref message } if message == "agent crashed"
    ));
}

#[tokio::test]
async fn run_posts_non_streaming_request() {
    let server = MockServer::start().await;
    let (context, _) = common::context(&server.uri());
    let request = RunAgentRequest::streaming(&context.identity(), "hi").non_streaming();

    Mock::given(method("POST"))
        .and(path("/run"))
        .and(header("accept", "application/json"))
        .and(body_json(&request))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"text": "ok"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = AdkClient::new(server.uri());
    assert_eq!(client.run(&request).await.unwrap(), json!([{"text": "ok"}]));
}

#[tokio::test]
async fn run_rejects_non_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let (context, _) = common::context(&server.uri());
    let client = AdkClient::new(server.uri());

    let err = client
        .run(&RunAgentRequest::streaming(&context.identity(), "hi").non_streaming())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (context, _) = common::context(&url);
    let client = AdkClient::new(url);

    let err = client.get_session(&context.identity()).await.unwrap_err();
    assert!(err.is_network());
}

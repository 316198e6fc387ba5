//! SSE lesson streaming tests

use quickskills::config::ApiConfig;
use quickskills::models::LessonChunk;
use quickskills::{
    CredentialStore, Credentials, LessonStreamer, MemoryCredentialStore, SessionManager,
    StreamEvent,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn streamer(server: &MockServer, store: Arc<MemoryCredentialStore>) -> LessonStreamer {
    let config = ApiConfig {
        base_url: server.uri(),
        ..ApiConfig::default()
    };
    LessonStreamer::new(&config, SessionManager::new(store)).unwrap()
}

fn signed_in() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_credentials(Credentials {
        access_token: "a1".to_string(),
        refresh_token: "r1".to_string(),
    }))
}

#[tokio::test]
async fn test_stream_delivers_chunks_then_done() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"index\":0,\"content\":\"Hello \"}\n\n",
        "data: learner\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/lessons/l1/stream"))
        .and(header("Authorization", "Bearer a1"))
        .and(header("Accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut stream = streamer(&server, signed_in()).stream_lesson("l1");

    assert!(matches!(stream.next().await, Some(StreamEvent::Open)));
    match stream.next().await {
        Some(StreamEvent::Chunk(chunk)) => assert_eq!(
            chunk,
            LessonChunk {
                index: Some(0),
                content: "Hello ".to_string()
            }
        ),
        other => panic!("unexpected event: {other:?}"),
    }
    match stream.next().await {
        Some(StreamEvent::Chunk(chunk)) => {
            assert_eq!(chunk.content, "learner");
            assert!(chunk.index.is_none());
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(stream.next().await, Some(StreamEvent::Done)));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_stream_unauthorized_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(serde_json::json!({"message": "expired"})),
        )
        .mount(&server)
        .await;

    let store = signed_in();
    let mut stream = streamer(&server, store.clone()).stream_lesson("l1");

    match stream.next().await {
        Some(StreamEvent::Error(err)) => {
            assert_eq!(err.status, 401);
            assert_eq!(err.message, "expired");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(store.get().is_none());
}

#[tokio::test]
async fn test_stream_unauthorized_with_unparseable_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_raw("Unauthorized", "application/json"))
        .mount(&server)
        .await;

    let store = signed_in();
    let mut stream = streamer(&server, store.clone()).stream_lesson("l1");

    match stream.next().await {
        Some(StreamEvent::Error(err)) => assert_eq!(err.status, 401),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(store.get().is_none());
}

#[tokio::test]
async fn test_stop_ends_pending_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: late\n\n", "text/event-stream")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let mut stream = streamer(&server, signed_in()).stream_lesson("l1");
    stream.stop();

    let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("stream should close promptly after stop");
    assert!(next.is_none());
}

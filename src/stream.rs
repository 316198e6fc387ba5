//! Server-sent lesson streaming
//!
//! A long-lived GET delivering lesson content incrementally. It sits beside
//! the request pipeline: no retries, no interceptors, and the caller ends it
//! explicitly with [`LessonStream::stop`] (or by dropping it).

use crate::api::endpoints;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::http::RawResponse;
use crate::models::LessonChunk;
use crate::normalize;
use crate::session::SessionManager;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 64;
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug)]
pub enum StreamEvent {
    /// Server accepted the stream
    Open,
    Chunk(LessonChunk),
    /// Server signalled the end of the lesson
    Done,
    Error(ApiError),
}

/// Handle to a running lesson stream
pub struct LessonStream {
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LessonStream {
    /// Next event, or `None` once the stream has ended or been stopped
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Close the connection; pending events are discarded
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LessonStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct LessonStreamer {
    http: Client,
    base_url: String,
    session: SessionManager,
}

impl LessonStreamer {
    pub fn new(config: &ApiConfig, session: SessionManager) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::unknown(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Open the stream for `lesson_id`; must be called inside a tokio runtime
    pub fn stream_lesson(&self, lesson_id: &str) -> LessonStream {
        let url = format!("{}{}", self.base_url, endpoints::lesson_stream(lesson_id));
        let mut request = self.http.get(&url).header(ACCEPT, "text/event-stream");
        if let Some(token) = self.session.auth_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let session = self.session.clone();

        tracing::debug!("Opening lesson stream: {}", url);
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => tracing::debug!("Lesson stream stopped"),
                _ = pump(request, session, tx) => {}
            }
        });

        LessonStream {
            events: rx,
            cancel,
            task,
        }
    }
}

async fn pump(request: RequestBuilder, session: SessionManager, tx: mpsc::Sender<StreamEvent>) {
    let resp = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            let _ = tx
                .send(StreamEvent::Error(ApiError::network(format!("Network error: {e}"))))
                .await;
            return;
        }
    };

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.unwrap_or_default();
        let err = match normalize::normalize(RawResponse {
            status,
            headers,
            body,
        }) {
            Err(err) => err,
            Ok(_) => ApiError::unknown(format!("Unexpected stream status {status}")),
        };
        if err.is_unauthorized() {
            session.handle_unauthorized();
        }
        let _ = tx.send(StreamEvent::Error(err)).await;
        return;
    }

    if tx.send(StreamEvent::Open).await.is_err() {
        return;
    }

    let mut events = resp.bytes_stream().eventsource();
    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(ApiError::network(format!("Stream error: {e}"))))
                    .await;
                return;
            }
        };

        if event.event == "done" || event.data.trim() == DONE_MARKER {
            break;
        }

        let chunk = serde_json::from_str::<LessonChunk>(&event.data).unwrap_or(LessonChunk {
            index: None,
            content: event.data,
        });
        if tx.send(StreamEvent::Chunk(chunk)).await.is_err() {
            // receiver dropped
            return;
        }
    }

    let _ = tx.send(StreamEvent::Done).await;
}

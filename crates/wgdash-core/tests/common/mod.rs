//! Shared helpers for integration tests against a mock dashboard server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use wgdash_core::{ApiClient, IntervalHandle, MessageQueue, NavigationHistory, SessionContext};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct Harness {
    pub server: MockServer,
    pub session: Arc<SessionContext>,
    pub navigator: Arc<NavigationHistory>,
    pub messages: Arc<MessageQueue>,
    pub client: ApiClient,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let session = Arc::new(SessionContext::new());
        let navigator = Arc::new(NavigationHistory::new());
        let messages = Arc::new(MessageQueue::new());
        let client = ApiClient::new(
            &server.uri(),
            Arc::clone(&session),
            navigator.clone(),
            messages.clone(),
        )
        .expect("build client");

        Self {
            server,
            session,
            navigator,
            messages,
            client,
        }
    }

    /// Serve `token` from the CSRF endpoint.
    pub async fn mount_csrf_token(&self, token: &str) {
        Mock::given(method("GET"))
            .and(path("/api/csrf-token"))
            .respond_with(csrf_token_response(token))
            .mount(&self.server)
            .await;
    }

    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}

pub fn csrf_token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": true,
        "data": { "csrf_token": token }
    }))
}

pub fn ok_response(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": true, "data": data }))
}

/// A handle whose cancel action bumps `counter`.
pub fn counting_handle(counter: &Arc<AtomicUsize>) -> IntervalHandle {
    let counter = Arc::clone(counter);
    IntervalHandle::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

//! API client for the dashboard server.
//!
//! Every outbound call goes through `ApiClient`. It gates requests on the
//! session-expired flag, attaches the CSRF token and cross-server API key,
//! retries once on a CSRF rejection, and turns 401/429/transport failures
//! into navigation side effects plus a uniform failure envelope.

use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use anyhow::Result;
use futures::FutureExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::messages::{Message, Notifier};
use crate::navigation::{Navigator, Route};
use crate::session::SessionContext;

use super::endpoints;
use super::{ApiError, ApiResponse};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Applies to regular calls only; the status stream is opened without one.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying the CSRF token on state-changing requests.
const CSRF_HEADER: &str = "x-csrf-token";

/// Header carrying the API key of a cross-server target.
const API_KEY_HEADER: &str = "wg-dashboard-apikey";

/// How many times a POST is resent after the server rejects its CSRF token.
const MAX_CSRF_RETRIES: u32 = 1;

/// Empty query string for GETs without parameters.
pub const NO_QUERY: &[(&str, &str)] = &[];

/// A remote dashboard server reached with an API key instead of the local session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
struct CsrfTokenData {
    csrf_token: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    totp: Option<&'a str>,
}

/// Result of one call to the CSRF token endpoint.
enum TokenOutcome {
    Issued(String),
    Unauthorized,
    Failed(String),
}

/// Status and body of a response, read eagerly so it can be inspected more than once.
#[derive(Debug)]
struct RawResponse {
    status: StatusCode,
    body: String,
}

impl RawResponse {
    /// A 403 whose `message` or `error` field mentions CSRF.
    fn is_csrf_rejection(&self) -> bool {
        if self.status != StatusCode::FORBIDDEN {
            return false;
        }
        let Ok(body) = serde_json::from_str::<serde_json::Value>(&self.body) else {
            return false;
        };
        ["message", "error"].iter().any(|field| {
            body.get(field)
                .and_then(|v| v.as_str())
                .map(|s| s.to_lowercase().contains("csrf"))
                .unwrap_or(false)
        })
    }
}

/// Progress of a POST through the CSRF retry protocol.
enum PostState {
    Sending { retries: u32 },
    AwaitingCsrfRetry { retries: u32, rejected: RawResponse },
    Done(RawResponse),
}

/// API client for the dashboard server.
/// Clone is cheap - the connection pool, cookie store and session are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    remote: Arc<RwLock<Option<RemoteTarget>>>,
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    /// Create a client for the server at `base_url`.
    pub fn new(
        base_url: &str,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            remote: Arc::new(RwLock::new(None)),
            session,
            navigator,
            notifier,
        })
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Route requests to a cross-server target, or back to the local server with `None`.
    pub fn set_remote(&self, target: Option<RemoteTarget>) {
        match target {
            Some(ref t) => info!(host = %t.host, "Using cross-server target"),
            None => debug!("Using local server"),
        }
        *self.remote.write().unwrap_or_else(|e| e.into_inner()) = target;
    }

    pub fn remote(&self) -> Option<RemoteTarget> {
        self.remote.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn url(&self, path: &str) -> String {
        match self.remote() {
            Some(remote) => format!("{}{}", remote.host.trim_end_matches('/'), path),
            None => format!("{}{}", self.base_url, path),
        }
    }

    fn request_headers(&self, method: &Method) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(remote) = self.remote() {
            let value = HeaderValue::from_str(&remote.api_key)
                .map_err(|_| ApiError::InvalidRequest("API key is not a valid header value".into()))?;
            headers.insert(API_KEY_HEADER, value);
        }

        if *method != Method::GET {
            if let Some(token) = self.session.token() {
                let value = HeaderValue::from_str(&token)
                    .map_err(|_| ApiError::InvalidRequest("CSRF token is not a valid header value".into()))?;
                headers.insert(CSRF_HEADER, value);
            }
        }
        Ok(headers)
    }

    // ===== CSRF Token =====

    /// Fetch a CSRF token, joining the fetch already in flight if there is one.
    ///
    /// Never fails: an expired session, a 401 or any other failure all yield
    /// `None`, and a 401 also marks the session expired.
    pub async fn acquire_token(&self) -> Option<String> {
        if self.session.is_expired() {
            self.session.clear_token();
            return None;
        }

        let headers = match self.request_headers(&Method::GET) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(error = %e, "Cannot build CSRF token request");
                return None;
            }
        };
        let http = self.client.clone();
        let url = self.url(endpoints::CSRF_TOKEN);
        // Weak: the fetch is stored in the session's own slot
        let session = Arc::downgrade(&self.session);

        let fetch = self.session.join_or_start_token_fetch(move |generation| {
            Self::fetch_token(http, url, headers, session, generation).boxed()
        });
        fetch.await
    }

    /// Drop the cached token and fetch a fresh one.
    pub async fn refresh_token(&self) -> Option<String> {
        self.session.clear_token();
        self.acquire_token().await
    }

    pub fn clear_token(&self) {
        self.session.clear_token();
    }

    async fn fetch_token(
        http: Client,
        url: String,
        headers: HeaderMap,
        session: Weak<SessionContext>,
        generation: u64,
    ) -> Option<String> {
        debug!("Fetching CSRF token");
        let outcome = Self::request_token(&http, &url, headers).await;

        let session = session.upgrade()?;

        match outcome {
            TokenOutcome::Issued(token) => {
                if session.complete_token_fetch(generation, Some(token.clone())) {
                    debug!("CSRF token acquired");
                    Some(token)
                } else if session.is_expired() {
                    debug!("Session expired during CSRF token fetch, discarding token");
                    None
                } else {
                    // Superseded: the caller may use it, the cache keeps the newer one
                    debug!("CSRF token fetch superseded, not caching");
                    Some(token)
                }
            }
            TokenOutcome::Unauthorized => {
                debug!("CSRF token request unauthorized");
                session.complete_token_fetch(generation, None);
                session.handle_session_expiration();
                None
            }
            TokenOutcome::Failed(reason) => {
                warn!(reason = %reason, "CSRF token fetch failed");
                session.complete_token_fetch(generation, None);
                None
            }
        }
    }

    async fn request_token(http: &Client, url: &str, headers: HeaderMap) -> TokenOutcome {
        let response = match http
            .get(url)
            .headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return TokenOutcome::Failed(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return TokenOutcome::Unauthorized;
        }
        if !status.is_success() {
            return TokenOutcome::Failed(format!("Status {}", status));
        }

        match response.json::<ApiResponse<CsrfTokenData>>().await {
            Ok(ApiResponse { status: true, data: Some(data), .. }) => TokenOutcome::Issued(data.csrf_token),
            Ok(_) => TokenOutcome::Failed("Server did not issue a token".to_string()),
            Err(e) => TokenOutcome::Failed(e.to_string()),
        }
    }

    // ===== Requests =====

    /// Issue a GET. Always returns an envelope; failures come back as `status: false`.
    pub async fn get<Q>(&self, path: &str, query: &Q) -> ApiResponse
    where
        Q: Serialize + ?Sized,
    {
        if self.session.is_expired() && !endpoints::is_get_exempt(path) {
            warn!(path, "Session expired - blocking API call");
            return ApiResponse::session_expired();
        }

        let result = self.send_get(path, query).await;
        self.settle(path, result)
    }

    async fn send_get<Q>(&self, path: &str, query: &Q) -> Result<ApiResponse, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        let request = self
            .client
            .get(self.url(path))
            .headers(self.request_headers(&Method::GET)?)
            .query(query)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));

        let raw = self.execute(request, path).await?;
        let response = Self::interpret(path, raw)?;

        // A stale session can still answer 200 with status false here
        if !response.status && path.contains(endpoints::VALIDATE_AUTHENTICATION) {
            debug!("Authentication check failed, marking session expired");
            self.session.handle_session_expiration();
        }
        Ok(response)
    }

    /// Issue a POST with a JSON body. Always returns an envelope.
    pub async fn post<B>(&self, path: &str, body: &B) -> ApiResponse
    where
        B: Serialize + ?Sized,
    {
        let exempt = endpoints::is_post_exempt(path);
        if self.session.is_expired() && !exempt {
            warn!(path, "Session expired - blocking API call");
            return ApiResponse::session_expired();
        }

        let result = self.send_post(path, body, exempt).await;
        self.settle(path, result)
    }

    async fn send_post<B>(&self, path: &str, body: &B, exempt: bool) -> Result<ApiResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        if !exempt && self.session.token().is_none() && !self.session.is_expired() {
            self.acquire_token().await;
        }

        let mut state = PostState::Sending { retries: 0 };
        let raw = loop {
            state = match state {
                PostState::Sending { retries } => {
                    // The session may have expired while the token was refreshed
                    if retries > 0 && !exempt && self.session.is_expired() {
                        warn!(path, "Session expired - dropping CSRF retry");
                        return Err(ApiError::SessionExpired);
                    }
                    let raw = self.send_post_once(path, &payload).await?;
                    if raw.status != StatusCode::FORBIDDEN {
                        PostState::Done(raw)
                    } else if retries >= MAX_CSRF_RETRIES {
                        self.notify_token_expired();
                        PostState::Done(raw)
                    } else if raw.is_csrf_rejection() {
                        PostState::AwaitingCsrfRetry { retries, rejected: raw }
                    } else {
                        PostState::Done(raw)
                    }
                }
                PostState::AwaitingCsrfRetry { retries, rejected } => {
                    warn!(path, "CSRF token rejected, refreshing token and retrying");
                    match self.refresh_token().await {
                        Some(_) => PostState::Sending { retries: retries + 1 },
                        None if self.session.is_expired() => return Err(ApiError::SessionExpired),
                        None => {
                            self.notify_token_expired();
                            PostState::Done(rejected)
                        }
                    }
                }
                PostState::Done(raw) => break raw,
            };
        };

        Self::interpret(path, raw)
    }

    async fn send_post_once(&self, path: &str, payload: &[u8]) -> Result<RawResponse, ApiError> {
        let request = self
            .client
            .post(self.url(path))
            .headers(self.request_headers(&Method::POST)?)
            .body(payload.to_vec())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        self.execute(request, path).await
    }

    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<RawResponse, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(path, status = status.as_u16(), "Response received");
        Ok(RawResponse { status, body })
    }

    /// Map a raw response onto the envelope or a typed error.
    fn interpret(path: &str, raw: RawResponse) -> Result<ApiResponse, ApiError> {
        if raw.status.is_success() {
            return serde_json::from_str(&raw.body)
                .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)));
        }
        Err(ApiError::from_status(raw.status, &raw.body))
    }

    /// Apply the side effects of a failed call and convert it to an envelope.
    fn settle(&self, path: &str, result: Result<ApiResponse, ApiError>) -> ApiResponse {
        let err = match result {
            Ok(response) => return response,
            Err(err) => err,
        };

        match err {
            ApiError::SessionExpired => ApiResponse::session_expired(),
            ApiError::Unauthorized | ApiError::RateLimited { .. } => {
                self.handle_session_errors(path, &err);
                if err.is_rate_limited() {
                    ApiResponse::rate_limited()
                } else {
                    ApiResponse::session_expired()
                }
            }
            other => {
                error!(path, error = %other, "Request failed");
                self.navigator.navigate(Route::SignIn);
                ApiResponse::failure(other.to_string())
            }
        }
    }

    /// Session-level reactions shared by regular calls and the status stream.
    fn handle_session_errors(&self, path: &str, err: &ApiError) {
        match err {
            ApiError::Unauthorized => {
                self.session.handle_session_expiration();
                self.notifier.notify(Message::warning(
                    "WGDashboard",
                    "Sign in session ended, please sign in again",
                ));
                self.navigator.navigate(Route::SignIn);
            }
            ApiError::RateLimited { retry_after } => {
                warn!(path, retry_after = ?retry_after, "Rate limited");
                self.navigator.navigate(Route::RateLimited {
                    retry_after: *retry_after,
                });
            }
            _ => {}
        }
    }

    fn notify_token_expired(&self) {
        self.notifier.notify(Message::warning(
            "Security",
            "Session token expired, please refresh the page",
        ));
    }

    /// Open a long-lived GET (Server-Sent Events) under the same gating and headers.
    pub async fn open_stream(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        if self.session.is_expired() && !endpoints::is_get_exempt(path) {
            warn!(path, "Session expired - not opening stream");
            return Err(ApiError::SessionExpired);
        }

        let mut headers = self.request_headers(&Method::GET)?;
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));

        let response = self.client.get(self.url(path)).headers(headers).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(status, &body);
        self.handle_session_errors(path, &err);
        Err(err)
    }

    // ===== Authentication =====

    /// Sign in. On success the expired flag is reset and the old CSRF token dropped.
    pub async fn authenticate(&self, username: &str, password: &str, totp: Option<&str>) -> ApiResponse {
        let body = LoginRequest {
            username,
            password,
            totp,
        };
        let response = self.post(endpoints::AUTHENTICATE, &body).await;
        if response.status {
            info!(username, "Signed in");
            self.session.reset_session_expired();
            self.session.clear_token();
        }
        response
    }

    /// Ask the server whether the current session is still valid.
    pub async fn validate_authentication(&self) -> bool {
        self.get(endpoints::VALIDATE_AUTHENTICATION, NO_QUERY).await.status
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("remote", &self.remote().map(|r| r.host))
            .field("session", &self.session)
            .finish()
    }
}

//! Consumer for the configuration status stream.
//!
//! `/api/config-status-stream` is a Server-Sent-Events response whose every
//! event carries a full `ConfigStatusSnapshot`. The consumer hands each
//! snapshot to a callback that replaces local state wholesale.

use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::api::{endpoints, ApiClient, ApiError};
use crate::models::ConfigStatusSnapshot;

/// Delay before reopening a stream the server closed.
/// Matches the reconnect delay browsers use for EventSource.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Incremental parser for a `text/event-stream` body.
///
/// Only `data` fields matter here; `event`, `id` and `retry` are ignored.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return the data of every event they complete.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if line.starts_with(':') {
                continue;
            } else if let Some(value) = line.strip_prefix("data") {
                if value.is_empty() {
                    self.data.push(String::new());
                } else if let Some(value) = value.strip_prefix(':') {
                    self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
                }
            }
        }
        events
    }
}

/// Read one connection of the status stream until the server closes it.
pub async fn consume_status_stream<F>(client: &ApiClient, mut on_snapshot: F) -> Result<(), ApiError>
where
    F: FnMut(ConfigStatusSnapshot),
{
    let response = client.open_stream(endpoints::CONFIG_STATUS_STREAM).await?;
    debug!("Status stream opened");

    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for data in parser.feed(&chunk) {
            match serde_json::from_str::<ConfigStatusSnapshot>(&data) {
                Ok(snapshot) => on_snapshot(snapshot),
                Err(e) => warn!(error = %e, "Skipping undecodable status event"),
            }
        }
        if client.session().is_expired() {
            debug!("Session expired, closing status stream");
            break;
        }
    }
    Ok(())
}

/// Keep the status stream open, reconnecting after the server closes it or
/// a transient failure. Stops on session expiry or rate limiting.
pub async fn run_status_stream<F>(client: &ApiClient, mut on_snapshot: F)
where
    F: FnMut(ConfigStatusSnapshot),
{
    loop {
        match consume_status_stream(client, &mut on_snapshot).await {
            Ok(()) => debug!("Status stream closed by server"),
            Err(ApiError::SessionExpired | ApiError::Unauthorized) => break,
            Err(e @ ApiError::RateLimited { .. }) => {
                warn!(error = %e, "Status stream rate limited, not reconnecting");
                break;
            }
            Err(e) => warn!(error = %e, "Status stream failed"),
        }
        if client.session().is_expired() {
            break;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: {\"wg0\": true}\n\n");
        assert_eq!(events, vec!["{\"wg0\": true}".to_string()]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: {\"wg0\":").is_empty());
        assert!(parser.feed(b" false}\r\n").is_empty());
        let events = parser.feed(b"\r\ndata: {}\n\n");
        assert_eq!(events, vec!["{\"wg0\": false}".to_string(), "{}".to_string()]);
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keepalive\nevent: status\ndata:line1\ndata: line2\nid: 7\n\n\n");
        assert_eq!(events, vec!["line1\nline2".to_string()]);
    }

    #[test]
    fn test_multibyte_split() {
        let mut parser = SseParser::new();
        let bytes = "data: \"é\"\n\n".as_bytes();
        // Split inside the two-byte character
        assert!(parser.feed(&bytes[..8]).is_empty());
        let events = parser.feed(&bytes[8..]);
        assert_eq!(events, vec!["\"é\"".to_string()]);
    }
}

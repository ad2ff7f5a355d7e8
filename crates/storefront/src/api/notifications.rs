//! Notification push channel.
//!
//! The notification service pushes server-sent events over a long-lived
//! HTTP response. The access token travels in the `token` query parameter
//! because the channel is opened like a browser `EventSource`.

use async_stream::stream;
use futures::Stream;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::types::Notification;
use super::{ApiClient, ApiError, Service};

/// Event name carrying a new notification.
const NEW_NOTIFICATION_EVENT: &str = "new_notification";

/// An event received on the push channel.
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// A notification addressed to the signed-in account.
    NewNotification(Notification),
    /// Any other event type; carries the event name.
    Other(String),
}

/// Notification service facade.
pub struct NotificationsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> NotificationsApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Open the push channel.
    ///
    /// The stream ends when the service closes the connection. Malformed
    /// events are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be opened.
    #[instrument(skip_all)]
    pub async fn subscribe(
        &self,
        token: &SecretString,
    ) -> Result<impl Stream<Item = Result<PushEvent, ApiError>> + Send + 'static, ApiError> {
        let url = self.client.url(
            Service::Notifications,
            "/notifications/stream",
            &[("token", token.expose_secret().to_string())],
        )?;
        let request = self.client.stream_request(url);
        let response = self
            .client
            .open_stream(Service::Notifications, request)
            .await?;

        debug!("Notification channel open");

        Ok(stream! {
            use futures::StreamExt;

            let mut buffer = Vec::new();
            let mut byte_stream = std::pin::pin!(response.bytes_stream());

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        // Chunks may split a character or a line ending, so
                        // only complete events are decoded.
                        buffer.extend_from_slice(&chunk);

                        while let Some(raw) = extract_sse_event(&mut buffer) {
                            match String::from_utf8(raw) {
                                Ok(event) => {
                                    if let Some(parsed) = parse_sse_event(&event) {
                                        yield Ok(parsed);
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "Skipping non UTF-8 event on notification channel");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ApiError::Http(e));
                        break;
                    }
                }
            }
        })
    }
}

/// Take the bytes of one complete event (terminated by a blank line) off
/// the buffer. Lines may end in `\n` or `\r\n`.
fn extract_sse_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (end, delimiter) = buffer.iter().enumerate().find_map(|(i, &byte)| {
        if byte != b'\n' {
            return None;
        }
        match buffer.get(i + 1) {
            Some(b'\n') => Some((i, 2)),
            Some(b'\r') if buffer.get(i + 2) == Some(&b'\n') => Some((i, 3)),
            _ => None,
        }
    })?;

    let mut event: Vec<u8> = buffer.drain(..end + delimiter).take(end).collect();
    if event.last() == Some(&b'\r') {
        event.pop();
    }
    Some(event)
}

/// Parse one event block. Comments, keep-alives and malformed payloads
/// yield `None`.
fn parse_sse_event(event: &str) -> Option<PushEvent> {
    let mut name = "message";
    let mut data = Vec::new();

    for line in event.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            name = value.trim();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data.is_empty() && name == "message" {
        return None;
    }

    if name != NEW_NOTIFICATION_EVENT {
        return Some(PushEvent::Other(name.to_string()));
    }

    let payload = data.join("\n");
    match serde_json::from_str::<Notification>(&payload) {
        Ok(notification) => Some(PushEvent::NewNotification(notification)),
        Err(e) => {
            warn!(error = %e, "Malformed notification payload, skipping");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Feed `chunks` through the buffer the way the channel does and return
    /// the decoded events.
    fn events_from(chunks: &[&[u8]]) -> Vec<String> {
        let mut buffer = Vec::new();
        let mut events = Vec::new();
        for chunk in chunks {
            buffer.extend_from_slice(chunk);
            while let Some(raw) = extract_sse_event(&mut buffer) {
                events.push(String::from_utf8(raw).unwrap());
            }
        }
        events
    }

    #[test]
    fn test_extract_sse_event() {
        let mut buffer = b"event: new_notification\ndata: {}\n\nevent: ping\ndata: {}\n\n".to_vec();

        let first = extract_sse_event(&mut buffer).unwrap();
        assert_eq!(first, b"event: new_notification\ndata: {}");
        assert_eq!(extract_sse_event(&mut buffer).unwrap(), b"event: ping\ndata: {}");
        assert!(extract_sse_event(&mut buffer).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_extract_sse_event_incomplete() {
        let mut buffer = b"event: new_notification\ndata: {\"partial".to_vec();
        assert!(extract_sse_event(&mut buffer).is_none());
        assert_eq!(buffer, b"event: new_notification\ndata: {\"partial");
    }

    #[test]
    fn test_character_split_across_chunks() {
        let payload = "event: new_notification\ndata: {\"id\":\"n7\",\"title\":\"Payout\",\"message\":\"₹1,499 sent to हस्तकला\"}\n\n";
        let bytes = payload.as_bytes();
        // Split inside the three bytes of the rupee sign.
        let rupee = payload.find('₹').unwrap();
        let (head, tail) = bytes.split_at(rupee + 2);

        let events = events_from(&[head, tail]);

        assert_eq!(events.len(), 1);
        match parse_sse_event(&events[0]) {
            Some(PushEvent::NewNotification(n)) => {
                assert_eq!(n.message, "₹1,499 sent to हस्तकला");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let events = events_from(&[
            b"event: ping\r\ndata: {}\r".as_slice(),
            b"\n\r".as_slice(),
            b"\nevent: presence\r\ndata: {}\r\n\r\n".as_slice(),
        ]);

        assert_eq!(events, vec!["event: ping\r\ndata: {}", "event: presence\r\ndata: {}"]);
        assert!(matches!(
            parse_sse_event(&events[1]),
            Some(PushEvent::Other(name)) if name == "presence"
        ));
    }

    #[test]
    fn test_parse_new_notification() {
        let event = "event: new_notification\ndata: {\"id\":\"n1\",\"title\":\"Order shipped\",\"message\":\"Your order is on its way\"}";
        match parse_sse_event(event) {
            Some(PushEvent::NewNotification(n)) => {
                assert_eq!(n.id.as_str(), "n1");
                assert_eq!(n.title, "Order shipped");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_other_event_types() {
        assert!(matches!(
            parse_sse_event("event: presence\ndata: {}"),
            Some(PushEvent::Other(name)) if name == "presence"
        ));
        assert!(parse_sse_event(": keep-alive").is_none());
    }

    #[test]
    fn test_parse_malformed_payload_is_skipped() {
        assert!(parse_sse_event("event: new_notification\ndata: {not json").is_none());
    }
}

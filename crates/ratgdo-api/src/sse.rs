//! Incremental decoder for `text/event-stream` bodies.
//!
//! The device's web server pushes named events:
//!
//! ```text
//! event: state
//! data: {"id":"cover-door","state":"OPEN",...}
//!
//! ```
//!
//! - `event: <name>` sets the name of the event being built
//! - `data: <text>` appends a payload line (multiple lines join with `\n`)
//! - an empty line dispatches the event
//! - lines starting with `:` are comments
//!
//! Bytes arrive in arbitrary network chunks, so the decoder keeps partial
//! lines between calls to [`SseDecoder::feed`].

/// Event name used when the server omits the `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One dispatched server-push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name, e.g. `"ping"`, `"state"`, `"log"`.
    pub name: String,
    /// Raw payload. JSON for `ping`/`state`, a text line for `log`.
    pub data: String,
    /// Last event id seen on the stream, if the server sends ids.
    pub id: Option<String>,
}

impl SseEvent {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// Stateful line-oriented decoder. Feed it chunks, collect events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    after_cr: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of the body and return every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for &byte in chunk {
            // CRLF counts as a single terminator.
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut events);
                }
                _ => self.line.push(byte),
            }
        }

        events
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let raw = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&raw);

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };

        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_owned()),
            // `retry` is meaningless here: reconnect cadence belongs to the client.
            _ => tracing::trace!(field, "ignoring event-stream field"),
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let name = self
            .event
            .take()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_owned());

        if !std::mem::take(&mut self.has_data) {
            return None;
        }

        Some(SseEvent {
            name,
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: ping\ndata: {\"title\":\"RATGDO32DISCO ABC123\"}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "ping");
        assert_eq!(events[0].data, r#"{"title":"RATGDO32DISCO ABC123"}"#);
    }

    #[test]
    fn joins_multi_line_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: log\ndata: first\ndata: second\n\n");

        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn keeps_partial_lines_between_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"event: sta").is_empty());
        assert!(decoder.feed(b"te\ndata: {\"id\":").is_empty());
        let events = decoder.feed(b"\"cover-door\"}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "state");
        assert_eq!(events[0].data, r#"{"id":"cover-door"}"#);
    }

    #[test]
    fn handles_crlf_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"event: ping\r").is_empty());
        // A lone CR already terminates the blank line, so the event is complete here.
        let events = decoder.feed(b"\ndata: x\r\n\r");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "ping");
        assert_eq!(events[0].data, "x");

        // The trailing LF belongs to the previous CR and must not dispatch anything.
        assert!(decoder.feed(b"\n").is_empty());
    }

    #[test]
    fn ignores_comments_and_unknown_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keepalive\nretry: 3000\nfoo: bar\nevent: log\ndata: hello\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "log");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn blank_line_without_data_dispatches_nothing() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: ping\n\nevent: state\ndata: {}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "state");
    }

    #[test]
    fn empty_data_field_is_dispatched_as_empty_payload() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: ping\ndata:\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn missing_event_field_uses_default_name() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 7\ndata: hi\n\n");

        assert_eq!(events[0].name, DEFAULT_EVENT_NAME);
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn value_without_space_after_colon() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event:state\ndata:{\"a\":1}\n\n");

        assert_eq!(events[0].name, "state");
        assert_eq!(events[0].data, "{\"a\":1}");
    }
}

//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module turns the raw byte stream of an HTTP response into a stream of events.  Events
//! are delimited by a blank line; `data:` lines are joined with newlines, `event:` names the
//! event, and comment lines (starting with `:`) are skipped.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::{Error, Result};

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// The joined `data:` lines.
    pub data: String,
}

/// Process a stream of bytes into a stream of server-sent events.
///
/// Bytes are buffered until a complete event is available, so multi-byte characters and
/// events split across chunks are handled.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer),
        move |(mut stream, mut buffer)| async move {
            loop {
                // First check if we have a complete event in the buffer
                while let Some(block) = take_block(&mut buffer) {
                    match parse_block(&block) {
                        Some(event) => return Some((event, (stream, buffer))),
                        None => continue,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer)));
                    }
                    None => {
                        // End of stream: a final event may lack its trailing blank line
                        if !buffer.is_empty() {
                            let block = std::mem::take(&mut buffer);
                            if let Some(event) = parse_block(&block) {
                                return Some((event, (stream, buffer)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Removes the first complete event block from `buffer`, without its delimiter.
fn take_block(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (end, delimiter) = find_delimiter(buffer)?;
    let block = buffer[..end].to_vec();
    buffer.drain(..end + delimiter);
    Some(block)
}

fn find_delimiter(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Parses one event block.  Returns `None` for blocks that carry no data, such as comments.
fn parse_block(block: &[u8]) -> Option<Result<SseEvent>> {
    let text = match std::str::from_utf8(block) {
        Ok(text) => text,
        Err(e) => {
            return Some(Err(Error::encoding(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            )));
        }
    };

    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(Ok(SseEvent {
        event,
        data: data.join("\n"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    type ByteResult = std::result::Result<Bytes, reqwest::Error>;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = ByteResult> + Unpin + Send + 'static {
        let items: Vec<ByteResult> = parts.iter().map(|p| Ok(Bytes::from_static(*p))).collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn parse_data_event() {
        let mut sse_stream = Box::pin(process_sse(chunks(&[b"data: {\"a\":1}\n\n"])));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event.event, None);
        assert_eq!(event.data, "{\"a\":1}");
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn parse_multiple_events() {
        let mut sse_stream = Box::pin(process_sse(chunks(&[
            b"event: ping\ndata: {}\n\ndata: one\n\n",
        ])));

        let event1 = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event1.event.as_deref(), Some("ping"));

        let event2 = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event2.data, "one");
    }

    #[tokio::test]
    async fn handle_split_event() {
        // An event split across chunks, including inside a multi-byte character
        let mut sse_stream = Box::pin(process_sse(chunks(&[
            b"data: caf\xc3",
            b"\xa9\n",
            b"\n",
        ])));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event.data, "café");
    }

    #[tokio::test]
    async fn handle_crlf_and_comments() {
        let mut sse_stream = Box::pin(process_sse(chunks(&[
            b": keep-alive\r\n\r\ndata: first\r\ndata: second\r\n\r\n",
        ])));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event.data, "first\nsecond");
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line() {
        let mut sse_stream = Box::pin(process_sse(chunks(&[b"data: last"])));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event.data, "last");
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_error() {
        let mut sse_stream = Box::pin(process_sse(chunks(&[b"data: \xff\n\n"])));
        let event = sse_stream.next().await.unwrap();
        assert!(matches!(event, Err(Error::Encoding { .. })));
    }
}

//! Framing helpers shared by the streaming backends.
//!
//! Providers deliver either newline-delimited JSON or server-sent events over a
//! chunked HTTP body. NDJSON chunks do not line up with lines, so bytes are
//! buffered until a full line is available. SSE bodies are decoded by
//! `eventsource-stream`, which joins multi-line `data:` fields per event. Either
//! way each payload is parsed by the provider and the resulting text deltas are
//! turned into a `ResponseStream`.

use super::{ResponseStream, StreamEvent};
use anyhow::{anyhow, Result};
use eventsource_stream::Eventsource;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::StatusCode;
use std::fmt;

/// What a provider payload means for the response.
#[derive(Debug, PartialEq, Eq)]
pub enum PayloadEvent {
    /// New response text.
    Delta(String),
    /// The provider signalled the end of the response.
    Done,
    /// Keep-alives, metadata and anything else without text.
    Skip,
}

/// Accumulates raw bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete line, without terminators.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left after the body ended without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).trim_end_matches('\r').to_string();
        self.pending.clear();
        Some(rest)
    }
}

/// Split an HTTP response body into lines.
pub fn body_lines(response: reqwest::Response) -> BoxStream<'static, Result<String>> {
    let chunks = response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(anyhow::Error::from));
    lines_from_chunks(chunks)
}

/// Split a stream of byte chunks into lines, flushing any unterminated tail.
pub fn lines_from_chunks<S>(chunks: S) -> BoxStream<'static, Result<String>>
where
    S: futures::Stream<Item = Result<Vec<u8>>> + Send + 'static,
{
    let state = (chunks.boxed(), LineBuffer::new(), false);
    stream::unfold(state, |(mut chunks, mut buffer, ended)| async move {
        if ended {
            return None;
        }
        let batch: Vec<Result<String>> = match chunks.next().await {
            Some(Ok(bytes)) => buffer.push(&bytes).into_iter().map(Ok).collect(),
            Some(Err(e)) => {
                return Some((vec![Err(e)], (chunks, buffer, true)));
            }
            None => {
                let tail: Vec<Result<String>> = buffer.finish().into_iter().map(Ok).collect();
                return Some((tail, (chunks, buffer, true)));
            }
        };
        Some((batch, (chunks, buffer, false)))
    })
    .flat_map(stream::iter)
    .boxed()
}

/// Decode a server-sent event body into the `data` of each event.
pub fn event_payloads(response: reqwest::Response) -> BoxStream<'static, Result<String>> {
    payloads_from_chunks(response.bytes_stream())
}

/// Decode SSE byte chunks into event payloads. Comments and events without
/// data never reach the provider.
pub fn payloads_from_chunks<S, B, E>(chunks: S) -> BoxStream<'static, Result<String>>
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    chunks
        .eventsource()
        .map(|event| match event {
            Ok(event) => Ok(event.data),
            Err(e) => Err(anyhow!("SSE stream error: {}", e)),
        })
        .boxed()
}

struct Assembly<F> {
    lines: BoxStream<'static, Result<String>>,
    parse: F,
    full: String,
    finished: bool,
}

/// Turn provider payloads (NDJSON lines or SSE event data) into fragments followed by one `Completed` event.
///
/// Parsing stops at the first error, and a body that ends without an explicit
/// end marker still completes with the text seen so far.
pub fn assemble<F>(lines: BoxStream<'static, Result<String>>, parse: F) -> ResponseStream
where
    F: Fn(&str) -> Result<PayloadEvent> + Send + 'static,
{
    let state = Assembly {
        lines,
        parse,
        full: String::new(),
        finished: false,
    };
    stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            let line = match st.lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            match (st.parse)(&line) {
                Ok(PayloadEvent::Delta(text)) if !text.is_empty() => {
                    st.full.push_str(&text);
                    return Some((Ok(StreamEvent::Fragment(text)), st));
                }
                Ok(PayloadEvent::Delta(_)) | Ok(PayloadEvent::Skip) => continue,
                Ok(PayloadEvent::Done) => break,
                Err(e) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
            }
        }
        st.finished = true;
        let full = std::mem::take(&mut st.full);
        Some((Ok(StreamEvent::Completed(full)), st))
    })
    .boxed()
}

/// Build an error from a failed HTTP response, preferring the provider's message.
pub async fn status_error(
    provider: &str,
    response: reqwest::Response,
    extract: fn(&serde_json::Value) -> Option<String>,
) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    http_error(provider, status, &body, extract)
}

/// The error for a refused request. Falls back to the raw body when it is not
/// JSON or carries no message `extract` recognises.
pub fn http_error(
    provider: &str,
    status: StatusCode,
    body: &str,
    extract: fn(&serde_json::Value) -> Option<String>,
) -> anyhow::Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(extract)
        .unwrap_or_else(|| body.to_string());
    anyhow!(
        "{} request failed with status {}: {}",
        provider,
        status,
        message.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn chunks(parts: &[&str]) -> BoxStream<'static, Result<Vec<u8>>> {
        let owned: Vec<Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned).boxed()
    }

    fn collect_lines(parts: &[&str]) -> Vec<String> {
        block_on(lines_from_chunks(chunks(parts)).map(|l| l.unwrap()).collect())
    }

    fn simple_parse(line: &str) -> Result<PayloadEvent> {
        match line {
            "END" => Ok(PayloadEvent::Done),
            "noop" => Ok(PayloadEvent::Skip),
            "bad" => Err(anyhow!("malformed line")),
            text => Ok(PayloadEvent::Delta(text.to_string())),
        }
    }

    fn events(lines: &[&str]) -> Vec<Result<StreamEvent>> {
        let owned: Vec<Result<String>> = lines.iter().map(|l| Ok(l.to_string())).collect();
        block_on(assemble(stream::iter(owned).boxed(), simple_parse).collect())
    }

    #[test]
    fn test_line_buffer_joins_split_lines() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"resp").is_empty());
        assert_eq!(buffer.push(b"onse\":1}\r\n{\"a\""), vec!["{\"response\":1}"]);
        assert_eq!(buffer.finish(), Some("{\"a\"".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_lines_from_chunks_flushes_tail() {
        assert_eq!(
            collect_lines(&["one\ntw", "o\n", "three"]),
            vec!["one", "two", "three"]
        );
    }

    #[test]
    fn test_lines_keep_multibyte_characters_split_across_chunks() {
        let bytes = "✨\n".as_bytes();
        let (head, tail) = bytes.split_at(1);
        let parts: Vec<Result<Vec<u8>>> = vec![Ok(head.to_vec()), Ok(tail.to_vec())];
        let lines: Vec<String> =
            block_on(lines_from_chunks(stream::iter(parts)).map(|l| l.unwrap()).collect());
        assert_eq!(lines, vec!["✨"]);
    }

    fn collect_payloads(parts: &[&str]) -> Vec<String> {
        let owned: Vec<Result<Vec<u8>, std::io::Error>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        block_on(payloads_from_chunks(stream::iter(owned)).map(|p| p.unwrap()).collect())
    }

    fn message_field(body: &serde_json::Value) -> Option<String> {
        body.pointer("/error/message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
    }

    #[test]
    fn test_event_payloads_join_multiline_data() {
        let body = "data: {\"candidates\":[{\"content\":\ndata: {\"parts\":[{\"text\":\"Hi\"}]}}]}\n\n";
        assert_eq!(
            collect_payloads(&[body]),
            vec!["{\"candidates\":[{\"content\":\n{\"parts\":[{\"text\":\"Hi\"}]}}]}"]
        );
    }

    #[test]
    fn test_event_payloads_across_chunks() {
        let payloads = collect_payloads(&[
            ": keep-alive\n\nevent: message_start\nda",
            "ta: {\"a\":1}\n",
            "\ndata:[DONE]\n\n",
        ]);
        assert_eq!(payloads, vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn test_http_error_prefers_provider_message() {
        let body = r#"{"error":{"code":429,"message":"quota exceeded"}}"#;
        let err = http_error("Gemini API", StatusCode::TOO_MANY_REQUESTS, body, message_field);
        assert_eq!(
            err.to_string(),
            "Gemini API request failed with status 429 Too Many Requests: quota exceeded"
        );
    }

    #[test]
    fn test_http_error_falls_back_to_raw_body() {
        let err = http_error(
            "Ollama",
            StatusCode::BAD_GATEWAY,
            "upstream unavailable\n",
            message_field,
        );
        assert!(err.to_string().ends_with("status 502 Bad Gateway: upstream unavailable"));

        let json_without_message = r#"{"detail":"nope"}"#;
        let err = http_error("OpenAI API", StatusCode::BAD_REQUEST, json_without_message, message_field);
        assert!(err.to_string().contains(json_without_message));
    }

    #[test]
    fn test_assemble_emits_fragments_then_completion() {
        let events = events(&["Hi", "noop", "", " there", "END", "ignored"]);
        let events: Vec<StreamEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Fragment("Hi".to_string()),
                StreamEvent::Fragment(" there".to_string()),
                StreamEvent::Completed("Hi there".to_string()),
            ]
        );
    }

    #[test]
    fn test_assemble_completes_at_end_of_body() {
        let events: Vec<StreamEvent> = events(&["a", "b"]).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events.last(), Some(&StreamEvent::Completed("ab".to_string())));
    }

    #[test]
    fn test_assemble_stops_at_first_error() {
        let events = events(&["a", "bad", "b"]);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(StreamEvent::Fragment(_))));
        let err = events[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("malformed line"));
    }
}

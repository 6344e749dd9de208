use std::time::Duration;

use anyhow::{Error, Result, anyhow, bail};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model")]
    Model,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Part {
    pub text: String,
}

/// One turn of a conversation in the shape the Gemini API expects
/// for `contents`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, text: &str) -> Self {
        Content {
            role,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

// {
//   "candidates": [{
//     "content": {"parts": [{"text": "Hel"}], "role": "model"},
//     "finishReason": "STOP",
//     "index": 0
//   }],
//   "usageMetadata": {...},
//   "modelVersion": "gemini-2.5-flash"
// }
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    // Thought summaries are not part of the answer
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<u32>,
    message: String,
    status: Option<String>,
}

/// Accumulates raw bytes from the provider and splits them into
/// complete SSE events. Bytes are kept as-is until an event is
/// complete so multi-byte characters split across network reads
/// survive.
#[derive(Debug, Default)]
pub struct EventBuffer {
    buffer: Vec<u8>,
}

impl EventBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns the next complete event, if any.
    pub fn next_event(&mut self) -> Option<String> {
        let (pos, delim_len) = find_double_newline(&self.buffer)?;
        let event = self.buffer.drain(..pos).collect::<Vec<u8>>();
        self.buffer.drain(..delim_len);
        Some(String::from_utf8_lossy(&event).into_owned())
    }

    /// Returns whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
            self.buffer.clear();
            return None;
        }
        let event = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&event).into_owned())
    }
}

fn find_double_newline(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Extracts the answer text from a single SSE event. Returns `None`
/// for events that carry no text (comments, usage-only or finish
/// events) and an error if the provider reported one.
pub fn parse_event(event: &str) -> Result<Option<String>, Error> {
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    if data.is_empty() {
        return Ok(None);
    }

    let chunk = serde_json::from_str::<StreamChunk>(&data).inspect_err(|e| {
        tracing::error!("Parsing stream chunk failed for {}\nError:{}", data, e)
    })?;

    if let Some(ErrorDetail {
        code,
        message,
        status,
    }) = chunk.error
    {
        bail!(
            "Provider error {} {}: {}",
            code.map(|c| c.to_string()).unwrap_or_default(),
            status.unwrap_or_default(),
            message
        );
    }

    let text = chunk
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

/// Opens a streaming generation request. Anything that goes wrong
/// before the first byte of output (bad credentials, rejected
/// payload) is returned here so the caller can fail the request
/// instead of the stream.
pub async fn start_stream(
    contents: &[Content],
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<reqwest::Response, Error> {
    let payload = json!({ "contents": contents });
    let url = format!(
        "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
        api_hostname.trim_end_matches("/"),
        model
    );
    let response = reqwest::Client::new()
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 5))
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Provider returned {}: {}", status, body));
    }

    Ok(response)
}

/// Forwards each text delta from the provider to `tx` in arrival
/// order, unmodified. The provider emits incremental deltas, so no
/// prefix stripping happens here. Returns the full text once the
/// provider stream ends.
pub async fn forward_stream(
    response: reqwest::Response,
    tx: mpsc::UnboundedSender<Result<String, Error>>,
) -> Result<String, Error> {
    let mut stream = response.bytes_stream();
    let mut buffer = EventBuffer::default();
    let mut content_buf = String::new();

    while let Some(chunk) = stream.next().await {
        buffer.push(&chunk?);

        while let Some(event) = buffer.next_event() {
            if let Some(text) = parse_event(&event)? {
                content_buf.push_str(&text);
                if tx.send(Ok(text)).is_err() {
                    tracing::debug!("Client disconnected, dropping the rest of the stream");
                    return Ok(content_buf);
                }
            }
        }
    }

    // Some servers close the connection without a trailing blank line
    if let Some(event) = buffer.finish()
        && let Some(text) = parse_event(&event)?
    {
        content_buf.push_str(&text);
        let _ = tx.send(Ok(text));
    }

    Ok(content_buf)
}

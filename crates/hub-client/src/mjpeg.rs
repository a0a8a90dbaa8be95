//! First-frame extraction from `multipart/x-mixed-replace` camera streams.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Header search gives up on a buffer this large without a blank line...
pub const HEADER_SEARCH_LIMIT: usize = 8 * 1024;
/// ...keeping only this much of its tail
pub const HEADER_KEEP: usize = 2 * 1024;
/// Largest part body accepted
pub const MAX_PART_SIZE: usize = 2 * 1024 * 1024;

const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Headers,
    Body { content_length: usize },
}

/// Incremental parser returning the body of the first part of an MJPEG stream
#[derive(Debug)]
pub struct MjpegFrameReader {
    boundary: String,
    buffer: Vec<u8>,
    state: State,
}

impl MjpegFrameReader {
    /// Build a reader for a response with the given `Content-Type`, which must
    /// carry a `boundary=` parameter
    pub fn new(content_type: &str) -> Result<Self> {
        let boundary = parse_boundary(content_type)
            .ok_or_else(|| anyhow!("no boundary in MJPEG content type: {}", content_type))?;

        Ok(Self {
            boundary,
            buffer: Vec::new(),
            state: State::Headers,
        })
    }

    /// Part delimiter, always starting with `--`
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Feed the next chunk. Returns the first complete frame once available.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>> {
        self.buffer.extend_from_slice(chunk);

        if self.state == State::Headers {
            let Some(end) = find(&self.buffer, HEADER_END) else {
                if self.buffer.len() > HEADER_SEARCH_LIMIT {
                    let tail = self.buffer.len() - HEADER_KEEP;
                    self.buffer.drain(..tail);
                }
                return Ok(None);
            };

            // Anything before the delimiter line is preamble
            let start = find(&self.buffer[..end], self.boundary.as_bytes()).with_context(|| {
                format!("MJPEG part does not start with boundary {}", self.boundary)
            })?;

            let content_length = content_length(&self.buffer[start..end])
                .filter(|len| *len > 0)
                .context("no Content-Length in MJPEG part headers")?;
            if content_length > MAX_PART_SIZE {
                bail!(
                    "MJPEG part too large: {} bytes (limit {})",
                    content_length,
                    MAX_PART_SIZE
                );
            }

            self.buffer.drain(..end + HEADER_END.len());
            self.state = State::Body { content_length };
        }

        if let State::Body { content_length } = self.state {
            if self.buffer.len() >= content_length {
                return Ok(Some(self.buffer[..content_length].to_vec()));
            }
        }

        Ok(None)
    }
}

/// Read the first frame of a streaming response, giving up after `timeout`
pub async fn read_first_frame(mut response: reqwest::Response, timeout: Duration) -> Result<Vec<u8>> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut reader = MjpegFrameReader::new(&content_type)?;

    tokio::time::timeout(timeout, next_frame(&mut response, &mut reader))
        .await
        .map_err(|_| anyhow!("timed out after {:?} reading first MJPEG frame", timeout))?
}

async fn next_frame(
    response: &mut reqwest::Response,
    reader: &mut MjpegFrameReader,
) -> Result<Vec<u8>> {
    while let Some(chunk) = response.chunk().await? {
        if let Some(frame) = reader.push(&chunk)? {
            return Ok(frame);
        }
    }
    bail!("MJPEG stream ended before a complete frame")
}

fn parse_boundary(content_type: &str) -> Option<String> {
    let start = content_type.find("boundary=")? + "boundary=".len();
    let value: String = content_type[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != ';')
        .collect();
    let value = value.trim_matches('"');
    if value.is_empty() {
        return None;
    }

    if value.starts_with("--") {
        Some(value.to_string())
    } else {
        Some(format!("--{}", value))
    }
}

fn content_length(headers: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(headers).lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

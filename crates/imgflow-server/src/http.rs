// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal HTTP/1.1 framing over raw TCP.
//
// One request per connection: the head is read up to the blank line, the
// body is read to exactly `Content-Length` bytes, and every response is
// written with `Connection: close`. Chunked transfer is not supported.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use imgflow_core::error::{ImgflowError, Result};

/// Upper bound on the request line plus headers.
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Path with any query string removed.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Request line and headers, before the body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestHead {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    fn content_length(&self) -> Result<usize> {
        let Some((_, value)) = self
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        else {
            return Ok(0);
        };
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| ImgflowError::InvalidRequest(format!("bad Content-Length '{value}'")))
    }
}

/// Parse the request line and headers. `head` excludes the final blank line.
fn parse_head(head: &[u8]) -> Result<RequestHead> {
    let text = std::str::from_utf8(head)
        .map_err(|_| ImgflowError::InvalidRequest("request head is not UTF-8".into()))?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(_version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ImgflowError::InvalidRequest(format!(
            "malformed request line '{request_line}'"
        )));
    };
    let path = target.split('?').next().unwrap_or(target);

    let headers = lines
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Ok(RequestHead {
        method: method.to_ascii_uppercase(),
        path: path.to_string(),
        headers,
    })
}

/// Find the first occurrence of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Read one request. Returns `Ok(None)` when the peer closes without sending
/// anything.
///
/// A declared body larger than `max_body` fails with
/// [`ImgflowError::PayloadTooLarge`] before any of it is read.
pub async fn read_request<R>(stream: &mut R, max_body: usize) -> Result<Option<HttpRequest>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(ImgflowError::InvalidRequest(format!(
                "request head exceeds {MAX_HEAD_BYTES} bytes"
            )));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ImgflowError::InvalidRequest(
                "connection closed before end of headers".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = parse_head(&buf[..header_end])?;
    let length = head.content_length()?;
    if length > max_body {
        return Err(ImgflowError::PayloadTooLarge { limit: max_body });
    }

    let mut body = buf.split_off(header_end + 4);
    if body.len() > length {
        body.truncate(length);
    } else if body.len() < length {
        let already = body.len();
        body.resize(length, 0);
        stream.read_exact(&mut body[already..]).await?;
    }

    Ok(Some(HttpRequest {
        method: head.method,
        path: head.path,
        headers: head.headers,
        body,
    }))
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A response ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// JSON body. Serialization of our own wire types cannot fail in
    /// practice; if it does the client gets a 500 with a plain message.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: Some("application/json"),
                body,
            },
            Err(e) => Self {
                status: 500,
                content_type: Some("text/plain; charset=utf-8"),
                body: format!("response serialization failed: {e}").into_bytes(),
            },
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: None,
            body: Vec::new(),
        }
    }
}

/// Canonical reason phrase for the statuses this server emits.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Write `response` with CORS headers and flush.
pub async fn write_response<W>(stream: &mut W, response: &HttpResponse, cors_origin: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n\
         Access-Control-Allow-Origin: {cors_origin}\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: *\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n",
        response.status,
        reason_phrase(response.status),
        response.body.len()
    );
    if let Some(content_type) = response.content_type {
        head.push_str(&format!("Content-Type: {content_type}\r\n"));
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_post_with_body() {
        let raw = b"POST /process?x=1 HTTP/1.1\r\nHost: a\r\ncontent-length: 5\r\n\r\nhello";
        let req = read_request(&mut &raw[..], 1024).await.unwrap().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/process");
        assert_eq!(req.header("Content-Length"), Some("5"));
        assert_eq!(req.body, b"hello");
    }

    #[tokio::test]
    async fn missing_length_means_empty_body() {
        let raw = b"GET /health HTTP/1.1\r\n\r\n";
        let req = read_request(&mut &raw[..], 1024).await.unwrap().unwrap();
        assert_eq!(req.method, "GET");
        assert!(req.body.is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_reading() {
        let raw = b"POST /process HTTP/1.1\r\nContent-Length: 4096\r\n\r\n";
        let err = read_request(&mut &raw[..], 100).await.unwrap_err();
        assert!(matches!(err, ImgflowError::PayloadTooLarge { limit: 100 }));
        assert_eq!(err.status_code(), 413);
    }

    #[tokio::test]
    async fn short_body_is_an_io_error() {
        let raw = b"POST /p HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        let err = read_request(&mut &raw[..], 1024).await.unwrap_err();
        assert!(matches!(err, ImgflowError::Io(_)));
    }

    #[tokio::test]
    async fn empty_connection_yields_none() {
        let raw: &[u8] = b"";
        assert!(read_request(&mut &raw[..], 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_request_line_is_invalid() {
        let raw = b"HELLO\r\n\r\n";
        let err = read_request(&mut &raw[..], 1024).await.unwrap_err();
        assert!(matches!(err, ImgflowError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn response_carries_cors_and_length() {
        let mut out = Vec::new();
        let resp = HttpResponse::json(200, &serde_json::json!({"ok": true}));
        write_response(&mut out, &resp, "*").await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains(&format!("Content-Length: {}\r\n", resp.body.len())));
        assert!(text.ends_with("{\"ok\":true}"));
    }

    #[tokio::test]
    async fn no_content_has_no_type() {
        let mut out = Vec::new();
        write_response(&mut out, &HttpResponse::no_content(), "https://x").await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(!text.contains("Content-Type"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}

//! Minimal, bounded HTTP/1.x request-line + header parser.
//!
//! The corpus has no `httparse`-style crate available, so this reads just
//! enough off a buffered reader to route the request: the request line and
//! headers, never the body. Every read is bounded (max line length, max
//! header count) so a hostile or broken client cannot pin the task open
//! reading forever.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const MAX_LINE_BYTES: usize = 8 * 1024;
const MAX_HEADERS: usize = 128;

#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    /// Exact bytes read off the wire for the request line and headers
    /// (including the terminating blank line), in order. The L7 forwarder
    /// re-emits these to the backend before splicing the rest of the
    /// connection, since parsing already consumed them from the reader.
    pub raw_bytes: Vec<u8>,
}

impl ParsedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn host(&self) -> Option<&str> {
        self.header("Host")
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("User-Agent")
    }

    /// Value of the "session_id" cookie, if a Cookie header carries one.
    pub fn session_id_cookie(&self) -> Option<String> {
        let cookie_header = self.header("Cookie")?;
        cookie_header.split(';').find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            if name.trim() == "session_id" {
                Some(value.trim().to_string())
            } else {
                None
            }
        })
    }
}

/// Reads a request line and headers (terminated by a blank line) off
/// `reader`. The body, if any, is left unconsumed on the reader.
pub async fn parse_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<ParsedRequest> {
    let mut raw_bytes = Vec::new();

    let request_line = read_bounded_line(reader, &mut raw_bytes).await?;
    let (method, path, version) = parse_request_line(&request_line)?;

    let mut headers = Vec::new();
    loop {
        let line = read_bounded_line(reader, &mut raw_bytes).await?;
        if line.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "too many headers"));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed header line"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(ParsedRequest {
        method,
        path,
        version,
        headers,
        raw_bytes,
    })
}

/// Reads one CRLF- or LF-terminated line, stripped of its terminator.
/// Rejects lines longer than `MAX_LINE_BYTES` rather than growing the
/// buffer without bound.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(reader: &mut R, raw_out: &mut Vec<u8>) -> io::Result<String> {
    let mut buf = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            // Peer closed mid-header; treat what we have as the line.
            break;
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            buf.extend_from_slice(&available[..=pos]);
            reader.consume(pos + 1);
            break;
        }
        buf.extend_from_slice(available);
        let consumed = available.len();
        reader.consume(consumed);
        if buf.len() > MAX_LINE_BYTES {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "request line too long"));
        }
    }
    raw_out.extend_from_slice(&buf);
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn parse_request_line(line: &str) -> io::Result<(String, String, String)> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty request line"))?;
    let path = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing request target"))?;
    let version = parts.next().unwrap_or("HTTP/1.1");
    Ok((method.to_string(), path.to_string(), version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn parses_request_line_and_headers() {
        let raw = b"GET /style.css HTTP/1.1\r\nHost: x\r\nUser-Agent: test\r\n\r\nbody-not-consumed";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let parsed = parse_request(&mut reader).await.unwrap();
        assert_eq!(parsed.method, "GET");
        assert_eq!(parsed.path, "/style.css");
        assert_eq!(parsed.host(), Some("x"));
        assert_eq!(parsed.user_agent(), Some("test"));
    }

    #[tokio::test]
    async fn extracts_session_id_cookie() {
        let raw = b"GET / HTTP/1.1\r\nCookie: a=1; session_id=abc123; b=2\r\n\r\n";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let parsed = parse_request(&mut reader).await.unwrap();
        assert_eq!(parsed.session_id_cookie(), Some("abc123".to_string()));
    }

    #[tokio::test]
    async fn missing_cookie_header_yields_none() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let parsed = parse_request(&mut reader).await.unwrap();
        assert_eq!(parsed.session_id_cookie(), None);
    }

    #[tokio::test]
    async fn rejects_oversized_line() {
        let mut raw = b"GET /".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_LINE_BYTES + 1));
        raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        let mut reader = BufReader::new(Cursor::new(raw));
        assert!(parse_request(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn raw_bytes_reconstruct_original_header_block() {
        let raw = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\n";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let parsed = parse_request(&mut reader).await.unwrap();
        assert_eq!(parsed.raw_bytes, raw);
    }

    #[tokio::test]
    async fn body_is_left_unconsumed() {
        let raw = b"GET / HTTP/1.1\r\n\r\nBODYDATA";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        parse_request(&mut reader).await.unwrap();
        let mut rest = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut reader, &mut rest)
            .await
            .unwrap();
        assert_eq!(rest, "BODYDATA");
    }
}

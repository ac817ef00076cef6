//! Minimal HTTP/1.1 GET exchange over an established stream.
//!
//! Deliberately not a general HTTP client: one request per connection,
//! `Connection: close`, no redirects, content-length and chunked bodies
//! only. The Host header is caller-controlled and independent of whatever
//! name the transport below was opened with; that split is the entire
//! point of the fronting exchange.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::trace;

pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 9.0.0) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/76.0.3626.56 Mobile Safari/537.36";

/// Fixed client identification header sent with every engine request.
pub const CLIENT_ID: &str = "0123456789012345678901234567890123";

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// Sends `GET path` with `host` in the Host header and reads the full
/// response. Bounded by the exchange timeout; callers sequence their own
/// connect timeouts separately.
pub async fn get<S>(stream: S, host: &str, path: &str) -> io::Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    timeout(EXCHANGE_TIMEOUT, exchange(stream, host, path))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "http exchange timed out"))?
}

async fn exchange<S>(stream: S, host: &str, path: &str) -> io::Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         User-Agent: {USER_AGENT}\r\n\
         Client: {CLIENT_ID}\r\n\
         Accept: */*\r\n\
         Connection: close\r\n\r\n"
    );
    stream.get_mut().write_all(request.as_bytes()).await?;
    stream.get_mut().flush().await?;

    let mut line = String::new();
    stream.read_line(&mut line).await?;
    let status = parse_status_line(line.trim_end())?;

    let mut content_length: Option<usize> = None;
    let mut chunked = false;
    loop {
        let mut header = String::new();
        if stream.read_line(&mut header).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside response headers",
            ));
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().ok();
            } else if name.eq_ignore_ascii_case("transfer-encoding")
                && value.eq_ignore_ascii_case("chunked")
            {
                chunked = true;
            }
        }
    }

    let body = if chunked {
        read_chunked(&mut stream).await?
    } else if let Some(len) = content_length {
        if len > MAX_BODY_BYTES {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "response too large"));
        }
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await?;
        buf
    } else {
        let mut buf = Vec::new();
        stream
            .take(MAX_BODY_BYTES as u64)
            .read_to_end(&mut buf)
            .await?;
        buf
    };

    trace!(status, body_len = body.len(), "http exchange complete");
    Ok(Response {
        status,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn parse_status_line(line: &str) -> io::Result<u16> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse::<u16>()
            .map_err(|_| bad_response(format!("unparseable status code in {line:?}"))),
        _ => Err(bad_response(format!("malformed status line {line:?}"))),
    }
}

async fn read_chunked<S>(stream: &mut BufReader<S>) -> io::Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        if stream.read_line(&mut size_line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside chunked body",
            ));
        }
        let size_text = size_line
            .trim_end()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| bad_response(format!("bad chunk size {size_text:?}")))?;
        if size == 0 {
            // trailers, up to the final blank line
            loop {
                let mut trailer = String::new();
                let n = stream.read_line(&mut trailer).await?;
                if n == 0 || trailer.trim_end().is_empty() {
                    break;
                }
            }
            return Ok(body);
        }
        if body.len() + size > MAX_BODY_BYTES {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "response too large"));
        }
        let start = body.len();
        body.resize(start + size, 0);
        stream.read_exact(&mut body[start..]).await?;
        let mut crlf = [0u8; 2];
        stream.read_exact(&mut crlf).await?;
    }
}

fn bad_response(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    async fn canned_exchange(response: &'static str) -> (io::Result<Response>, Vec<u8>) {
        let (client, mut server) = tokio::io::duplex(16 * 1024);
        let server_task = tokio::spawn(async move {
            let mut request = vec![0u8; 4096];
            let n = server.read(&mut request).await.unwrap();
            request.truncate(n);
            server.write_all(response.as_bytes()).await.unwrap();
            server.shutdown().await.unwrap();
            request
        });

        let result = get(client, "hidden.example.com", "/v3/test").await;
        let request = server_task.await.unwrap();
        (result, request)
    }

    #[tokio::test]
    async fn exchange_with_content_length() {
        let (result, request) = canned_exchange(
            "HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\n3ok",
        )
        .await;

        let response = result.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "3ok");

        let request = String::from_utf8(request).unwrap();
        assert!(request.starts_with("GET /v3/test HTTP/1.1\r\n"));
        assert!(request.contains("Host: hidden.example.com\r\n"));
        assert!(request.contains(&format!("Client: {CLIENT_ID}\r\n")));
        assert!(request.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn exchange_with_chunked_body() {
        let (result, _) = canned_exchange(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
             2\r\n3o\r\n1\r\nk\r\n0\r\n\r\n",
        )
        .await;

        let response = result.unwrap();
        assert_eq!(response.body, "3ok");
    }

    #[tokio::test]
    async fn exchange_without_length_reads_to_close() {
        let (result, _) = canned_exchange("HTTP/1.0 404 Not Found\r\n\r\nmissing").await;
        let response = result.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, "missing");
    }

    #[tokio::test]
    async fn malformed_status_line_is_an_error() {
        let (result, _) = canned_exchange("garbage\r\n\r\n").await;
        assert!(result.is_err());
    }

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line("HTTP/1.1 200 OK").unwrap(), 200);
        assert_eq!(parse_status_line("HTTP/1.0 404 Not Found").unwrap(), 404);
        assert!(parse_status_line("ICY 200 OK").is_err());
        assert!(parse_status_line("HTTP/1.1").is_err());
    }
}

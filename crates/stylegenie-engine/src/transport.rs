use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

/// Status and raw body of one styling call. The body is kept as text so an
/// empty or non-JSON reply can be told apart from a shape mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait StylingTransport: Send + Sync {
    fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse>;
}

pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self { http })
    }
}

impl StylingTransport for HttpTransport {
    fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .with_context(|| format!("styling request failed ({url})"))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .with_context(|| format!("styling response body read failed ({url})"))?;
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::{HttpTransport, StylingTransport};

    /// Serves one canned HTTP reply per entry and hands back what each
    /// request looked like.
    pub(crate) fn serve_replies(
        replies: Vec<(u16, &'static str)>,
    ) -> anyhow::Result<(String, JoinHandle<Vec<String>>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}/outfits", listener.local_addr()?);
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in replies {
                let Ok((stream, _)) = listener.accept() else {
                    break;
                };
                let mut reader = BufReader::new(stream);
                let mut head = String::new();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                    head.push_str(&line);
                }
                let mut payload = vec![0u8; content_length];
                let _ = reader.read_exact(&mut payload);
                head.push_str(&String::from_utf8_lossy(&payload));
                seen.push(head);

                let reply = format!(
                    "HTTP/1.1 {status} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let mut stream = reader.into_inner();
                let _ = stream.write_all(reply.as_bytes());
                let _ = stream.flush();
            }
            seen
        });
        Ok((url, handle))
    }

    #[test]
    fn http_transport_posts_json_and_returns_raw_body() -> anyhow::Result<()> {
        let (url, handle) = serve_replies(vec![(502, "<html>bad gateway</html>")])?;
        let transport = HttpTransport::new(Duration::from_secs(5))?;
        let response = transport.post_json(&url, &json!({"occasion": "wedding"}))?;
        assert_eq!(response.status, 502);
        assert!(!response.is_success());
        assert_eq!(response.body, "<html>bad gateway</html>");

        let seen = handle.join().map_err(|_| anyhow::anyhow!("server panicked"))?;
        let request = seen[0].to_ascii_lowercase();
        assert!(request.starts_with("post /outfits"));
        assert!(request.contains("content-type: application/json"));
        assert!(request.contains("accept: application/json"));
        let body = seen[0].rsplit("\r\n").next().unwrap_or("");
        let parsed: Value = serde_json::from_str(body)?;
        assert_eq!(parsed, json!({"occasion": "wedding"}));
        Ok(())
    }

    #[test]
    fn http_transport_reports_connection_errors() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}/outfits", listener.local_addr()?);
        drop(listener);
        let transport = HttpTransport::new(Duration::from_secs(2))?;
        let err = transport.post_json(&url, &json!({})).unwrap_err();
        assert!(err.to_string().contains("styling request failed"));
        Ok(())
    }
}

//! reqwest-backed [`WebhookTransport`].
//!
//! Posts the canonical JSON payload with the caller's headers. Every
//! request carries the configured timeout, so an unresponsive endpoint
//! becomes a [`NotifyError::Timeout`] instead of a hung task.

use std::time::Duration;

use platewatch_core::config::WebhookConfig;

use crate::traits::{NotifyError, WebhookRequest, WebhookResponse, WebhookTransport};

/// Shared HTTP client (connection pooling) with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout_seconds: u64,
}

impl HttpTransport {
    pub fn new(timeout_seconds: u64) -> Result<Self, NotifyError> {
        let timeout_seconds = timeout_seconds.max(1);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            timeout_seconds,
        })
    }

    pub fn from_config(config: &WebhookConfig) -> Result<Self, NotifyError> {
        Self::new(config.timeout_seconds)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

#[async_trait::async_trait]
impl WebhookTransport for HttpTransport {
    async fn send(&self, request: &WebhookRequest) -> Result<WebhookResponse, NotifyError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(request.body.clone());

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout(self.timeout_seconds)
            } else {
                NotifyError::Http(e)
            }
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        tracing::debug!(url = %request.url, %status, "webhook response");

        Ok(WebhookResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Accept one connection, capture the raw request, reply with `reply`.
    async fn one_shot_server(reply: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (url, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn posts_body_and_headers() {
        let (url, server) =
            one_shot_server("HTTP/1.1 202 Accepted\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                .await;
        let transport = HttpTransport::new(5).unwrap();
        let request = WebhookRequest {
            url,
            headers: vec![("X-Signature".to_string(), "abc".to_string())],
            body: br#"{"plate":"AB123"}"#.to_vec(),
        };

        let response = transport.send(&request).await.unwrap();
        assert_eq!(response.status, 202);
        assert_eq!(response.body, "ok");
        assert!(response.is_success());

        let raw = server.await.unwrap().to_lowercase();
        assert!(raw.starts_with("post /hook"));
        assert!(raw.contains("content-type: application/json"));
        assert!(raw.contains("x-signature: abc"));
        assert!(raw.ends_with(r#"{"plate":"ab123"}"#));
    }

    #[tokio::test]
    async fn non_2xx_is_a_response_not_an_error() {
        let (url, server) = one_shot_server(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 4\r\nconnection: close\r\n\r\nbusy",
        )
        .await;
        let transport = HttpTransport::new(5).unwrap();
        let request = WebhookRequest {
            url,
            headers: Vec::new(),
            body: b"{}".to_vec(),
        };
        let response = transport.send(&request).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        // Bind then drop to get a port with nothing listening.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let transport = HttpTransport::new(2).unwrap();
        let request = WebhookRequest {
            url: format!("http://{addr}/hook"),
            headers: Vec::new(),
            body: b"{}".to_vec(),
        };
        let err = transport.send(&request).await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_) | NotifyError::Timeout(_)));
    }

    #[test]
    fn zero_timeout_is_clamped() {
        assert_eq!(HttpTransport::new(0).unwrap().timeout_seconds(), 1);
    }
}

//! HTTP client posting results to the scoring endpoint.

use serde::Serialize;
use std::time::Duration;

use crate::config::SubmissionConfig;
use crate::error::SubmissionError;

use super::results::Submission;
use super::retry;

/// What the endpoint answered.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub status: u16,
    /// Response body, parsed as JSON when possible, otherwise a JSON string
    pub body: serde_json::Value,
    /// Attempts used, starting at 1
    pub attempts: u32,
}

impl SubmissionReceipt {
    /// Score reported by the endpoint, read from a `results` or `accuracy` field.
    pub fn accuracy(&self) -> Option<f64> {
        ["results", "accuracy"]
            .iter()
            .find_map(|key| self.body.get(key))
            .and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
    }
}

/// Posts [`Submission`]s with timeout and retry.
pub struct SubmissionClient {
    client: reqwest::Client,
    config: SubmissionConfig,
}

impl SubmissionClient {
    pub fn new(config: SubmissionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// POST `submission` as JSON, retrying transient failures with
    /// exponential backoff.
    pub async fn submit(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let body = serde_json::to_vec(submission)?;
        let mut last_error = None;

        for attempt in 0..=self.config.retry_attempts {
            if attempt > 0 {
                let delay = retry::backoff_duration(attempt - 1, self.config.retry_delay_ms);
                tracing::debug!(
                    "Retry {attempt}/{} for {} after {delay:?}",
                    self.config.retry_attempts,
                    self.config.url
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(body.clone()).await {
                Ok((status, body)) => {
                    let receipt = SubmissionReceipt {
                        status,
                        body,
                        attempts: attempt + 1,
                    };
                    match receipt.accuracy() {
                        Some(accuracy) => tracing::info!(
                            "Submitted {} queries to {}: accuracy {:.3}",
                            submission.len(),
                            self.config.url,
                            accuracy
                        ),
                        None => tracing::info!(
                            "Submitted {} queries to {} (HTTP {}): {}",
                            submission.len(),
                            self.config.url,
                            status,
                            receipt.body
                        ),
                    }
                    return Ok(receipt);
                }
                Err(e) => {
                    tracing::warn!("Submission attempt {} failed: {}", attempt + 1, e);
                    let retryable = retry::is_retryable(&e);
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SubmissionError::Http {
            url: self.config.url.clone(),
            message: "no attempt was made".to_string(),
            status_code: None,
        }))
    }

    async fn send_once(&self, body: Vec<u8>) -> Result<(u16, serde_json::Value), SubmissionError> {
        let url = &self.config.url;
        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(SubmissionError::Http {
                url: url.clone(),
                message: format!("HTTP {}: {}", status.as_u16(), text.trim()),
                status_code: Some(status.as_u16()),
            });
        }

        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        Ok((status.as_u16(), body))
    }

    fn transport_error(&self, e: reqwest::Error) -> SubmissionError {
        if e.is_timeout() {
            SubmissionError::Timeout {
                url: self.config.url.clone(),
                timeout_ms: self.config.timeout_ms,
            }
        } else if e.is_connect() || e.is_request() {
            SubmissionError::Connect {
                url: self.config.url.clone(),
                message: e.to_string(),
            }
        } else {
            SubmissionError::Http {
                url: self.config.url.clone(),
                message: format!("request failed: {e}"),
                status_code: e.status().map(|s| s.as_u16()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::ResultsBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response per connection, in order.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{addr}/results/"), hits)
    }

    /// Read headers and the declared body so the client never sees a reset.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn config(url: String) -> SubmissionConfig {
        SubmissionConfig {
            url,
            group_name: "test".to_string(),
            timeout_ms: 5_000,
            retry_attempts: 2,
            retry_delay_ms: 10,
        }
    }

    fn submission() -> Submission {
        let mut builder = ResultsBuilder::new();
        builder.add("q.jpg", vec!["g.jpg".to_string()]);
        builder.finish("test")
    }

    #[test]
    fn test_receipt_accuracy_field() {
        let receipt = |body| SubmissionReceipt {
            status: 200,
            body,
            attempts: 1,
        };
        assert_eq!(
            receipt(serde_json::json!({"results": 0.42})).accuracy(),
            Some(0.42)
        );
        assert_eq!(
            receipt(serde_json::json!({"accuracy": "0.5"})).accuracy(),
            Some(0.5)
        );
        assert_eq!(receipt(serde_json::json!("ok")).accuracy(), None);
    }

    #[tokio::test]
    async fn test_submit_retries_server_errors() {
        let (url, hits) = serve(vec![(503, "busy"), (200, r#"{"results": 0.75}"#)]).await;
        let client = SubmissionClient::new(config(url));

        let receipt = client.submit(&submission()).await.unwrap();
        assert_eq!(receipt.status, 200);
        assert_eq!(receipt.attempts, 2);
        assert_eq!(receipt.accuracy(), Some(0.75));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_submit_gives_up_on_client_errors() {
        let (url, hits) = serve(vec![(400, "bad group")]).await;
        let client = SubmissionClient::new(config(url));

        let err = client.submit(&submission()).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Http {
                status_code: Some(400),
                ..
            }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_retries_refused_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = config(format!("http://{addr}/results/"));
        config.retry_delay_ms = 50;
        let client = SubmissionClient::new(config);

        let start = std::time::Instant::now();
        let err = client.submit(&submission()).await.unwrap_err();

        assert!(matches!(err, SubmissionError::Connect { .. }), "{err:?}");
        // two backoffs: 50ms then 100ms
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}

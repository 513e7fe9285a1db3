//! Solver backed by a remote OCR endpoint.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;

use super::error::SolverError;
use super::traits::Solver;

#[derive(Debug, Serialize)]
struct ClassifyRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    text: String,
}

/// Posts `{"image": "<base64 png>"}` and reads `{"text": "..."}` back.
pub struct HttpSolver {
    client: reqwest::Client,
    url: String,
}

impl HttpSolver {
    pub fn new(config: &SolverConfig) -> Result<Self, SolverError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SolverError::Service(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Solver for HttpSolver {
    fn name(&self) -> &str {
        "http"
    }

    async fn classify(&self, png: &[u8]) -> Result<String, SolverError> {
        let request = ClassifyRequest {
            image: STANDARD.encode(png),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SolverError::Service(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(SolverError::Service(format!("status {}: {}", status, body)));
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| SolverError::Service(format!("invalid response: {}", e)))?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one request with a canned response and hands back the request body.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "{}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8_lossy(&buf[header_end..header_end + length]).to_string()
        });

        (format!("http://{}/ocr", addr), handle)
    }

    fn solver_for(url: String) -> HttpSolver {
        HttpSolver::new(&SolverConfig {
            url,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_classify_posts_base64_image() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"text":"ab12"}"#).await;
        let solver = solver_for(url);

        let text = solver.classify(b"png-bytes").await.unwrap();
        assert_eq!(text, "ab12");

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["image"], STANDARD.encode(b"png-bytes"));
    }

    #[tokio::test]
    async fn test_classify_reports_service_status() {
        let (url, server) =
            serve_once("HTTP/1.1 503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let solver = solver_for(url);

        let result = solver.classify(b"png-bytes").await;
        match result {
            Err(SolverError::Service(message)) => assert!(message.contains("503")),
            other => panic!("expected service error, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_classify_rejects_unexpected_body() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"answer":"ab12"}"#).await;
        let solver = solver_for(url);

        assert!(matches!(
            solver.classify(b"png-bytes").await,
            Err(SolverError::Service(_))
        ));
        server.await.unwrap();
    }
}

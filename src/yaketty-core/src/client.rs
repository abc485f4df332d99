//! Ollama chat API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::YakettyError;
use crate::options::ModelOptions;

pub const DEFAULT_HOST: &str = "http://127.0.0.1:11434";
const DEFAULT_HTTP_PORT: u16 = 11434;
const DEFAULT_HTTPS_PORT: u16 = 443;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: ModelOptions,
}

/// Non-streaming response of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: String,
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Something that can answer a chat request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, YakettyError>;
}

/// HTTP client for a running Ollama server.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: Url,
    max_attempts: u32,
    backoff: Duration,
}

impl OllamaClient {
    /// Create a client for `host` (see [`parse_host`]).
    pub fn new(host: &str) -> Result<Self, YakettyError> {
        let base_url = parse_host(host)?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Create a client from `OLLAMA_HOST`, defaulting to the local server.
    pub fn from_env() -> Result<Self, YakettyError> {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_default();
        Self::new(&host)
    }

    /// Set how many times a transient failure is attempted in total.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the delay before the first retry; each later retry doubles it.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, YakettyError> {
        let url = self.base_url.join("api/chat").map_err(|e| YakettyError::InvalidHost {
            host: self.base_url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(YakettyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<ChatResponse>().await?)
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    /// Send a chat request, retrying transient failures with exponential
    /// backoff (1s, 2s, 4s, ... by default).
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, YakettyError> {
        let mut attempt = 0;
        loop {
            match self.send(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff * (1 << attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        ?delay,
                        "chat request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Normalize an `OLLAMA_HOST` value into a base URL.
///
/// Empty means the local default. A missing scheme means `http`. A missing
/// port means 11434 for `http` and 443 for `https`.
pub fn parse_host(host: &str) -> Result<Url, YakettyError> {
    let host = host.trim();
    if host.is_empty() {
        return parse_url(DEFAULT_HOST);
    }

    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };

    let mut url = parse_url(&with_scheme)?;
    if url.port().is_none() && !has_explicit_port(&with_scheme) {
        let port = match url.scheme() {
            "https" => DEFAULT_HTTPS_PORT,
            _ => DEFAULT_HTTP_PORT,
        };
        url.set_port(Some(port)).map_err(|_| YakettyError::InvalidHost {
            host: host.to_string(),
            reason: "cannot carry a port".to_string(),
        })?;
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    debug!(url = %url, "resolved Ollama host");
    Ok(url)
}

/// `Url` drops a port equal to the scheme default, so check the text.
fn has_explicit_port(raw: &str) -> bool {
    let authority = raw
        .split_once("://")
        .map_or(raw, |(_, rest)| rest)
        .split('/')
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    match host_port.rsplit_once(':') {
        Some((host, port)) => {
            (!host.contains(':') || host.ends_with(']'))
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn parse_url(raw: &str) -> Result<Url, YakettyError> {
    Url::parse(raw).map_err(|e| YakettyError::InvalidHost {
        host: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve every connection with the same canned response and count them.
    async fn canned_server(
        status: &'static str,
        body: &'static str,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    /// Read headers and a `Content-Length` body off the socket.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn hello_request() -> ChatRequest {
        ChatRequest {
            model: "gemma3".to_string(),
            messages: vec![ChatMessage::new(Role::User, "Hello")],
            stream: false,
            options: ModelOptions::defaults(),
        }
    }

    #[test]
    fn test_parse_host_default() {
        let url = parse_host("").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:11434/");
    }

    #[test]
    fn test_parse_host_bare_host_and_port() {
        assert_eq!(
            parse_host("gpu-box:8080").unwrap().as_str(),
            "http://gpu-box:8080/"
        );
        assert_eq!(parse_host("gpu-box").unwrap().as_str(), "http://gpu-box:11434/");
    }

    #[test]
    fn test_parse_host_explicit_default_port() {
        let url = parse_host("http://gpu-box:80").unwrap();
        assert_eq!(url.port_or_known_default(), Some(80));
    }

    #[test]
    fn test_parse_host_https_default_port() {
        let url = parse_host("https://ollama.example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.port_or_known_default(), Some(443));
    }

    #[test]
    fn test_parse_host_keeps_path_prefix() {
        let url = parse_host("http://proxy:9000/ollama").unwrap();
        assert_eq!(
            url.join("api/chat").unwrap().as_str(),
            "http://proxy:9000/ollama/api/chat"
        );
    }

    #[tokio::test]
    async fn test_chat_success() {
        let (host, hits) = canned_server(
            "200 OK",
            r#"{"model":"gemma3","message":{"role":"assistant","content":"Hi there."},"done":true}"#,
        )
        .await;
        let client = OllamaClient::new(&host).unwrap();

        let response = client.chat(&hello_request()).await.unwrap();

        assert_eq!(response.message.content, "Hi there.");
        assert!(response.done);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chat_retries_server_errors() {
        let (host, hits) =
            canned_server("503 Service Unavailable", r#"{"error":"model is loading"}"#).await;
        let client = OllamaClient::new(&host)
            .unwrap()
            .with_max_attempts(3)
            .with_backoff(Duration::from_millis(1));

        let err = client.chat(&hello_request()).await.unwrap_err();

        match err {
            YakettyError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "model is loading");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_chat_client_error_not_retried() {
        let (host, hits) =
            canned_server("404 Not Found", r#"{"error":"model 'nope' not found"}"#).await;
        let client = OllamaClient::new(&host)
            .unwrap()
            .with_backoff(Duration::from_millis(1));

        let err = client.chat(&hello_request()).await.unwrap_err();

        match err {
            YakettyError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model 'nope' not found");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chat_error_without_json_body() {
        let (host, _) = canned_server("400 Bad Request", "bad request").await;
        let client = OllamaClient::new(&host).unwrap();

        let err = client.chat(&hello_request()).await.unwrap_err();

        match err {
            YakettyError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad request");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_request_wire_format() {
        let request = ChatRequest {
            model: "gemma3".to_string(),
            messages: vec![
                ChatMessage::system("Be a pirate."),
                ChatMessage::new(Role::User, "Ahoy"),
            ],
            stream: false,
            options: ModelOptions {
                temperature: Some(0.5),
                ..Default::default()
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gemma3",
                "messages": [
                    { "role": "system", "content": "Be a pirate." },
                    { "role": "user", "content": "Ahoy" }
                ],
                "stream": false,
                "options": { "temperature": 0.5 }
            })
        );
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "model": "gemma3",
            "created_at": "2025-06-01T12:00:00Z",
            "message": { "role": "assistant", "content": "Arr, welcome aboard!" },
            "done": true,
            "done_reason": "stop",
            "total_duration": 123456
        }"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.content, "Arr, welcome aboard!");
        assert_eq!(response.done_reason.as_deref(), Some("stop"));
    }
}

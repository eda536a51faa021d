//! Completion client abstraction for the generator and reviewer roles.
//!
//! The [`CompletionClient`] trait decouples the cycle from the inference
//! backend. A call is a single attempt: retry policy belongs to the cycle.
//! Tests use scripted clients that return predetermined responses.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::parse::strip_reasoning;
use crate::error::{BackendError, ConfigError};
use crate::io::config::BackendConfig;

/// Role framing for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleConfig {
    pub system_prompt: String,
    pub temperature: f64,
}

/// Abstraction over text-completion backends.
pub trait CompletionClient {
    /// Send one request and return the generated text.
    fn complete(&self, role: &RoleConfig, user_content: &str) -> Result<String, BackendError>;
}

/// Client for OpenAI-compatible chat completion servers (LM Studio, Ollama, ...).
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiClient {
    /// Build a client for an already-resolved model id.
    pub fn new(backend: &BackendConfig, model: impl Into<String>) -> Result<Self, ConfigError> {
        let http = build_http(Duration::from_secs(backend.request_timeout_secs))?;
        let api_key = std::env::var(&backend.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Ok(Self {
            http,
            base_url: trim_base_url(&backend.base_url),
            model: model.into(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl CompletionClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, temperature = role.temperature))]
    fn complete(&self, role: &RoleConfig, user_content: &str) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &role.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: role.temperature,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "completion request failed");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json()?;
        let raw = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(BackendError::Empty)?;
        let text = strip_reasoning(&raw);
        if text.is_empty() {
            return Err(BackendError::Empty);
        }
        debug!(bytes = text.len(), "completion received");
        Ok(text)
    }
}

/// List model ids currently served at `base_url` (`GET {base_url}/models`).
#[instrument(skip_all, fields(base_url = %base_url))]
pub fn list_models(base_url: &str, timeout: Duration) -> Result<Vec<String>, BackendError> {
    let http = build_http(timeout).map_err(|err| BackendError::Transport(err.to_string()))?;
    let url = format!("{}/models", trim_base_url(base_url));
    let response = http.get(&url).send()?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let list: ModelList = response.json()?;
    let ids: Vec<String> = list.data.into_iter().map(|entry| entry.id).collect();
    debug!(count = ids.len(), "models listed");
    Ok(ids)
}

/// Return the configured model, or the first model the server reports.
pub fn resolve_model(backend: &BackendConfig) -> Result<String, ConfigError> {
    if !backend.model.trim().is_empty() {
        return Ok(backend.model.clone());
    }
    let no_model = |reason: String| ConfigError::NoModel {
        base_url: backend.base_url.clone(),
        reason,
    };
    let models = list_models(&backend.base_url, Duration::from_secs(10))
        .map_err(|err| no_model(err.to_string()))?;
    models
        .into_iter()
        .next()
        .ok_or_else(|| no_model("server reported no models".to_string()))
}

fn build_http(timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| ConfigError::HttpClient(err.to_string()))
}

fn trim_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve exactly one HTTP request with a canned response; return the raw request.
    fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read header");
                if let Some(value) = line
                    .to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .map(|v| v.trim().to_string())
                {
                    content_length = value.parse().expect("content length");
                }
                let done = line == "\r\n";
                head.push_str(&line);
                if done {
                    break;
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).expect("read body");
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).expect("write");
            stream.flush().expect("flush");
            format!("{head}{}", String::from_utf8_lossy(&body))
        });
        (format!("http://{addr}/v1"), handle)
    }

    fn backend(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            api_key_env: "THINKTANK_TEST_UNSET_KEY".to_string(),
            request_timeout_secs: 5,
            ..BackendConfig::default()
        }
    }

    fn role() -> RoleConfig {
        RoleConfig {
            system_prompt: "be terse".to_string(),
            temperature: 0.2,
        }
    }

    #[test]
    fn complete_returns_stripped_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"<think>hm</think>DECISION: ACCEPT"}}]}"#;
        let (base_url, server) = serve_once("200 OK", body);
        let client = OpenAiClient::new(&backend(&base_url), "local-model").expect("client");

        let text = client.complete(&role(), "is it novel?").expect("complete");
        assert_eq!(text, "DECISION: ACCEPT");

        let request = server.join().expect("server");
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.contains("\"model\":\"local-model\""));
        assert!(request.contains("\"content\":\"be terse\""));
        assert!(request.contains("\"content\":\"is it novel?\""));
    }

    #[test]
    fn non_success_status_is_a_status_error() {
        let (base_url, server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let client = OpenAiClient::new(&backend(&base_url), "m").expect("client");

        let err = client.complete(&role(), "x").unwrap_err();
        assert!(
            matches!(err, BackendError::Status { status: 500, ref body } if body.contains("boom"))
        );
        server.join().expect("server");
    }

    #[test]
    fn empty_choices_is_an_empty_error() {
        let (base_url, server) = serve_once("200 OK", r#"{"choices":[]}"#);
        let client = OpenAiClient::new(&backend(&base_url), "m").expect("client");

        assert!(matches!(
            client.complete(&role(), "x").unwrap_err(),
            BackendError::Empty
        ));
        server.join().expect("server");
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let client =
            OpenAiClient::new(&backend(&format!("http://{addr}/v1")), "m").expect("client");

        assert!(matches!(
            client.complete(&role(), "x").unwrap_err(),
            BackendError::Transport(_)
        ));
    }

    #[test]
    fn list_models_reads_ids() {
        let (base_url, server) = serve_once("200 OK", r#"{"data":[{"id":"a"},{"id":"b"}]}"#);
        let models = list_models(&format!("{base_url}/"), Duration::from_secs(5)).expect("models");
        assert_eq!(models, vec!["a", "b"]);
        let request = server.join().expect("server");
        assert!(request.starts_with("GET /v1/models"));
    }

    #[test]
    fn resolve_model_prefers_configured_id() {
        let mut cfg = backend("http://127.0.0.1:9/v1");
        cfg.model = "pinned".to_string();
        assert_eq!(resolve_model(&cfg).expect("model"), "pinned");
    }
}

//! Generative provider abstraction.
//!
//! The [`Provider`] trait decouples the role agents from the actual model
//! backend. Two backends ship: the Anthropic Messages API over blocking HTTP,
//! and an arbitrary command that reads the prompt on stdin. Tests use scripted
//! providers that return queued responses per role.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::io::config::{ConfigError, Credentials, ProviderConfig, ProviderKind};
use crate::io::process::run_command_with_timeout;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Pipeline role a provider call is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Design,
    Copy,
    Audit,
    Review,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Design => "design",
            Role::Copy => "copy",
            Role::Audit => "audit",
            Role::Review => "review",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image attached to a provider request, already base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub media_type: &'static str,
    pub data_base64: String,
}

/// Parameters for one provider call.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub role: Role,
    pub prompt: String,
    pub images: Vec<ReferenceImage>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Abstraction over generative backends.
pub trait Provider {
    /// Return the raw text response. Structure is not validated here.
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

impl<P: Provider + ?Sized> Provider for &P {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        (**self).generate(request)
    }
}

/// Failures a caller may want to tell apart from plain I/O errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider command exited with {code:?}: {stderr}")]
    Command { code: Option<i32>, stderr: String },
    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// Anthropic Messages API over blocking HTTP.
pub struct AnthropicProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: endpoint.into(),
        })
    }

    fn request_body(&self, request: &GenerateRequest) -> Value {
        let mut content: Vec<Value> = request
            .images
            .iter()
            .map(|image| {
                json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.media_type,
                        "data": image.data_base64,
                    }
                })
            })
            .collect();
        content.push(json!({ "type": "text", "text": request.prompt }));
        json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": [{ "role": "user", "content": content }],
        })
    }
}

/// Concatenate the text blocks of a Messages API response.
pub fn response_text(body: &Value) -> Option<String> {
    let text: String = body["content"]
        .as_array()?
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.trim().is_empty()).then_some(text)
}

impl Provider for AnthropicProvider {
    #[instrument(skip_all, fields(role = %request.role, model = %self.model, images = request.images.len()))]
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        debug!(prompt_bytes = request.prompt.len(), "sending messages request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(request.timeout)
            .json(&self.request_body(request))
            .send();
        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                warn!(timeout_secs = request.timeout.as_secs(), "provider timed out");
                return Err(ProviderError::Timeout(request.timeout).into());
            }
            Err(err) => return Err(err).context("send provider request"),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "provider returned an error status");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body: Value = response.json().context("decode provider response")?;
        let text = response_text(&body).ok_or(ProviderError::EmptyResponse)?;
        info!(response_bytes = text.len(), "provider responded");
        Ok(text)
    }
}

/// Provider that runs a local command: prompt on stdin, response on stdout.
///
/// Reference images are listed by path at the end of the prompt.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    argv: Vec<String>,
    output_limit_bytes: usize,
}

impl CommandProvider {
    pub fn new(argv: Vec<String>, output_limit_bytes: usize) -> Result<Self> {
        if argv.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(anyhow!("provider.command must be a non-empty array"));
        }
        Ok(Self {
            argv,
            output_limit_bytes,
        })
    }

    fn stdin_for(request: &GenerateRequest) -> String {
        if request.images.is_empty() {
            return request.prompt.clone();
        }
        let mut buf = request.prompt.clone();
        buf.push_str("\n\nReference images:\n");
        for image in &request.images {
            buf.push_str(&format!("- {}\n", image.path.display()));
        }
        buf
    }
}

impl Provider for CommandProvider {
    #[instrument(skip_all, fields(role = %request.role, program = %self.argv[0]))]
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]).env("POSTFLOW_ROLE", request.role.as_str());
        let stdin = Self::stdin_for(request);
        let output = run_command_with_timeout(
            cmd,
            Some(stdin.as_bytes()),
            request.timeout,
            self.output_limit_bytes,
        )
        .context("run provider command")?;

        if output.timed_out {
            return Err(ProviderError::Timeout(request.timeout).into());
        }
        if !output.succeeded() {
            return Err(ProviderError::Command {
                code: output.status.code(),
                stderr: output.stderr_summary(),
            }
            .into());
        }
        let text = output.stdout_text();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse.into());
        }
        Ok(text)
    }
}

/// Provider selected by configuration.
pub enum ConfiguredProvider {
    Anthropic(AnthropicProvider),
    Command(CommandProvider),
}

impl ConfiguredProvider {
    /// Build the configured backend, failing fast on missing credentials.
    pub fn from_config(config: &ProviderConfig, credentials: &Credentials) -> Result<Self> {
        match config.kind {
            ProviderKind::Anthropic => {
                let api_key = credentials.anthropic_api_key()?;
                Ok(Self::Anthropic(AnthropicProvider::new(
                    api_key,
                    &config.model,
                    &config.endpoint,
                )?))
            }
            ProviderKind::Command => {
                if config.command.is_empty() {
                    return Err(ConfigError::Missing {
                        field: "provider.command",
                    }
                    .into());
                }
                Ok(Self::Command(CommandProvider::new(
                    config.command.clone(),
                    config.output_limit_bytes,
                )?))
            }
        }
    }
}

impl Provider for ConfiguredProvider {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        match self {
            ConfiguredProvider::Anthropic(provider) => provider.generate(request),
            ConfiguredProvider::Command(provider) => provider.generate(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            role: Role::Copy,
            prompt: prompt.to_string(),
            images: Vec::new(),
            max_tokens: 2048,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn response_text_joins_text_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "1}"}
            ]
        });
        assert_eq!(response_text(&body).as_deref(), Some("{\"a\":\n1}"));
        assert_eq!(response_text(&json!({"content": []})), None);
    }

    #[test]
    fn anthropic_body_puts_images_before_text() {
        let provider =
            AnthropicProvider::new("key", "claude-sonnet-4-20250514", "http://localhost:9")
                .expect("provider");
        let mut req = request("make a post");
        req.images.push(ReferenceImage {
            path: PathBuf::from("ref.png"),
            media_type: "image/png",
            data_base64: "AAAA".to_string(),
        });
        let body = provider.request_body(&req);
        assert_eq!(body["max_tokens"], 2048);
        let content = body["messages"][0]["content"].as_array().expect("content");
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[1]["text"], "make a post");
    }

    #[test]
    fn command_provider_rejects_empty_argv() {
        assert!(CommandProvider::new(Vec::new(), 1024).is_err());
        assert!(CommandProvider::new(vec![" ".to_string()], 1024).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_provider_echoes_stdin() {
        let provider = CommandProvider::new(vec!["cat".to_string()], 4096).expect("provider");
        let text = provider.generate(&request("hello")).expect("generate");
        assert_eq!(text, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn command_provider_surfaces_exit_code() {
        let provider = CommandProvider::new(
            vec!["sh".to_string(), "-c".to_string(), "echo nope >&2; exit 4".to_string()],
            4096,
        )
        .expect("provider");
        let err = provider.generate(&request("x")).unwrap_err();
        match err.downcast_ref::<ProviderError>() {
            Some(ProviderError::Command { code, stderr }) => {
                assert_eq!(*code, Some(4));
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn anthropic_requires_api_key() {
        let config = ProviderConfig::default();
        let credentials = Credentials::from_lookup(|_| None);
        let err = ConfiguredProvider::from_config(&config, &credentials)
            .err()
            .expect("missing key");
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Missing { field: "ANTHROPIC_API_KEY" })
        ));
    }
}

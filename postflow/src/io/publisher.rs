//! Publishing approved posts through the Publer API.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::core::platform::Platform;
use crate::io::config::{ConfigError, Credentials, PublisherConfig};

#[derive(Debug, Clone)]
pub struct ScheduleRequest<'a> {
    pub platform: Platform,
    pub image_path: &'a Path,
    pub caption: &'a str,
    /// `None` publishes immediately.
    pub when: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleReceipt {
    pub id: String,
    pub status: String,
    /// RFC 3339 timestamp, or `now` for immediate posts.
    pub scheduled_at: String,
}

pub trait Publisher {
    /// Upload the image, then create the post. Returns the service's receipt.
    fn schedule(&self, request: &ScheduleRequest<'_>) -> Result<ScheduleReceipt>;
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publisher returned HTTP {status} during {operation}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },
    #[error("publisher response to {0} is missing an id")]
    MissingId(&'static str),
}

/// A social account connected to the Publer workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublerAccount {
    pub id: String,
    pub platform: String,
    pub name: String,
}

/// A post waiting in the Publer queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedPost {
    pub id: String,
    pub status: String,
    pub scheduled_at: Option<String>,
    pub text: String,
}

/// Publer v1 client.
pub struct PublerPublisher {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    instagram_account_id: Option<String>,
    linkedin_account_id: Option<String>,
}

impl PublerPublisher {
    /// Build the client. Fails fast when the API key is not configured;
    /// account ids are checked per platform when scheduling.
    pub fn from_credentials(config: &PublisherConfig, credentials: &Credentials) -> Result<Self> {
        let api_key = credentials.publer_api_key()?.to_string();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            instagram_account_id: credentials.instagram_account_id().ok().map(str::to_string),
            linkedin_account_id: credentials.linkedin_account_id().ok().map(str::to_string),
        })
    }

    fn account_id(&self, platform: Platform) -> Result<&str> {
        let (value, field) = match platform {
            Platform::Instagram => (&self.instagram_account_id, "INSTAGRAM_ACCOUNT_ID"),
            Platform::LinkedIn => (&self.linkedin_account_id, "LINKEDIN_ACCOUNT_ID"),
        };
        value
            .as_deref()
            .ok_or_else(|| ConfigError::Missing { field }.into())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn post_json(&self, operation: &'static str, path: &str, body: &Value) -> Result<Value> {
        self.send(operation, self.client.post(self.url(path)).json(body))
    }

    fn send(
        &self,
        operation: &'static str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Value> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .with_context(|| format!("send {operation} request"))?;
        let status = response.status();
        let payload: Value = response.json().unwrap_or(Value::Null);
        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "publisher request failed");
            return Err(PublishError::Api {
                operation,
                status: status.as_u16(),
                message: error_message(&payload),
            }
            .into());
        }
        Ok(payload)
    }

    /// Upload an image as a base64 data URI and return its media id.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn upload_media(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        let payload = self.post_json("media upload", "media", &media_upload_body(path, &bytes))?;
        let id = response_id(&payload).ok_or(PublishError::MissingId("media upload"))?;
        info!(media_id = %id, "uploaded media");
        Ok(id)
    }

    /// Accounts connected to the workspace; their ids go into
    /// `INSTAGRAM_ACCOUNT_ID` and `LINKEDIN_ACCOUNT_ID`.
    #[instrument(skip_all)]
    pub fn accounts(&self) -> Result<Vec<PublerAccount>> {
        let payload = self.send("account listing", self.client.get(self.url("accounts")))?;
        Ok(accounts_from_response(&payload))
    }

    #[instrument(skip_all)]
    pub fn scheduled_posts(&self) -> Result<Vec<QueuedPost>> {
        let request = self
            .client
            .get(self.url("posts"))
            .query(&[("status", "scheduled")]);
        let payload = self.send("scheduled post listing", request)?;
        Ok(queued_posts_from_response(&payload))
    }

    /// Remove a scheduled post from the queue.
    #[instrument(skip_all, fields(post_id = %post_id))]
    pub fn delete_post(&self, post_id: &str) -> Result<()> {
        let path = format!("posts/{post_id}");
        self.send("post deletion", self.client.delete(self.url(&path)))?;
        info!("post deleted");
        Ok(())
    }
}

/// Items of a list response, either a bare array or wrapped in `key`.
fn list_items<'a>(payload: &'a Value, key: &str) -> &'a [Value] {
    payload
        .as_array()
        .or_else(|| payload[key].as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn text_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| item[*key].as_str().filter(|value| !value.is_empty()))
        .map(str::to_string)
}

/// Accounts with an id; the name falls back to the username.
pub fn accounts_from_response(payload: &Value) -> Vec<PublerAccount> {
    list_items(payload, "accounts")
        .iter()
        .filter_map(|item| {
            Some(PublerAccount {
                id: response_id(item)?,
                platform: text_field(item, &["platform", "provider", "type"]).unwrap_or_default(),
                name: text_field(item, &["name", "username"]).unwrap_or_default(),
            })
        })
        .collect()
}

pub fn queued_posts_from_response(payload: &Value) -> Vec<QueuedPost> {
    list_items(payload, "posts")
        .iter()
        .filter_map(|item| {
            Some(QueuedPost {
                id: response_id(item)?,
                status: text_field(item, &["status", "state"])
                    .unwrap_or_else(|| "scheduled".to_string()),
                scheduled_at: text_field(item, &["scheduled_at"]),
                text: text_field(item, &["text"]).unwrap_or_default(),
            })
        })
        .collect()
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

fn media_upload_body(path: &Path, bytes: &[u8]) -> Value {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    json!({
        "file": format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes)),
        "filename": filename,
    })
}

/// Body of the create-post call: scheduled when `when` is set, otherwise posted now.
pub fn post_body(
    account_id: &str,
    caption: &str,
    media_ids: &[String],
    when: Option<DateTime<Utc>>,
) -> Value {
    let mut body = json!({
        "account_ids": [account_id],
        "text": caption,
        "media_ids": media_ids,
    });
    match when {
        Some(at) => body["scheduled_at"] = json!(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => body["post_now"] = json!(true),
    }
    body
}

fn response_id(payload: &Value) -> Option<String> {
    match &payload["id"] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn error_message(payload: &Value) -> String {
    payload["error"]
        .as_str()
        .or_else(|| payload["message"].as_str())
        .map_or_else(|| payload.to_string(), str::to_string)
}

impl Publisher for PublerPublisher {
    #[instrument(skip_all, fields(platform = %request.platform, scheduled = request.when.is_some()))]
    fn schedule(&self, request: &ScheduleRequest<'_>) -> Result<ScheduleReceipt> {
        let account_id = self.account_id(request.platform)?;
        let media_id = self.upload_media(request.image_path)?;
        let body = post_body(account_id, request.caption, &[media_id], request.when);
        let payload = self.post_json("post creation", "posts", &body)?;

        let receipt = ScheduleReceipt {
            id: response_id(&payload).ok_or(PublishError::MissingId("post creation"))?,
            status: payload["status"].as_str().unwrap_or("unknown").to_string(),
            scheduled_at: request.when.map_or_else(
                || "now".to_string(),
                |at| at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        };
        info!(post_id = %receipt.id, status = %receipt.status, "post scheduled");
        Ok(receipt)
    }
}

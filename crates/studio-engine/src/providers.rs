use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::config::{GeminiSettings, OpenAiSettings};

/// Upstream calls wait as long as the provider takes; reqwest's blocking
/// client would otherwise give up after 30 seconds.
pub const UPSTREAM_TIMEOUT: Option<Duration> = None;

fn http_client(timeout: Option<Duration>) -> Result<HttpClient> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Raw upstream answer. Non-success statuses are returned, not raised, so the
/// caller decides how much of them a client gets to see.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub status_code: u16,
    pub payload: Value,
    pub body: String,
}

impl ProviderReply {
    pub fn ok(payload: Value) -> Self {
        Self {
            status_code: 200,
            body: payload.to_string(),
            payload,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEditRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
    pub n: u32,
    pub image_png: Vec<u8>,
    pub mask_png: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub turns: Vec<ChatTurn>,
}

pub trait ImageEditProvider: Send + Sync {
    fn name(&self) -> &str;
    fn is_configured(&self) -> bool;
    fn edit(&self, request: &ImageEditRequest) -> Result<ProviderReply>;
}

pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;
    fn is_configured(&self) -> bool;
    fn generate(&self, request: &ChatRequest) -> Result<ProviderReply>;
}

impl<P: ImageEditProvider + ?Sized> ImageEditProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }

    fn edit(&self, request: &ImageEditRequest) -> Result<ProviderReply> {
        (**self).edit(request)
    }
}

impl<P: ChatProvider + ?Sized> ChatProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }

    fn generate(&self, request: &ChatRequest) -> Result<ProviderReply> {
        (**self).generate(request)
    }
}

pub struct OpenAiImageProvider {
    api_base: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
    http: HttpClient,
}

impl OpenAiImageProvider {
    pub fn new(settings: &OpenAiSettings) -> Result<Self> {
        Ok(Self {
            api_base: settings.api_base.clone(),
            api_key: settings.api_key.clone(),
            timeout: UPSTREAM_TIMEOUT,
            http: http_client(UPSTREAM_TIMEOUT)?,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn endpoint(&self) -> String {
        format!("{}/images/edits", self.api_base)
    }

    fn build_form(request: &ImageEditRequest) -> Result<MultipartForm> {
        let mut form = MultipartForm::new()
            .text("model", request.model.clone())
            .text("prompt", request.prompt.clone())
            .text("n", request.n.max(1).to_string())
            .text("size", request.size.clone());
        // gpt-image models always answer with base64 and reject this field.
        if !is_openai_gpt_image_model(&request.model) {
            form = form.text("response_format", "url");
        }

        let image = MultipartPart::bytes(request.image_png.clone())
            .file_name("image.png")
            .mime_str("image/png")
            .context("invalid mime for edit image")?;
        let mask = MultipartPart::bytes(request.mask_png.clone())
            .file_name("mask.png")
            .mime_str("image/png")
            .context("invalid mime for edit mask")?;
        Ok(form.part("image", image).part("mask", mask))
    }
}

impl ImageEditProvider for OpenAiImageProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn edit(&self, request: &ImageEditRequest) -> Result<ProviderReply> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("OPENAI_API_KEY or OPENAI_API_KEY_BACKUP not set");
        };
        let endpoint = self.endpoint();
        let form = Self::build_form(request)?;
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .with_context(|| format!("OpenAI edits request failed ({endpoint})"))?;
        read_reply("OpenAI edits", response)
    }
}

pub struct GeminiChatProvider {
    api_base: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
    http: HttpClient,
}

impl GeminiChatProvider {
    pub fn new(settings: &GeminiSettings) -> Result<Self> {
        Ok(Self {
            api_base: settings.api_base.clone(),
            api_key: settings.api_key.clone(),
            timeout: UPSTREAM_TIMEOUT,
            http: http_client(UPSTREAM_TIMEOUT)?,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(request: &ChatRequest) -> Value {
        let contents: Vec<Value> = request
            .turns
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role,
                    "parts": [{ "text": turn.text }],
                })
            })
            .collect();
        json!({ "contents": contents })
    }
}

impl ChatProvider for GeminiChatProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate(&self, request: &ChatRequest) -> Result<ProviderReply> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(&request.model);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&Self::build_payload(request))
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        read_reply("Gemini", response)
    }
}

fn read_reply(provider: &str, response: HttpResponse) -> Result<ProviderReply> {
    let status_code = response.status().as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    let payload = match serde_json::from_str::<Value>(&body) {
        Ok(parsed) => parsed,
        Err(_) if !(200..300).contains(&status_code) => Value::Null,
        Err(err) => {
            return Err(err).with_context(|| format!("{provider} returned invalid JSON payload"))
        }
    };
    Ok(ProviderReply {
        status_code,
        payload,
        body,
    })
}

fn is_openai_gpt_image_model(model: &str) -> bool {
    model.trim().to_ascii_lowercase().starts_with("gpt-image")
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

use anyhow::{bail, Result};
use serde_json::Value;
use studio_contracts::errors::RelayError;
use studio_contracts::operations::{EditCommand, EditForm, EditResponse, Operation};

use crate::config::EngineConfig;
use crate::error_chain_text;
use crate::imaging::{self, CANVAS_SIZE};
use crate::providers::{
    truncate_text, ImageEditProvider, ImageEditRequest, OpenAiImageProvider, ProviderReply,
};

pub const EDIT_SIZE: &str = "1024x1024";
pub const EDIT_COUNT: u32 = 1;

/// Runs one edit operation: validate, build canvas and mask, one upstream call.
pub struct EditDispatcher {
    provider: Box<dyn ImageEditProvider>,
    model: String,
}

impl EditDispatcher {
    pub fn new<P: ImageEditProvider + 'static>(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider: Box::new(provider),
            model: model.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(
            OpenAiImageProvider::new(&config.openai)?,
            config.openai.image_model.clone(),
        ))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dispatch(
        &self,
        operation: Operation,
        form: EditForm,
    ) -> Result<EditResponse, RelayError> {
        let spec = operation.spec();
        let (image_bytes, command) = form.into_command(operation)?;
        if !self.provider.is_configured() {
            return Err(RelayError::Configuration(
                "OPENAI_API_KEY is not configured on the server.".to_string(),
            ));
        }

        let request = self.prepare(&image_bytes, &command)?;
        tracing::info!(
            operation = spec.id,
            provider = self.provider.name(),
            model = %self.model,
            upload_bytes = image_bytes.len(),
            "dispatching image edit"
        );

        let outcome = self
            .provider
            .edit(&request)
            .and_then(|reply| extract_result_url(&reply));
        match outcome {
            Ok(url) => Ok(EditResponse {
                image: url,
                message: spec.success_message.to_string(),
            }),
            Err(err) => {
                tracing::error!(
                    operation = spec.id,
                    provider = self.provider.name(),
                    error = %error_chain_text(&err, 1024),
                    "image edit failed"
                );
                Err(RelayError::Upstream(spec.failure_message.to_string()))
            }
        }
    }

    /// Build the provider request for an already validated command.
    pub fn prepare(
        &self,
        image_bytes: &[u8],
        command: &EditCommand,
    ) -> Result<ImageEditRequest, RelayError> {
        let spec = command.operation().spec();
        let source = imaging::decode_image(image_bytes).map_err(|err| {
            tracing::warn!(
                operation = spec.id,
                error = %error_chain_text(&err, 256),
                "rejected undecodable upload"
            );
            RelayError::InvalidImage("Uploaded file is not a supported image".to_string())
        })?;

        let canvas = imaging::normalize(&source, spec.normalizer);
        let mask = imaging::make_mask(imaging::keep_region(spec.mask));
        debug_assert_eq!(canvas.image.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
        debug_assert_eq!(mask.dimensions(), canvas.image.dimensions());

        let encode = |image: &image::RgbaImage| {
            imaging::encode_png(image).map_err(|err| {
                tracing::error!(error = %error_chain_text(&err, 256), "PNG encoding failed");
                RelayError::Unexpected(spec.failure_message.to_string())
            })
        };
        Ok(ImageEditRequest {
            model: self.model.clone(),
            prompt: command.instruction(),
            size: EDIT_SIZE.to_string(),
            n: EDIT_COUNT,
            image_png: encode(&canvas.image)?,
            mask_png: encode(&mask)?,
        })
    }
}

/// First result URL of an images/edits answer.
pub fn extract_result_url(reply: &ProviderReply) -> Result<String> {
    if !reply.is_success() {
        bail!(
            "image edit request failed ({}): {}",
            reply.status_code,
            truncate_text(&reply.body, 512)
        );
    }
    let rows = reply
        .payload
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let Some(first) = rows.first() else {
        bail!("image edit response returned no images");
    };
    let url = first
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());
    match url {
        Some(url) => Ok(url.to_string()),
        None => bail!("image edit response has no result URL"),
    }
}

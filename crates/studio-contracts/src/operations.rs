use serde::{Deserialize, Serialize};

use crate::errors::RelayError;

/// Image edit operations exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "remove-bg")]
    RemoveBackground,
    #[serde(rename = "resize")]
    Resize,
    #[serde(rename = "edit")]
    PromptEdit,
    #[serde(rename = "expand")]
    Expand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Transparent,
    White,
}

impl Background {
    pub fn rgba(self) -> [u8; 4] {
        match self {
            Self::Transparent => [0, 0, 0, 0],
            Self::White => [255, 255, 255, 255],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerMode {
    /// Fit the whole image inside the canvas and pad the rest.
    Contain(Background),
    /// Fit inside the inner box, then center on a transparent canvas.
    ShrinkCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskPolicy {
    FullEdit,
    KeepCenter,
}

#[derive(Clone, Copy, Debug)]
pub struct OperationSpec {
    pub operation: Operation,
    pub id: &'static str,
    pub normalizer: NormalizerMode,
    pub mask: MaskPolicy,
    pub instruction: &'static str,
    pub success_message: &'static str,
    pub failure_message: &'static str,
}

pub const OPERATION_SPECS: &[OperationSpec] = &[
    OperationSpec {
        operation: Operation::RemoveBackground,
        id: "remove-bg",
        normalizer: NormalizerMode::Contain(Background::Transparent),
        mask: MaskPolicy::FullEdit,
        instruction: "Remove the background completely. Keep the subject sharp. Output PNG with transparent background.",
        success_message: "Background removed",
        failure_message: "Failed to remove background",
    },
    OperationSpec {
        operation: Operation::Resize,
        id: "resize",
        normalizer: NormalizerMode::Contain(Background::White),
        mask: MaskPolicy::FullEdit,
        instruction: "Resize to {width}x{height} and fill empty areas naturally, matching the original scene.",
        success_message: "Image resized",
        failure_message: "Failed to resize image",
    },
    OperationSpec {
        operation: Operation::PromptEdit,
        id: "edit",
        normalizer: NormalizerMode::Contain(Background::Transparent),
        mask: MaskPolicy::FullEdit,
        instruction: "Edit the image according to: {prompt}. Keep identity and original style consistent.",
        success_message: "Image edited",
        failure_message: "Failed to edit image",
    },
    OperationSpec {
        operation: Operation::Expand,
        id: "expand",
        normalizer: NormalizerMode::ShrinkCenter,
        mask: MaskPolicy::KeepCenter,
        instruction: "Extend the image beyond its borders. Match lighting, shadows, texture and style. No distortion.",
        success_message: "Image expanded",
        failure_message: "Failed to expand image",
    },
];

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::RemoveBackground,
        Operation::Resize,
        Operation::PromptEdit,
        Operation::Expand,
    ];

    pub fn spec(self) -> &'static OperationSpec {
        // Every variant has exactly one row in OPERATION_SPECS.
        match self {
            Operation::RemoveBackground => &OPERATION_SPECS[0],
            Operation::Resize => &OPERATION_SPECS[1],
            Operation::PromptEdit => &OPERATION_SPECS[2],
            Operation::Expand => &OPERATION_SPECS[3],
        }
    }

    pub fn id(self) -> &'static str {
        self.spec().id
    }

}

/// A validated edit: the operation plus the parameters its instruction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    RemoveBackground,
    Resize { width: u32, height: u32 },
    PromptEdit { prompt: String },
    Expand,
}

impl EditCommand {
    pub fn operation(&self) -> Operation {
        match self {
            EditCommand::RemoveBackground => Operation::RemoveBackground,
            EditCommand::Resize { .. } => Operation::Resize,
            EditCommand::PromptEdit { .. } => Operation::PromptEdit,
            EditCommand::Expand => Operation::Expand,
        }
    }

    pub fn instruction(&self) -> String {
        let template = self.operation().spec().instruction;
        match self {
            EditCommand::Resize { width, height } => template
                .replace("{width}", &width.to_string())
                .replace("{height}", &height.to_string()),
            EditCommand::PromptEdit { prompt } => template.replace("{prompt}", prompt),
            EditCommand::RemoveBackground | EditCommand::Expand => template.to_string(),
        }
    }
}

/// Raw multipart fields as received, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditForm {
    pub image: Option<Vec<u8>>,
    pub prompt: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl EditForm {
    pub fn with_image(image: impl Into<Vec<u8>>) -> Self {
        Self {
            image: Some(image.into()),
            ..Self::default()
        }
    }

    /// Check the fields `operation` requires and split off the image bytes.
    pub fn into_command(self, operation: Operation) -> Result<(Vec<u8>, EditCommand), RelayError> {
        let image = self.image.filter(|bytes| !bytes.is_empty());
        // Blank means missing; a real prompt goes upstream as typed.
        let prompt = self.prompt.filter(|value| !value.trim().is_empty());

        let Some(image) = image else {
            let message = if operation == Operation::PromptEdit {
                "Image and prompt are required"
            } else {
                "No image provided"
            };
            return Err(RelayError::bad_input(message));
        };

        let command = match operation {
            Operation::RemoveBackground => EditCommand::RemoveBackground,
            Operation::Expand => EditCommand::Expand,
            Operation::PromptEdit => {
                let Some(prompt) = prompt else {
                    return Err(RelayError::bad_input("Image and prompt are required"));
                };
                EditCommand::PromptEdit { prompt }
            }
            Operation::Resize => {
                let (Some(width), Some(height)) = (
                    non_blank(self.width.as_deref()),
                    non_blank(self.height.as_deref()),
                ) else {
                    return Err(RelayError::bad_input("Width and height are required"));
                };
                let (Some(width), Some(height)) = (parse_dimension(width), parse_dimension(height))
                else {
                    return Err(RelayError::bad_input(
                        "Width and height must be positive integers",
                    ));
                };
                EditCommand::Resize { width, height }
            }
        };
        Ok((image, command))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResponse {
    pub image: String,
    pub message: String,
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_dimension(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|value| *value > 0)
}

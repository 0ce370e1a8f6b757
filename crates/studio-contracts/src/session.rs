use serde::{Deserialize, Serialize};

use crate::operations::Operation;

/// Tools offered by the client editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    #[serde(rename = "remove-bg")]
    RemoveBackground,
    Upscale,
    Resize,
    Edit,
    Expand,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::RemoveBackground,
        Tool::Upscale,
        Tool::Resize,
        Tool::Edit,
        Tool::Expand,
    ];

    /// Backend operation behind this tool. `Upscale` has none and stays disabled.
    pub fn operation(self) -> Option<Operation> {
        match self {
            Tool::RemoveBackground => Some(Operation::RemoveBackground),
            Tool::Resize => Some(Operation::Resize),
            Tool::Edit => Some(Operation::PromptEdit),
            Tool::Expand => Some(Operation::Expand),
            Tool::Upscale => None,
        }
    }

    pub fn is_available(self) -> bool {
        self.operation().is_some()
    }
}

/// Per-tab editor state. Plain fields plus setters; there are no forbidden
/// transitions, but a few setters clear fields that would otherwise go stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub original_image: Option<String>,
    pub processed_image: Option<String>,
    pub is_processing: bool,
    pub selected_tool: Option<Tool>,
    pub error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new original invalidates any previous result and error.
    pub fn set_original_image(&mut self, image: Option<String>) {
        self.original_image = image;
        self.processed_image = None;
        self.error = None;
    }

    pub fn set_processed_image(&mut self, image: Option<String>) {
        self.processed_image = image;
    }

    pub fn set_processing(&mut self, is_processing: bool) {
        self.is_processing = is_processing;
    }

    pub fn set_selected_tool(&mut self, tool: Option<Tool>) {
        self.selected_tool = tool;
        self.error = None;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the send control should accept a new request.
    pub fn can_submit(&self) -> bool {
        !self.is_processing
            && self.original_image.is_some()
            && self.selected_tool.is_some_and(Tool::is_available)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{SessionState, Tool};
    use crate::operations::Operation;

    fn loaded() -> SessionState {
        let mut state = SessionState::new();
        state.set_original_image(Some("blob:original".to_string()));
        state
    }

    #[test]
    fn new_original_clears_result_and_error() {
        let mut state = loaded();
        state.set_processed_image(Some("https://cdn/result.png".to_string()));
        state.set_error(Some("Failed to expand image".to_string()));
        state.set_processing(true);

        state.set_original_image(Some("blob:second".to_string()));
        assert_eq!(state.original_image.as_deref(), Some("blob:second"));
        assert_eq!(state.processed_image, None);
        assert_eq!(state.error, None);
        // Not touched by a new upload.
        assert!(state.is_processing);
    }

    #[test]
    fn selecting_a_tool_clears_error_only() {
        let mut state = loaded();
        state.set_processed_image(Some("https://cdn/result.png".to_string()));
        state.set_error(Some("boom".to_string()));
        state.set_selected_tool(Some(Tool::Expand));
        assert_eq!(state.selected_tool, Some(Tool::Expand));
        assert_eq!(state.error, None);
        assert!(state.processed_image.is_some());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = loaded();
        state.set_selected_tool(Some(Tool::Resize));
        state.set_processing(true);
        state.set_error(Some("boom".to_string()));
        state.reset();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn submit_is_gated_on_processing_and_tool() {
        let mut state = loaded();
        assert!(!state.can_submit());
        state.set_selected_tool(Some(Tool::Upscale));
        assert!(!state.can_submit());
        state.set_selected_tool(Some(Tool::Edit));
        assert!(state.can_submit());
        state.set_processing(true);
        assert!(!state.can_submit());
    }

    #[test]
    fn upscale_has_no_backend_operation() {
        assert_eq!(Tool::Upscale.operation(), None);
        assert_eq!(Tool::Edit.operation(), Some(Operation::PromptEdit));
        let available = Tool::ALL.iter().filter(|tool| tool.is_available()).count();
        assert_eq!(available, Operation::ALL.len());
    }

    #[test]
    fn serializes_with_client_field_names() {
        let mut state = loaded();
        state.set_selected_tool(Some(Tool::RemoveBackground));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "originalImage": "blob:original",
                "processedImage": null,
                "isProcessing": false,
                "selectedTool": "remove-bg",
                "error": null,
            })
        );
    }
}

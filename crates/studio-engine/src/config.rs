use std::env;
use std::fmt;

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_IMAGE_MODEL: &str = "dall-e-2";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_TEXT_MODEL: &str = "gemini-1.5-flash";

#[derive(Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub image_model: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub openai: OpenAiSettings,
    pub gemini: GeminiSettings,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let api_base = |key: &str, default: &str| {
            non_empty(key)
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            openai: OpenAiSettings {
                api_key: non_empty("OPENAI_API_KEY").or_else(|| non_empty("OPENAI_API_KEY_BACKUP")),
                api_base: api_base("OPENAI_API_BASE", DEFAULT_OPENAI_API_BASE),
                image_model: non_empty("OPENAI_IMAGE_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_IMAGE_MODEL.to_string()),
            },
            gemini: GeminiSettings {
                api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")),
                api_base: api_base("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE),
                text_model: non_empty("GEMINI_TEXT_MODEL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_TEXT_MODEL.to_string()),
            },
        }
    }
}

impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &redacted(&self.api_key))
            .field("api_base", &self.api_base)
            .field("image_model", &self.image_model)
            .finish()
    }
}

impl fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &redacted(&self.api_key))
            .field("api_base", &self.api_base)
            .field("text_model", &self.text_model)
            .finish()
    }
}

fn redacted(key: &Option<String>) -> &'static str {
    if key.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]);
        assert_eq!(config.openai.api_key, None);
        assert_eq!(config.openai.api_base, DEFAULT_OPENAI_API_BASE);
        assert_eq!(config.openai.image_model, DEFAULT_OPENAI_IMAGE_MODEL);
        assert_eq!(config.gemini.api_key, None);
        assert_eq!(config.gemini.text_model, "gemini-1.5-flash");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "   "),
            ("GOOGLE_API_KEY", "google-key"),
            ("GEMINI_TEXT_MODEL", ""),
        ]);
        assert_eq!(config.gemini.api_key.as_deref(), Some("google-key"));
        assert_eq!(config.gemini.text_model, DEFAULT_GEMINI_TEXT_MODEL);
    }

    #[test]
    fn api_base_is_trimmed_of_trailing_slashes() {
        let config = config_from(&[
            ("OPENAI_API_BASE", " http://localhost:8080/v1/ "),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        assert_eq!(config.openai.api_base, "http://localhost:8080/v1");
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn debug_output_never_contains_keys() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-secret"), ("GEMINI_API_KEY", "g-secret")]);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("g-secret"));
        assert!(rendered.contains("<set>"));
    }
}

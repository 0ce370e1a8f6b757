use thiserror::Error;

/// Failure taxonomy shared by the dispatcher, the chat relay and the HTTP layer.
///
/// Every variant carries the message that is safe to show to a caller.
/// Upstream detail is logged where the failure is classified, never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("{0}")]
    BadInput(String),
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    InvalidImage(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unexpected(String),
}

impl RelayError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "bad_input",
            Self::Configuration(_) => "configuration",
            Self::InvalidImage(_) => "invalid_image",
            Self::Upstream(_) => "upstream",
            Self::Unexpected(_) => "unexpected",
        }
    }

    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Self::BadInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::RelayError;

    #[test]
    fn display_is_the_caller_message() {
        let err = RelayError::bad_input("No image provided");
        assert_eq!(err.to_string(), "No image provided");
        assert_eq!(err.kind(), "bad_input");
        assert!(err.is_caller_fault());
    }

    #[test]
    fn only_bad_input_is_caller_fault() {
        for err in [
            RelayError::Configuration("x".to_string()),
            RelayError::InvalidImage("x".to_string()),
            RelayError::Upstream("x".to_string()),
            RelayError::Unexpected("x".to_string()),
        ] {
            assert!(!err.is_caller_fault(), "{}", err.kind());
        }
    }
}

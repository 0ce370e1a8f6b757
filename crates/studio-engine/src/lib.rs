pub mod config;
pub mod dispatch;
pub mod imaging;
pub mod providers;
pub mod relay;

pub use config::EngineConfig;
pub use dispatch::EditDispatcher;
pub use relay::ChatRelay;

/// Error chain flattened to one line for logs, duplicates collapsed.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().is_some_and(|existing| existing == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return providers::truncate_text(&err.to_string(), max_chars);
    }
    providers::truncate_text(&parts.join(" | caused by: "), max_chars)
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::error_chain_text;

    #[test]
    fn error_chain_text_joins_causes() {
        let err = Err::<(), _>(anyhow::anyhow!("connection refused"))
            .context("OpenAI edits request failed")
            .unwrap_err();
        assert_eq!(
            error_chain_text(&err, 512),
            "OpenAI edits request failed | caused by: connection refused"
        );
    }

    #[test]
    fn error_chain_text_respects_limit() {
        let err = anyhow::anyhow!("x".repeat(40));
        assert_eq!(error_chain_text(&err, 8), format!("{}…", "x".repeat(8)));
    }
}

//! Discord webhook transport
//!
//! Each notification channel maps to its own webhook URL. Messages are
//! posted as plain `content`; the `<...>` around explorer links already keeps
//! Discord from rendering link previews.
//!
//! Usage:
//!   Production: DISCORD_WEBHOOK_PEG, DISCORD_WEBHOOK_SEASONS,
//!               DISCORD_WEBHOOK_POOL, DISCORD_WEBHOOK_BEANSTALK
//!   Staging:    DISCORD_WEBHOOK_TEST

use super::Transport;
use crate::error::MonitorError;
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

/// Discord rejects longer message content
pub const DISCORD_MAX_CONTENT: usize = 2000;

#[derive(Serialize)]
struct DiscordMessage<'a> {
    content: &'a str,
}

pub struct DiscordTransport {
    client: reqwest::Client,
}

impl DiscordTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DiscordTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` to Discord's limit on a char boundary
fn truncate_content(text: &str) -> &str {
    if text.len() <= DISCORD_MAX_CONTENT {
        return text;
    }
    let mut end = DISCORD_MAX_CONTENT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl Transport for DiscordTransport {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, webhook_url: &str, text: &str) -> Result<(), MonitorError> {
        let content = truncate_content(text);
        if content.len() < text.len() {
            warn!("Discord message truncated from {} to {} bytes", text.len(), content.len());
        }

        let response = self
            .client
            .post(webhook_url)
            .json(&DiscordMessage { content })
            .send()
            .await
            .map_err(|e| MonitorError::Transport(format!("Discord webhook request failed: {}", e.without_url())))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MonitorError::Transport(format!(
                "Discord webhook returned status: {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body() {
        let body = serde_json::to_string(&DiscordMessage { content: "🟩↗ BEAN crossed above peg!" }).unwrap();
        assert_eq!(body, r#"{"content":"🟩↗ BEAN crossed above peg!"}"#);
    }

    #[test]
    fn test_truncate_content_respects_char_boundaries() {
        let long = "🐳".repeat(600);
        let cut = truncate_content(&long);
        assert!(cut.len() <= DISCORD_MAX_CONTENT);
        assert!(cut.chars().all(|c| c == '🐳'));
        assert_eq!(truncate_content("short"), "short");
    }
}

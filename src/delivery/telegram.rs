//! Telegram Bot API transport
//!
//! Every channel goes to one chat. Angle brackets are stripped (they only
//! exist to suppress Discord previews) and link previews are disabled
//! through the API instead. Messages are sent as Markdown.

use super::Transport;
use crate::error::MonitorError;
use async_trait::async_trait;
use serde::Serialize;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// `_ _` renders as an empty line in Markdown
const PARSE_MODE: &str = "Markdown";

/// Beanstalk Tracker channel
pub const TELEGRAM_CHAT_ID_PRODUCTION: &str = "-1001770089535";

/// Beanstalk Bot Testing channel
pub const TELEGRAM_CHAT_ID_STAGING: &str = "-1001655547288";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

pub struct TelegramTransport {
    client: reqwest::Client,
    token: String,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
        }
    }
}

/// Remove the `<>` wrapping of explorer links
pub fn strip_link_brackets(text: &str) -> String {
    text.replace(['<', '>'], "")
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, chat_id: &str, text: &str) -> Result<(), MonitorError> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, self.token);
        let message = SendMessage {
            chat_id,
            text: strip_link_brackets(text),
            parse_mode: PARSE_MODE,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&message)
            .send()
            .await
            // reqwest errors carry the URL, which contains the bot token
            .map_err(|e| MonitorError::Transport(format!("Telegram request failed: {}", e.without_url())))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MonitorError::Transport(format!(
                "Telegram sendMessage returned status: {}",
                response.status()
            )))
        }
    }
}

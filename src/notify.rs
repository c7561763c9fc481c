use std::time::Duration;

use serde_json::json;

use crate::error::DispatchError;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Upper bound on one dispatch attempt. Detection runs off the request
/// path, but a hung dispatch should still not pin a task for long.
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Credentials for the alert channel. Built once (normally from the
/// environment) and handed to the notifier, so tests can inject a
/// disabled or fake channel.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl NotifierConfig {
    pub fn from_env() -> Self {
        Self {
            bot_token: read_env("TELEGRAM_BOT_TOKEN"),
            chat_id: read_env("TELEGRAM_CHAT_ID"),
        }
    }

    pub fn disabled() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Fire-and-forget text dispatch to a Telegram chat.
#[derive(Clone)]
pub struct Notifier {
    config: NotifierConfig,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Send one message. With either credential missing this
    /// short-circuits before any network activity.
    pub async fn send(&self, text: &str) -> Result<(), DispatchError> {
        let (Some(token), Some(chat_id)) = (&self.config.bot_token, &self.config.chat_id) else {
            return Err(DispatchError::NotConfigured);
        };

        let url = format!("{TELEGRAM_API_BASE}/bot{token}/sendMessage");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .timeout(DISPATCH_TIMEOUT)
            .send()
            .await
            .map_err(DispatchError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api { status, body });
        }

        Ok(())
    }
}

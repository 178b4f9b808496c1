use super::Notifier;
use crate::model::{NotificationPayload, NotifyError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

const TELEGRAM_API: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramNotifier {
    bot_token: String,
    chat_id: i64,
    client: Client,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: i64) -> Result<Self, NotifyError> {
        Self::with_api_base(bot_token, chat_id, TELEGRAM_API)
    }

    pub fn with_api_base(bot_token: String, chat_id: i64, api_base: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::ApiError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            bot_token,
            chat_id,
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Sends a plain text message to the configured chat.
    pub async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let response = match timeout(
            SEND_TIMEOUT,
            self.client
                .post(&url)
                .form(&[("chat_id", self.chat_id.to_string()), ("text", text.to_string())])
                .send(),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!("❌ Telegram send() failed: {:?}", e);
                return Err(NotifyError::ApiError(format!("Send failed: {}", e)));
            }
            Err(_) => {
                warn!("⏳ Telegram send() timed out");
                return Err(NotifyError::Unreachable);
            }
        };
        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| "unknown".into());
        if !status.is_success() {
            warn!("❌ Telegram API responded [{}]: {}", status, body);
            return Err(NotifyError::ApiError(format!("status {}: {}", status, body)));
        }
        info!("✅ Telegram message sent [{}]", status);
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let text = format!("🔔 {}\n\n{}", payload.title, payload.message);
        self.send_text(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> NotificationPayload {
        NotificationPayload { title: "Price check".into(), message: "Still 499 kr".into(), scheduled_for: 0 }
    }

    #[tokio::test]
    async fn test_notify_posts_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottoken123/sendMessage"))
            .and(body_string_contains("chat_id=42"))
            .and(body_string_contains("Price+check"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::with_api_base("token123".into(), 42, &server.uri()).unwrap();
        notifier.notify(&payload()).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::with_api_base("t".into(), 1, &server.uri()).unwrap();
        let err = notifier.notify(&payload()).await.unwrap_err();
        assert!(matches!(err, NotifyError::ApiError(ref m) if m.contains("Forbidden")));
    }
}

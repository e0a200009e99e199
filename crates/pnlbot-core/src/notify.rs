//! Teams webhook notifications.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};

pub const DEFAULT_THEME_COLOR: &str = "0076D7";
pub const ERROR_THEME_COLOR: &str = "D70000";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook delivery failed: {0}")]
    Transport(String),

    #[error("webhook returned status {status}")]
    Rejected { status: u16 },

    #[error("failed to serialize notification: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub text: String,
    #[serde(rename = "themeColor")]
    pub theme_color: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            theme_color: DEFAULT_THEME_COLOR.to_string(),
        }
    }

    pub fn error(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(title, text).with_theme_color(ERROR_THEME_COLOR)
    }

    pub fn with_theme_color(mut self, theme_color: impl Into<String>) -> Self {
        self.theme_color = theme_color.into();
        self
    }
}

pub trait Notifier: Send + Sync {
    fn notify<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;
}

/// POSTs notifications as JSON to an incoming-webhook URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    timeout_ms: u64,
    http: Arc<dyn HttpClient>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            http,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>> {
        Box::pin(async move {
            let request = HttpRequest::post(&self.url)
                .with_json(notification)?
                .with_timeout_ms(self.timeout_ms);

            let response = self
                .http
                .execute(request)
                .await
                .map_err(|error| NotifyError::Transport(error.message().to_string()))?;

            if !response.is_success() {
                return Err(NotifyError::Rejected {
                    status: response.status,
                });
            }
            Ok(())
        })
    }
}

/// Send and forget: failures are logged, never returned.
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: &Notification) -> bool {
    match notifier.notify(notification).await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(title = %notification.title, %error, "notification not delivered");
            false
        }
    }
}

use std::sync::Arc;

use pnlbot_core::config::secrets;
use pnlbot_core::{ConfigError, Notification, Notifier, ReqwestHttpClient, WebhookNotifier};
use serde::Serialize;

use crate::cli::NotifyArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct Delivered<'a> {
    delivered: bool,
    notification: &'a Notification,
}

pub async fn run(args: &NotifyArgs, context: &Context) -> Result<CommandResult, CliError> {
    let url = args
        .webhook_url
        .clone()
        .or_else(|| context.config.teams_webhook_url.clone())
        .ok_or_else(|| ConfigError::UnconfiguredEnvironment {
            name: secrets::TEAMS_WEBHOOK_URL.env_key.to_string(),
        })?;

    let mut notification = Notification::new(&args.title, &args.text);
    if let Some(color) = &args.theme_color {
        notification = notification.with_theme_color(color.trim_start_matches('#'));
    }

    let notifier = WebhookNotifier::new(url, Arc::new(ReqwestHttpClient::new()))
        .with_timeout_ms(context.config.timeout_ms);
    notifier.notify(&notification).await?;
    tracing::info!(title = %notification.title, "notification delivered");

    Ok(CommandResult::ok(serde_json::to_value(Delivered {
        delivered: true,
        notification: &notification,
    })?))
}

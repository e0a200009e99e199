mod codec;
mod email;
mod logs;
mod market_data;
mod notify;

use std::sync::Arc;

use pnlbot_core::{BestEffortSink, BotConfig, LogStore, SecretResolver, StoreConfig};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Configuration of one invocation: resolved secrets with CLI overrides applied.
pub struct Context {
    pub config: BotConfig,
    store_file: Option<std::path::PathBuf>,
}

impl Context {
    pub fn from_cli(cli: &Cli, resolver: &SecretResolver) -> Result<Self, CliError> {
        let mut config = BotConfig::resolve(resolver)?;
        if let Some(base_url) = &cli.base_url {
            config.bloomberg_api_url = Some(base_url.clone());
        }
        config.local_mode |= cli.local;
        config.timeout_ms = cli.timeout_ms;
        config.use_test_db = cli.test_db;

        Ok(Self {
            config,
            store_file: cli.store.clone(),
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        match (&self.store_file, &self.config.store_dir) {
            (Some(file), _) => StoreConfig::at(file),
            (None, Some(dir)) => StoreConfig::in_dir(dir, self.config.use_test_db),
            (None, None) => StoreConfig::for_database(self.config.use_test_db),
        }
    }

    pub fn open_store(&self) -> Result<LogStore, CliError> {
        Ok(LogStore::open(self.store_config())?)
    }

    /// Usage sink backed by the store; an unavailable store degrades to a
    /// no-op sink and a warning.
    pub fn usage_sink(&self) -> (BestEffortSink, Option<String>) {
        match self.open_store() {
            Ok(store) => (BestEffortSink::new(Arc::new(store)), None),
            Err(error) => {
                tracing::warn!(%error, "log store unavailable; calls will not be logged");
                (
                    BestEffortSink::noop(),
                    Some(format!("log store unavailable: {error}")),
                )
            }
        }
    }
}

pub const fn name(command: &Command) -> &'static str {
    match command {
        Command::Decode(_) => "decode",
        Command::Encode(_) => "encode",
        Command::Portfolio(_) => "portfolio",
        Command::Timeseries(_) => "timeseries",
        Command::Reference(_) => "reference",
        Command::EmailCsv(_) => "email-csv",
        Command::Notify(_) => "notify",
        Command::Logs(_) => "logs",
    }
}

pub async fn run(cli: &Cli, context: &Context) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Decode(args) => codec::decode(args),
        Command::Encode(args) => codec::encode(args),
        Command::Portfolio(args) => codec::portfolio(args),
        Command::Timeseries(args) => market_data::timeseries(args, context).await,
        Command::Reference(args) => market_data::reference(args, context).await,
        Command::EmailCsv(args) => email::run(args, context).await,
        Command::Notify(args) => notify::run(args, context).await,
        Command::Logs(args) => logs::run(args, context),
    }
}

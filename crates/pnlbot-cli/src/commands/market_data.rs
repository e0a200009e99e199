use std::sync::Arc;

use pnlbot_core::{
    parse_date, MarketDataClient, ReferenceRequest, ReqwestHttpClient, TimeseriesRequest,
};
use serde_json::Value;

use crate::cli::{ReferenceArgs, TimeseriesArgs};
use crate::error::CliError;

use super::{CommandResult, Context};

fn build_client(context: &Context, step: &str) -> (MarketDataClient, Option<String>) {
    let (sink, warning) = context.usage_sink();
    let client = MarketDataClient::from_config(&context.config, Arc::new(ReqwestHttpClient::new()))
        .with_name_step(step)
        .with_sink(sink);
    (client, warning)
}

fn finish(data: Value, warning: Option<String>) -> CommandResult {
    let result = CommandResult::ok(data);
    match warning {
        Some(warning) => result.with_warning(warning),
        None => result,
    }
}

pub async fn timeseries(args: &TimeseriesArgs, context: &Context) -> Result<CommandResult, CliError> {
    let request = TimeseriesRequest::new(
        args.tickers.clone(),
        args.fields.clone(),
        parse_date(&args.start)?,
        parse_date(&args.end)?,
    )?;

    let (client, warning) = build_client(context, &args.step);
    let table = client.timeseries(&request).await?;
    Ok(finish(serde_json::to_value(table)?, warning))
}

pub async fn reference(args: &ReferenceArgs, context: &Context) -> Result<CommandResult, CliError> {
    let yas_yield_flag = args.yas_yield_flag.as_deref().map(parse_flag);
    let request = ReferenceRequest::new(args.tickers.clone(), args.fields.clone(), yas_yield_flag)?;

    let (client, warning) = build_client(context, &args.step);
    let table = client.reference(&request).await?;
    Ok(finish(serde_json::to_value(table)?, warning))
}

/// JSON literal when it parses as one, plain string otherwise.
fn parse_flag(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

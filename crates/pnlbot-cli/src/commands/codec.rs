use serde::Serialize;

use pnlbot_core::{decode as decode_identifier, derive_portfolio, encode as encode_identifier};

use crate::cli::{DecodeArgs, EncodeArgs, PortfolioArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct Decoded<'a> {
    identifier: &'a str,
    isin: String,
}

#[derive(Debug, Serialize)]
struct Encoded<'a> {
    isin: &'a str,
    security_type: &'a str,
    correlation_id: String,
}

#[derive(Debug, Serialize)]
struct Portfolio<'a> {
    strategy_code: &'a str,
    portfolio: String,
}

pub fn decode(args: &DecodeArgs) -> Result<CommandResult, CliError> {
    let rows: Vec<Decoded<'_>> = args
        .identifiers
        .iter()
        .map(|identifier| Decoded {
            identifier,
            isin: decode_identifier(identifier),
        })
        .collect();
    Ok(CommandResult::ok(serde_json::to_value(rows)?))
}

pub fn encode(args: &EncodeArgs) -> Result<CommandResult, CliError> {
    let correlation_id = encode_identifier(
        &args.isin,
        &args.security_type,
        args.pricing_source.as_deref(),
        args.ignore_pricing_source,
    )?;
    Ok(CommandResult::ok(serde_json::to_value(Encoded {
        isin: &args.isin,
        security_type: &args.security_type,
        correlation_id,
    })?))
}

pub fn portfolio(args: &PortfolioArgs) -> Result<CommandResult, CliError> {
    let rows: Vec<Portfolio<'_>> = args
        .strategy_codes
        .iter()
        .map(|strategy_code| Portfolio {
            strategy_code,
            portfolio: derive_portfolio(strategy_code),
        })
        .collect();
    Ok(CommandResult::ok(serde_json::to_value(rows)?))
}

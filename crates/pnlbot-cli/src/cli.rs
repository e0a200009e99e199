//! CLI argument definitions for pnlbot.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `decode` | Correlation IDs to ISINs |
//! | `encode` | ISIN and security type to a Correlation ID |
//! | `portfolio` | Portfolio of strategy codes |
//! | `timeseries` | Historical data from the Bloomberg proxy |
//! | `reference` | Point-in-time reference data |
//! | `email-csv` | CSV attachment of the latest report email |
//! | `notify` | Post a Teams notification |
//! | `logs` | Inspect the call and error logs |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--local` | `ENVIRONMENT=local` | Serve synthetic market data without a proxy |
//! | `--base-url` | `bloomberg-api-url` secret | Bloomberg proxy base URL |
//! | `--timeout-ms` | `10000` | Request timeout in ms |
//! | `--store` | `mongo-uri` secret | Log store database file |
//! | `--test-db` | `false` | Use the test database |
//!
//! # Examples
//!
//! ```bash
//! pnlbot decode "FR0014006ZC4@BGN Corp" "G Z2 Comdty"
//! pnlbot encode FR0014006ZC4 --type "Bond Corporate" --pricing-source BGN
//! pnlbot timeseries --ticker "FR0014006ZC4@BGN Corp" --field PX_LAST \
//!     --start 2024-01-01 --end 2024-01-31 --pretty
//! pnlbot email-csv --dir ./inbox --subject "Daily PnL" --only-new
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// PnL bot toolkit: identifiers, market data, and report emails.
#[derive(Debug, Parser)]
#[command(name = "pnlbot", author, version, about = "PnL bot toolkit")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Serve synthetic market data when no proxy URL is configured.
    #[arg(long, global = true, default_value_t = false)]
    pub local: bool,

    /// Bloomberg proxy base URL; overrides the `bloomberg-api-url` secret.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Request timeout budget in milliseconds.
    #[arg(long, global = true, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Log store database file; overrides the `mongo-uri` secret.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Use the test database instead of the production one.
    #[arg(long, global = true, default_value_t = false)]
    pub test_db: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode Correlation IDs to ISINs.
    Decode(DecodeArgs),
    /// Encode an ISIN for a security type.
    Encode(EncodeArgs),
    /// Derive portfolios from strategy codes.
    Portfolio(PortfolioArgs),
    /// Fetch historical data.
    Timeseries(TimeseriesArgs),
    /// Fetch reference data.
    Reference(ReferenceArgs),
    /// Extract the CSV of the latest email with a subject.
    EmailCsv(EmailCsvArgs),
    /// Post a Teams notification.
    Notify(NotifyArgs),
    /// Show logged calls and errors.
    Logs(LogsArgs),
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    #[arg(required = true)]
    pub identifiers: Vec<String>,
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    pub isin: String,

    /// Business security type, e.g. "Bond Corporate".
    #[arg(long = "type")]
    pub security_type: String,

    #[arg(long)]
    pub pricing_source: Option<String>,

    #[arg(long, default_value_t = false)]
    pub ignore_pricing_source: bool,
}

#[derive(Debug, Args)]
pub struct PortfolioArgs {
    #[arg(required = true)]
    pub strategy_codes: Vec<String>,
}

#[derive(Debug, Args)]
pub struct TimeseriesArgs {
    #[arg(long = "ticker", required = true)]
    pub tickers: Vec<String>,

    #[arg(long = "field", required = true)]
    pub fields: Vec<String>,

    /// First date, YYYY-MM-DD.
    #[arg(long)]
    pub start: String,

    /// Last date, YYYY-MM-DD (inclusive).
    #[arg(long)]
    pub end: String,

    /// Step name under which the call is logged.
    #[arg(long, default_value = "pnlbot")]
    pub step: String,
}

#[derive(Debug, Args)]
pub struct ReferenceArgs {
    #[arg(long = "ticker", required = true)]
    pub tickers: Vec<String>,

    #[arg(long = "field", required = true)]
    pub fields: Vec<String>,

    /// Forwarded as `YAS_YIELD_FLAG`; JSON literals are sent as such.
    #[arg(long)]
    pub yas_yield_flag: Option<String>,

    #[arg(long, default_value = "pnlbot")]
    pub step: String,
}

#[derive(Debug, Args)]
pub struct EmailCsvArgs {
    /// Subject to search for (case-insensitive substring).
    #[arg(long)]
    pub subject: String,

    /// Directory of exported `.eml` messages.
    #[arg(long)]
    pub dir: PathBuf,

    /// Only return the report if it is newer than the last one seen.
    #[arg(long, default_value_t = false)]
    pub only_new: bool,

    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// The CSV has no header row.
    #[arg(long, default_value_t = false)]
    pub no_header: bool,
}

#[derive(Debug, Args)]
pub struct NotifyArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub text: String,

    /// Hex colour without `#`.
    #[arg(long)]
    pub theme_color: Option<String>,

    /// Overrides the `teams-webhook-url` secret.
    #[arg(long)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct LogsArgs {
    /// Show one step with its errors instead of the latest calls.
    #[arg(long)]
    pub step: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn email_csv_subcommand_uses_kebab_case() {
        let cli = Cli::try_parse_from([
            "pnlbot",
            "email-csv",
            "--dir",
            "/tmp/inbox",
            "--subject",
            "Daily PnL",
            "--delimiter",
            ";",
        ])
        .expect("parse");
        let Command::EmailCsv(args) = cli.command else {
            panic!("expected email-csv");
        };
        assert_eq!(args.delimiter, ';');
        assert!(!args.only_new);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["pnlbot", "decode", "G Z2 Comdty", "--pretty", "--local"])
            .expect("parse");
        assert!(cli.pretty);
        assert!(cli.local);
        assert_eq!(cli.timeout_ms, 10_000);
    }
}

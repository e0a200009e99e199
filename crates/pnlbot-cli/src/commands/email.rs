use pnlbot_core::{fetch_if_new, latest_csv, CsvOptions, EmailCsv, EmlDirMailbox, UtcDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::EmailCsvArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct EmailReport {
    subject: Option<String>,
    filename: Option<String>,
    timestamp: Option<UtcDateTime>,
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct NoNewEmail<'a> {
    subject: &'a str,
    new: bool,
}

pub async fn run(args: &EmailCsvArgs, context: &Context) -> Result<CommandResult, CliError> {
    let options = CsvOptions {
        delimiter: u8::try_from(args.delimiter)
            .map_err(|_| CliError::Command(format!("delimiter '{}' is not ASCII", args.delimiter)))?,
        has_headers: !args.no_header,
    };
    let mailbox = EmlDirMailbox::new(&args.dir);

    let email = if args.only_new {
        let store = context.open_store()?;
        match fetch_if_new(&mailbox, &store, &args.subject).await? {
            Some(email) => email,
            None => {
                let data = serde_json::to_value(NoNewEmail {
                    subject: &args.subject,
                    new: false,
                })?;
                return Ok(CommandResult::ok(data));
            }
        }
    } else {
        latest_csv(&mailbox, &args.subject).await?
    };

    Ok(CommandResult::ok(serde_json::to_value(report(&email, options)?)?))
}

fn report(email: &EmailCsv, options: CsvOptions) -> Result<EmailReport, CliError> {
    let table = email.table(options)?;
    Ok(EmailReport {
        subject: email.subject.clone(),
        filename: email.filename.clone(),
        timestamp: email.timestamp(),
        columns: table.headers().to_vec(),
        rows: table.to_json_rows(),
    })
}

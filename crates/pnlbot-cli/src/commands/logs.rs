use pnlbot_store::{CallRecord, ErrorRecord};
use serde::Serialize;

use crate::cli::LogsArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct StepLog {
    call: Option<CallRecord>,
    errors: Vec<ErrorRecord>,
}

pub fn run(args: &LogsArgs, context: &Context) -> Result<CommandResult, CliError> {
    let store = context.open_store()?;

    let data = match &args.step {
        Some(step) => {
            let mut errors = store.errors_for(step)?;
            if errors.len() > args.limit {
                errors = errors.split_off(errors.len() - args.limit);
            }
            serde_json::to_value(StepLog {
                call: store.call(step)?,
                errors,
            })?
        }
        None => serde_json::to_value(store.recent_calls(args.limit)?)?,
    };

    Ok(CommandResult::ok(data))
}

//! Policy exception review commands.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use dbc_core::access::EffectiveStatus;
use dbc_core::types::{self, ExceptionStatus, PolicyException};

use crate::cli::{ExceptionAction, ExceptionCommand};
use crate::config::Config;
use crate::error::DbcError;

pub async fn execute(cmd: ExceptionCommand, config: &Config) -> Result<()> {
    let db = config.open_database()?;

    let (id, action, context) = match cmd.action {
        ExceptionAction::List { status, json } => {
            let status = status
                .map(|s| s.parse::<ExceptionStatus>())
                .transpose()
                .map_err(DbcError::InvalidArgument)?;
            let exceptions = db.list_exceptions(status)?;
            return list(&exceptions, json);
        }
        ExceptionAction::Approve { id, context } => (id, types::ExceptionAction::Approve, context),
        ExceptionAction::Reject { id, context } => (id, types::ExceptionAction::Reject, context),
        ExceptionAction::Revoke { id, context } => (id, types::ExceptionAction::Revoke, context),
    };

    let exception = db.transition_exception(&id, action, &config.user, context.as_deref())?;
    println!(
        "{}",
        format!("✓ Exception {} is now {}", exception.id, exception.status).green()
    );
    Ok(())
}

fn list(exceptions: &[PolicyException], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(exceptions)?);
        return Ok(());
    }
    if exceptions.is_empty() {
        println!("{}", "No exceptions".yellow());
        return Ok(());
    }

    let now = Utc::now();
    println!("{}", "Policy Exceptions".cyan().bold());
    println!("{}", "─".repeat(60));
    for exception in exceptions {
        let status = exception.effective_status(&now);
        println!(
            "  {:<36} {:<10} {}:{} {} until {}",
            exception.id,
            colorize(status),
            exception.subject_type,
            exception.subject_id,
            exception.override_privilege,
            exception.end_time.format("%Y-%m-%d %H:%M"),
        );
        println!("      {}", exception.purpose.dimmed());
    }
    Ok(())
}

fn colorize(status: EffectiveStatus) -> colored::ColoredString {
    let text = status.as_str();
    match status {
        EffectiveStatus::Active => text.green(),
        EffectiveStatus::Pending | EffectiveStatus::Scheduled => text.yellow(),
        EffectiveStatus::Expired | EffectiveStatus::Rejected | EffectiveStatus::Revoked => {
            text.dimmed()
        }
    }
}

//! Access evaluation command.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use dbc_core::access::{Decision, ResourceRef, Subject, evaluate, evaluate_columns};

use crate::cli::EvaluateArgs;
use crate::config::Config;
use crate::error::{DbcError, DbcResult};

pub async fn execute(args: EvaluateArgs, config: &Config) -> Result<()> {
    let subject = subject_from(&args)?;
    let resource = resource_from(&args);
    let now = parse_time(args.at.as_deref())?;

    let snapshot = config.open_database()?.load_policy_snapshot()?;

    if args.columns.is_empty() {
        let decision = evaluate(&snapshot, &subject, &resource, &args.privilege, now);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&decision)?);
        } else {
            println!("{}", describe(&decision));
        }
        return Ok(());
    }

    let names: Vec<&str> = args.columns.iter().map(String::as_str).collect();
    let plan = evaluate_columns(&snapshot, &subject, &resource, &names, &args.privilege, now);

    if args.json {
        let columns: serde_json::Map<String, serde_json::Value> = plan
            .columns()
            .iter()
            .map(|c| -> serde_json::Result<(String, serde_json::Value)> {
                Ok((c.name.clone(), serde_json::to_value(&c.decision)?))
            })
            .collect::<serde_json::Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&columns)?);
        return Ok(());
    }

    for column in plan.columns() {
        println!("  {:<24} {}", column.name, describe(&column.decision));
    }
    Ok(())
}

fn subject_from(args: &EvaluateArgs) -> DbcResult<Subject> {
    match (&args.user, &args.role) {
        (Some(user), None) => Ok(Subject::user(user.clone())),
        (None, Some(role)) => Ok(Subject::role(role.clone())),
        _ => Err(DbcError::InvalidArgument(
            "exactly one of --user or --role is required".into(),
        )),
    }
}

fn resource_from(args: &EvaluateArgs) -> ResourceRef {
    ResourceRef {
        database_id: args.database.clone(),
        schema_name: args.schema.clone(),
        table_name: args.table.clone(),
        column_name: args.column.clone(),
    }
}

fn parse_time(at: Option<&str>) -> DbcResult<DateTime<Utc>> {
    match at {
        None => Ok(Utc::now()),
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| DbcError::InvalidArgument(format!("--at: {}", e))),
    }
}

fn describe(decision: &Decision) -> String {
    let verdict = if !decision.allowed {
        "DENY".red().bold()
    } else if decision.is_masked() {
        let masking = decision
            .masking_type
            .map(|t| t.as_str())
            .unwrap_or_default();
        format!("MASK({})", masking).yellow().bold()
    } else {
        "ALLOW".green().bold()
    };

    let mut line = format!("{} {}", verdict, decision.reason.as_str().dimmed());
    if let Some(policy_id) = &decision.policy_id {
        line.push_str(&format!(" policy={}", policy_id));
    }
    if let Some(exception_id) = &decision.exception_id {
        line.push_str(&format!(" exception={}", exception_id));
    }
    line
}

//! Masking pattern commands.
//!
//! Operates directly on the console database.

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use dbc_core::masking::MaskingRegistry;
use dbc_core::types::{MaskingPattern, MaskingType, NewMaskingPattern};

use crate::cli::{PatternAction, PatternCommand};
use crate::config::Config;
use crate::error::DbcError;

pub async fn execute(cmd: PatternCommand, config: &Config) -> Result<()> {
    let registry = || -> Result<MaskingRegistry> {
        Ok(MaskingRegistry::new(Arc::new(config.open_database()?)))
    };

    match cmd.action {
        PatternAction::List { json } => list(&registry()?, json),
        PatternAction::Create {
            name,
            masking_type,
            args,
            description,
        } => {
            let pattern = registry()?.create(NewMaskingPattern {
                name,
                description,
                masking_type: parse_type(&masking_type)?,
                masking_args: args,
            })?;
            println!("{}", "✓ Masking pattern created".green());
            println!("  ID: {}", pattern.id);
            Ok(())
        }
        PatternAction::Delete { id } => {
            registry()?.delete(&id)?;
            println!("{}", "✓ Masking pattern deleted".green());
            Ok(())
        }
        PatternAction::Seed => {
            let seeded = registry()?.seed_defaults()?;
            if seeded.is_empty() {
                println!("{}", "Registry already has patterns; nothing seeded".yellow());
            } else {
                println!("{}", format!("✓ Installed {} patterns", seeded.len()).green());
            }
            Ok(())
        }
        PatternAction::Preview {
            masking_type,
            args,
            value,
        } => preview(&masking_type, args.as_deref(), &value),
    }
}

pub(crate) fn parse_type(text: &str) -> Result<MaskingType, DbcError> {
    text.parse().map_err(DbcError::InvalidArgument)
}

fn list(registry: &MaskingRegistry, json: bool) -> Result<()> {
    let patterns = registry.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
        return Ok(());
    }
    if patterns.is_empty() {
        println!("{}", "No masking patterns. Run `dbc pattern seed` to install defaults.".yellow());
        return Ok(());
    }

    println!("{}", "Masking Patterns".cyan().bold());
    println!("{}", "─".repeat(60));
    for pattern in &patterns {
        println!("{}", format_row(pattern));
    }
    Ok(())
}

fn format_row(pattern: &MaskingPattern) -> String {
    let args = pattern.masking_args.as_deref().unwrap_or("-");
    format!(
        "  {:<36} {:<8} {}  {}",
        pattern.id,
        pattern.masking_type.as_str(),
        pattern.name,
        args.dimmed()
    )
}

fn preview(masking_type: &str, args: Option<&str>, value: &str) -> Result<()> {
    let masked = MaskingRegistry::preview(parse_type(masking_type)?, args, value)?;
    match masked {
        Some(masked) => println!("{}", masked),
        None => println!("{}", "NULL".dimmed()),
    }
    Ok(())
}

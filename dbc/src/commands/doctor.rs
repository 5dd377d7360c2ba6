//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;
use dbc_core::masking::validate_args;
use dbc_core::types::{DataAccessPolicy, MaskingPattern};

use crate::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    println!("{}", "dbc Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues: Vec<String> = Vec::new();

    // Check config file
    print!("  Config file: ");
    if Config::config_path().exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check database
    print!("  Database ({}): ", config.database_path.display());
    let db = match config.open_database() {
        Ok(db) => {
            println!("{}", "✓ connected".green());
            db
        }
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Database not accessible".into());
            return summarize(&issues);
        }
    };

    print!("  Masking patterns: ");
    let patterns = db.list_masking_patterns()?;
    if patterns.is_empty() {
        println!("{}", "○ none (run `dbc pattern seed`)".yellow());
    } else {
        println!("{}", format!("✓ {}", patterns.len()).green());
    }
    issues.extend(invalid_patterns(&patterns));

    print!("  Policies: ");
    let policies = db.list_policies()?;
    println!("{}", format!("✓ {}", policies.len()).green());
    issues.extend(dangling_masking_references(&policies, &patterns));

    println!();
    summarize(&issues)
}

fn summarize(issues: &[String]) -> Result<()> {
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in issues {
            println!("  • {}", issue);
        }
    }
    Ok(())
}

/// Stored patterns whose arguments no longer validate.
fn invalid_patterns(patterns: &[MaskingPattern]) -> Vec<String> {
    patterns
        .iter()
        .filter_map(|p| {
            validate_args(p.masking_type, p.masking_args.as_deref())
                .err()
                .map(|e| format!("Pattern '{}' ({}) has invalid arguments: {}", p.name, p.id, e))
        })
        .collect()
}

/// Active policies whose masking pattern is gone; these deny access.
fn dangling_masking_references(
    policies: &[DataAccessPolicy],
    patterns: &[MaskingPattern],
) -> Vec<String> {
    policies
        .iter()
        .filter(|p| p.is_active)
        .filter_map(|p| {
            let pattern_id = p.masking_policy_id.as_deref()?;
            (!patterns.iter().any(|m| m.id == pattern_id)).then(|| {
                format!(
                    "Policy '{}' ({}) references missing masking pattern {}",
                    p.name, p.id, pattern_id
                )
            })
        })
        .collect()
}

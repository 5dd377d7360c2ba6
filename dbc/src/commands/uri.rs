//! Connection URI commands.

use anyhow::Result;
use colored::Colorize;
use dbc_core::connection::{build_uri, parse_uri, redact_uri};

use crate::cli::{UriAction, UriCommand};

pub async fn execute(cmd: UriCommand) -> Result<()> {
    match cmd.action {
        UriAction::Parse { uri, json } => parse(&uri, json),
        UriAction::Build {
            db_type,
            host,
            port,
            user,
            password,
            database,
        } => {
            let uri = build_uri(&db_type, &host, &port, &user, &password, &database);
            if uri.is_empty() {
                println!("{}", "Nothing to build: host, user and database are all empty".yellow());
            } else {
                println!("{}", uri);
            }
            Ok(())
        }
    }
}

fn parse(uri: &str, json: bool) -> Result<()> {
    let Some(fields) = parse_uri(uri) else {
        anyhow::bail!("Not a connection URI: {}", redact_uri(uri));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
        return Ok(());
    }

    println!("  Host:     {}", fields.host);
    println!("  Port:     {}", fields.port);
    println!("  User:     {}", fields.user);
    println!(
        "  Password: {}",
        if fields.password.is_empty() { "" } else { "***" }
    );
    println!("  Database: {}", fields.database);
    Ok(())
}

//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};

/// Database console CLI
///
/// Connection URI tools, masking pattern administration and access checks
/// against the console database.
#[derive(Parser, Debug)]
#[command(name = "dbc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse and build connection URIs
    Uri(UriCommand),

    /// Masking pattern administration
    Pattern(PatternCommand),

    /// Evaluate access for a user or role
    Evaluate(EvaluateArgs),

    /// Policy exception review
    Exception(ExceptionCommand),

    /// Run diagnostics
    Doctor,

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// URI Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct UriCommand {
    #[command(subcommand)]
    pub action: UriAction,
}

#[derive(Subcommand, Debug)]
pub enum UriAction {
    /// Split a connection URI into fields
    Parse {
        /// Connection URI
        uri: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Build a connection URI from fields
    Build {
        /// Connection type (postgres, mysql, mongodb, ...)
        #[arg(short = 't', long = "type")]
        db_type: String,

        #[arg(long, default_value = "")]
        host: String,

        #[arg(long, default_value = "")]
        port: String,

        #[arg(short, long, default_value = "")]
        user: String,

        #[arg(short, long, default_value = "", env = "DBC_PASSWORD")]
        password: String,

        #[arg(short, long, default_value = "")]
        database: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct PatternCommand {
    #[command(subcommand)]
    pub action: PatternAction,
}

#[derive(Subcommand, Debug)]
pub enum PatternAction {
    /// List masking patterns
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Create a masking pattern
    Create {
        #[arg(short, long)]
        name: String,

        /// NONE, REDACT, PARTIAL, HASH, NULLIFY, SHUFFLE or CUSTOM
        #[arg(short = 't', long = "type")]
        masking_type: String,

        /// JSON arguments, e.g. '{"start":2,"end":2}'
        #[arg(short, long)]
        args: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a masking pattern
    Delete {
        /// Pattern ID
        id: String,
    },

    /// Install the standard patterns into an empty registry
    Seed,

    /// Apply an unsaved pattern to a sample value
    Preview {
        #[arg(short = 't', long = "type")]
        masking_type: String,

        #[arg(short, long)]
        args: Option<String>,

        /// Sample value
        value: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// User to evaluate for
    #[arg(long, conflicts_with = "role", required_unless_present = "role")]
    pub user: Option<String>,

    /// Role to evaluate for
    #[arg(long)]
    pub role: Option<String>,

    /// Database (connection) id
    #[arg(long)]
    pub database: String,

    #[arg(long, default_value = "public")]
    pub schema: String,

    #[arg(long)]
    pub table: Option<String>,

    #[arg(long, requires = "table")]
    pub column: Option<String>,

    /// Result columns to evaluate one by one (comma separated)
    #[arg(long, value_delimiter = ',', requires = "table", conflicts_with = "column")]
    pub columns: Vec<String>,

    #[arg(long, default_value = "READ")]
    pub privilege: String,

    /// Evaluation time (RFC 3339); defaults to now
    #[arg(long)]
    pub at: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Exception Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ExceptionCommand {
    #[command(subcommand)]
    pub action: ExceptionAction,
}

#[derive(Subcommand, Debug)]
pub enum ExceptionAction {
    /// List exceptions
    List {
        /// Filter by stored status (PENDING, APPROVED, REJECTED, REVOKED)
        #[arg(short, long)]
        status: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Approve a pending exception
    Approve {
        id: String,
        /// Note stored with the audit entry
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Reject a pending exception
    Reject {
        id: String,
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Revoke a pending or approved exception
    Revoke {
        id: String,
        #[arg(short, long)]
        context: Option<String>,
    },
}

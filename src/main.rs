//! dbctx - Main entry point.
//!
//! Runs SQL statements against SQLite, PostgreSQL or MySQL through the
//! scoped connection layer and prints results as JSON on stdout.

use dbctx::config::{Command, Config};
use dbctx::db::{self, ExecutionContext};
use dbctx::error::DbError;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only results.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn run(ctx: &mut ExecutionContext, command: &Command) -> Result<serde_json::Value, DbError> {
    let output = match command {
        Command::Query(args) => json!(ctx.query_many(&args.sql, &args.values())?),
        Command::One(args) => json!(ctx.query_one(&args.sql, &args.values())?),
        Command::Scalar(args) => json!(ctx.query_scalar(&args.sql, &args.values())?),
        Command::Execute(args) => json!({ "rows_affected": ctx.execute(&args.sql, &args.values())? }),
        Command::Transaction { statements } => {
            let counts = ctx.with_transaction(|tx| {
                statements
                    .iter()
                    .map(|sql| tx.execute(sql, &[]))
                    .collect::<Result<Vec<_>, DbError>>()
            })?;
            json!({ "rows_affected": counts })
        }
    };
    Ok(output)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    init_tracing(&config);

    let db_config = config.database_config()?;
    info!(
        database = %db_config.masked_connection_string(),
        db_type = %db_config.db_type,
        "Starting dbctx v{}",
        env!("CARGO_PKG_VERSION")
    );
    db::init(&db_config)?;

    let mut ctx = ExecutionContext::new();
    match run(&mut ctx, &config.command) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            Err(e.into())
        }
    }
}

//! Backfill batch entry point.
//!
//! Recomputes stored expected/variance for cash sessions from the movement
//! ledger. Usage:
//!
//! ```text
//! drawer-backfill [--dry-run] [--session <uuid>] [--page-size <n>]
//! ```
//!
//! Prints one line per changed (or would-change) session and a final
//! summary count.

use std::sync::Arc;
use uuid::Uuid;

use cash_drawer_service::config::DrawerConfig;
use cash_drawer_service::observability::init_tracing;
use cash_drawer_service::services::{
    gather_metrics, init_metrics, record_error, BackfillJob, BackfillMode, PostgresStore,
};

const USAGE: &str = "usage: drawer-backfill [--dry-run] [--session <uuid>] [--page-size <n>]";

struct Args {
    mode: BackfillMode,
    session_filter: Option<Uuid>,
    page_size: Option<i64>,
}

/// Returns `Ok(None)` when help was requested.
fn parse_args() -> Result<Option<Args>, String> {
    let mut mode = BackfillMode::Write;
    let mut session_filter = None;
    let mut page_size = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dry-run" => mode = BackfillMode::DryRun,
            "--session" => {
                let value = args.next().ok_or("--session requires a uuid")?;
                let id = value
                    .parse::<Uuid>()
                    .map_err(|e| format!("invalid --session value '{}': {}", value, e))?;
                session_filter = Some(id);
            }
            "--page-size" => {
                let value = args.next().ok_or("--page-size requires a number")?;
                let n = value
                    .parse::<i64>()
                    .map_err(|e| format!("invalid --page-size value '{}': {}", value, e))?;
                page_size = Some(n);
            }
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("unknown argument '{}'\n{}", other, USAGE)),
        }
    }

    Ok(Some(Args {
        mode,
        session_filter,
        page_size,
    }))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{}", msg);
            return Err(std::io::Error::other("argument error"));
        }
    };

    // Load configuration
    let config = DrawerConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // Initialize tracing
    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?args.mode,
        session_filter = ?args.session_filter,
        "Starting drawer backfill"
    );

    // Initialize metrics
    init_metrics();

    let store = PostgresStore::new(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to database");
        std::io::Error::other(format!("Database error: {}", e))
    })?;
    store.run_migrations().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to run migrations");
        std::io::Error::other(format!("Migration error: {}", e))
    })?;

    let page_size = args.page_size.unwrap_or(config.backfill.page_size);
    let job = BackfillJob::new(Arc::new(store), page_size);

    let summary = job
        .run(args.mode, args.session_filter)
        .await
        .map_err(|e| {
            record_error(e.kind());
            tracing::error!(error = %e, "Backfill failed");
            std::io::Error::other(format!("Backfill error: {}", e))
        })?;

    let verb = match args.mode {
        BackfillMode::DryRun => "would update",
        BackfillMode::Write => "updated",
    };
    for d in &summary.divergences {
        println!(
            "{} session {}: expected {:?} -> {}, variance {:?} -> {:?}",
            verb,
            d.session_id,
            d.stored_expected,
            d.recomputed_expected,
            d.stored_variance,
            d.recomputed_variance
        );
    }
    println!(
        "{} of {} sessions {}",
        summary.changed, summary.scanned, verb
    );

    tracing::debug!(metrics = %gather_metrics(), "Final metrics");

    Ok(())
}

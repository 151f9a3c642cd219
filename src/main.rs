use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tracing::info;

use update_name::channels::HttpTimelineClient;
use update_name::config::{CursorBackend, JobConfig};
use update_name::pipeline::runner::{JobRunner, RunOptions};
use update_name::schedule::{parse_schedule, spawn_scheduled_runner};
use update_name::store::{CursorStore, InMemoryCursorStore, JsonFileCursorStore, LibSqlCursorStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = JobConfig::from_env().context("Failed to load configuration")?;
    let rule_set = config.load_rule_set().await.with_context(|| {
        format!("Failed to load rule set from {}", config.rules_path.display())
    })?;

    eprintln!("update-name v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Account: {}", config.account);
    eprintln!("   API: {}", config.timeline.base_url);
    eprintln!(
        "   Rules: {} ({:?} match, {:?} length gate)",
        rule_set.rules.len(),
        rule_set.match_mode,
        rule_set.length_gate
    );
    eprintln!("   On action error: {}", config.failure_policy);

    // ── Cursor store ────────────────────────────────────────────────────
    let cursors: Arc<dyn CursorStore> = match &config.cursor_backend {
        CursorBackend::LibSql { path } => {
            eprintln!("   Cursors: libsql ({})", path.display());
            Arc::new(
                LibSqlCursorStore::new_local(path)
                    .await
                    .with_context(|| format!("Failed to open cursor database at {}", path.display()))?,
            )
        }
        CursorBackend::File { path } => {
            eprintln!("   Cursors: file ({})", path.display());
            Arc::new(JsonFileCursorStore::new(path.clone()))
        }
        CursorBackend::Memory => {
            eprintln!("   Cursors: memory (not persisted across runs)");
            Arc::new(InMemoryCursorStore::new())
        }
    };

    if config.dry_run {
        eprintln!("   Dry run: actions are logged, not executed");
    } else if !config.persist_cursor {
        eprintln!("   Cursor persistence: disabled");
    }

    // ── Runner ──────────────────────────────────────────────────────────
    let client = Arc::new(HttpTimelineClient::new(config.timeline.clone()));
    let runner = JobRunner::new(
        config.account.clone(),
        rule_set,
        client.clone(),
        client,
        cursors,
    )
    .with_options(RunOptions {
        failure_policy: config.failure_policy,
        dry_run: config.dry_run,
        persist_cursor: config.persist_cursor,
    });

    let Some(expr) = config.schedule.as_deref() else {
        eprintln!("   Mode: single run\n");
        runner.run_once().await.context("Run failed")?;
        return Ok(());
    };

    eprintln!("   Mode: scheduled ({expr})\n");
    let schedule = parse_schedule(expr)?;
    let (handle, shutdown) = spawn_scheduled_runner(Arc::new(runner), schedule);

    tokio::select! {
        joined = handle => {
            joined.context("Scheduler task panicked")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received: stopping scheduler");
            shutdown.store(true, Ordering::Relaxed);
        }
    }

    Ok(())
}

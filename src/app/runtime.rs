use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use tabfetch::detect::ColumnRequest;
use tabfetch::download::{CollisionPolicy, DownloadEngine, HttpClient, RetryPolicy};
use tabfetch::{BatchCoordinator, ColumnId, CoordinatorOptions};

use crate::app::{config_runtime, discovery, report, terminal};
use crate::app_config::load_default_file_config;
use crate::cli::Args;

pub(crate) async fn run_tabfetch() -> Result<()> {
    let (cli_args, cli_sources) = config_runtime::parse_cli_with_sources();
    let loaded_config = load_default_file_config()?;
    let args =
        config_runtime::apply_config_defaults(cli_args, &cli_sources, loaded_config.config.as_ref())?;

    let default_level = config_runtime::resolve_default_log_level(&args);
    let force_cli_log_level = config_runtime::should_force_cli_log_level(&cli_sources);
    let no_color = terminal::is_no_color_requested(args.no_color);
    terminal::init_tracing(default_level, force_cli_log_level, no_color);

    debug!(?args, config = ?loaded_config.path, "CLI arguments resolved");
    info!("tabfetch starting");

    let workbooks = discovery::discover_workbooks(&args.input_dir, args.name_filter.as_deref())?;
    if workbooks.is_empty() {
        info!(dir = %args.input_dir.display(), "No matching workbooks found");
    }

    let output_root = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.input_dir.clone());

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let coordinator = build_coordinator(&args)?.with_interrupt_flag(Arc::clone(&interrupted));
    let results = coordinator
        .process_paths(&workbooks, &output_root)
        .await
        .context("Batch aborted")?;

    let was_interrupted = interrupted.load(Ordering::SeqCst);
    let run_report = report::RunReport::from_results(&results, was_interrupted);
    info!(
        workbooks = results.len(),
        succeeded = run_report.totals.succeeded,
        failed = run_report.totals.failed,
        retries = run_report.totals.retries,
        "Download complete"
    );
    if was_interrupted {
        warn!("Interrupted; remaining links were not downloaded");
    }

    let mut stdout = io::stdout().lock();
    if args.json {
        run_report.write_json(&mut stdout)?;
    } else {
        run_report.write_text(&mut stdout)?;
    }
    Ok(())
}

fn build_coordinator(args: &Args) -> Result<BatchCoordinator> {
    let client = HttpClient::new_with_timeouts(args.connect_timeout, args.read_timeout);
    let retry_policy = RetryPolicy::with_max_attempts(u32::from(args.max_attempts));
    let collision_policy = if args.disambiguate {
        CollisionPolicy::IndexSuffix
    } else {
        CollisionPolicy::Overwrite
    };
    let engine = DownloadEngine::new(usize::from(args.concurrency), retry_policy)?
        .with_collision_policy(collision_policy);
    let options = CoordinatorOptions {
        columns: column_request(args),
    };
    Ok(BatchCoordinator::new(client, engine, options))
}

fn column_request(args: &Args) -> ColumnRequest {
    if args.columns.is_empty() {
        ColumnRequest::Detect {
            max_columns: usize::from(args.max_columns),
        }
    } else {
        ColumnRequest::Explicit(
            args.columns
                .iter()
                .map(|c| ColumnId::new(c.trim()))
                .collect(),
        )
    }
}

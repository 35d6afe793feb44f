//! symql: query debug-symbol snapshots with SQL

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use symql::cli_format::{render_result, render_summary};
use symql::cli_shell::run_shell;
use symql::config::{CliArgs, SymqlConfig};
use symql::server::{self, AppState};
use symql::symbols::{start_dispatcher, SymTag, SymbolStore};
use symql::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "symql:".red().bold());
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = CliArgs::parse();
    let config = SymqlConfig::from_args(&args)?;

    let log_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter)
        .init();

    for skipped in &config.skipped_config {
        warn!(error = %skipped, "Skipped configuration file");
    }
    if let Some(path) = &config.config_path {
        info!(path = %path.display(), "Configuration loaded from file");
    }

    let store = Arc::new(SymbolStore::load(&config.snapshot)?);

    if args.http.is_some() {
        return run_http(&config, store).map(|_| ExitCode::SUCCESS);
    }

    if args.interactive {
        let dispatcher = start_dispatcher(store, config.engine, config.dispatcher.clone())?;
        run_shell(&dispatcher, args.format)?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(sql) = args.statement() {
        let dispatcher = start_dispatcher(store, config.engine, config.dispatcher.clone())?;
        let result = dispatcher.execute(sql)?;
        if result.success {
            println!("{}", render_result(&result, args.format));
            return Ok(ExitCode::SUCCESS);
        }
        eprintln!("{} {}", "Error:".red().bold(), render_result(&result, args.format));
        return Ok(ExitCode::from(1));
    }

    println!("{}", format!("Snapshot: {}", config.snapshot.display()).bold());
    println!("{}", render_summary(&store.summary()));
    Ok(ExitCode::SUCCESS)
}

fn run_http(config: &SymqlConfig, store: Arc<SymbolStore>) -> Result<()> {
    let function_count = store.count(SymTag::Function);
    let dispatcher = Arc::new(start_dispatcher(
        store,
        config.engine,
        config.dispatcher.clone(),
    )?);
    let state = AppState::new(
        Arc::clone(&dispatcher),
        config.snapshot.display().to_string(),
        function_count,
    )
    .with_token(config.token.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(server::serve(config.http_addr, state));
    if let Err(ref e) = served {
        error!(error = %e, "HTTP server failed");
    }

    dispatcher.shutdown();
    info!(stats = ?dispatcher.stats(), "Query dispatcher stopped");
    served
}

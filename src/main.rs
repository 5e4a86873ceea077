#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

use anyhow::{bail, Result};
use clap::Parser;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use slskd_search::app::SearchApp;
use slskd_search::client::SlskdClient;
use slskd_search::config::{load_config, save_config, AppConfig};
use slskd_search::console::ConsoleView;
use slskd_search::engine::{EngineSettings, SearchEngine};
use slskd_search::filter::Category;
use slskd_search::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "slskd-search")]
#[command(about = "Live search client for an slskd daemon")]
struct Args {
    #[arg(default_value = "")]
    query: String,
    /// File type filter: all, audio, videos, software, books, photos, archives.
    #[arg(long = "type", default_value = "all")]
    category: Category,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    url_base: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Seconds between result refreshes.
    #[arg(long)]
    interval: Option<u64>,
    /// Requested server-side search timeout; values below 30 minutes are raised.
    #[arg(long)]
    timeout_ms: Option<i64>,
    #[arg(long, default_value_t = false)]
    no_auto_update: bool,
    /// Headless mode: number of fetch cycles before exiting, 0 runs until Ctrl+C.
    #[arg(long, default_value_t = 3)]
    polls: usize,
    #[arg(long, default_value_t = false)]
    cli: bool,
    /// Write the effective connection settings back to config.json.
    #[arg(long, default_value_t = false)]
    save_config: bool,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn effective_config(args: &Args) -> Result<AppConfig> {
    let mut cfg = load_config()?;
    if let Some(host) = &args.host {
        cfg.host = host.clone();
    }
    if let Some(url_base) = &args.url_base {
        cfg.url_base = url_base.clone();
    }
    if let Some(api_key) = &args.api_key {
        cfg.api_key = api_key.clone();
    }
    if let Some(token) = &args.token {
        cfg.token = token.clone();
    }
    if let Some(username) = &args.username {
        cfg.username = username.clone();
    }
    if let Some(password) = &args.password {
        cfg.password = password.clone();
    }
    if let Some(interval) = args.interval {
        cfg.search_interval_sec = interval.max(1);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        cfg.search_timeout_ms = timeout_ms;
    }
    if args.no_auto_update {
        cfg.search_auto_update = false;
    }
    Ok(cfg)
}

fn run_cli(args: &Args, cfg: &AppConfig) -> Result<()> {
    if args.query.trim().is_empty() {
        bail!("Enter a search query.");
    }
    let client = SlskdClient::new(cfg)?;
    let settings = EngineSettings {
        auto_update: true,
        ..EngineSettings::from(cfg)
    };
    let mut engine = SearchEngine::new(Arc::new(client), settings);
    let mut view = ConsoleView::new(io::stdout().lock());

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))?;
    }

    engine.set_category(args.category, &mut view);
    engine.submit_search(&args.query, &mut view)?;
    while !interrupted.load(Ordering::SeqCst) {
        engine.tick(Instant::now(), &mut view);
        engine.pump_blocking(&mut view, Duration::from_millis(100));
        if engine.current_session().is_none() && !engine.is_busy() {
            bail!("{}", engine.status());
        }
        if args.polls > 0 && view.cycles >= args.polls {
            break;
        }
    }
    if interrupted.load(Ordering::SeqCst) {
        debug!("interrupted, closing session");
    }

    if let Some(handle) = engine.close() {
        if let Ok(message) = handle.join() {
            eprintln!("{message}");
        }
    }
    Ok(())
}

fn run_gui(args: &Args, cfg: &AppConfig) -> Result<()> {
    let client = SlskdClient::new(cfg)?;
    let engine = SearchEngine::new(Arc::new(client), EngineSettings::from(cfg));
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = eframe::egui::ViewportBuilder::default()
        .with_inner_size(eframe::egui::vec2(1100.0, 750.0))
        .with_title("slskd search");
    let query = args.query.clone();
    let category = args.category;

    eframe::run_native(
        "slskd-search",
        native_options,
        Box::new(move |_cc| Ok(Box::new(SearchApp::new(engine, query, category)))),
    )
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let cfg = effective_config(&args)?;
    info!(config = ?cfg.sanitized(), "configuration loaded");
    if args.save_config {
        save_config(&cfg)?;
    }
    if args.cli {
        run_cli(&args, &cfg)
    } else {
        run_gui(&args, &cfg)
    }
}

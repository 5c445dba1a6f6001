//! `roverlink` – fleet coordination server
//!
//! 1. Initialises tracing (optionally exporting spans over OTLP).
//! 2. Loads `~/.roverlink/config.toml` plus `ROVERLINK_*` overrides.
//! 3. Serves the HTTP API and the real-time WebSocket channel from one
//!    shared [`Gateway`] until either listener fails or Ctrl-C is received.
//!
//! `roverlink --write-default-config` writes the default config file and
//! exits.

mod config;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use roverlink_gateway::{ApiServer, Gateway, RealtimeServer};
use tracing::{error, info};

fn main() -> ExitCode {
    let _guard = telemetry::init_tracing("roverlink");

    if std::env::args().skip(1).any(|a| a == "--write-default-config") {
        return match config::save(&config::Config::default()) {
            Ok(path) => {
                println!("{} Config written to {}", "✓".green().bold(), path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    print_banner();

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server lifecycle
// ─────────────────────────────────────────────────────────────────────────────

async fn serve(cfg: config::Config) -> Result<(), String> {
    let http_addr = cfg.http_addr()?;
    let realtime_addr = cfg.realtime_addr()?;
    info!(?cfg, "configuration loaded");

    let gateway = Arc::new(Gateway::new(cfg.telemetry_capacity));
    let api = ApiServer::new(Arc::clone(&gateway)).with_addr(http_addr);
    let realtime = RealtimeServer::new(Arc::clone(&gateway)).with_addr(realtime_addr);

    println!("  HTTP API        {}", format!("http://{http_addr}").bold());
    println!("  Real-time       {}", format!("ws://{realtime_addr}").bold());
    println!("  Press {} to stop.\n", "Ctrl-C".bold().cyan());

    let result = tokio::select! {
        res = api.run() => res.map_err(|e| e.to_string()),
        res = realtime.run() => res.map_err(|e| e.to_string()),
        signal = tokio::signal::ctrl_c() => {
            println!();
            println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
            signal.map_err(|e| format!("failed to listen for Ctrl-C: {e}"))
        }
    };

    let robots = gateway.robots().total;
    let missions = gateway.missions().total;
    info!(robots, missions, "roverlink stopped");
    println!(
        "{}",
        format!("  ✓ {robots} robot(s), {missions} mission(s) at shutdown.").green()
    );

    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___                   __ _      __  "#.bold().cyan());
    println!("{}", r#"  / _ \___ _  _____ ____/ /(_)__  / /__"#.bold().cyan());
    println!("{}", r#" / , _/ _ \ |/ / -_) __/ // / _ \/  '_/"#.bold().cyan());
    println!("{}", r#"/_/|_|\___/___/\__/_/ /_//_/_//_/_/\_\ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Roverlink".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot Fleet Coordination Server");
    println!();
}

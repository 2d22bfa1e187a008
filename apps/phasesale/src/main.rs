//! # phasesale - Token Sale Server
//!
//! Hosts one two-window token sale over HTTP.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 apps/phasesale (THE BINARY)          │
//! │                                                      │
//! │   ┌─────────────┐          ┌─────────────┐           │
//! │   │    CLI      │          │  HTTP API   │           │
//! │   │   (clap)    │          │   (axum)    │           │
//! │   └──────┬──────┘          └──────┬──────┘           │
//! │          └───────────┬────────────┘                  │
//! │                      ▼                               │
//! │              ┌────────────────┐                      │
//! │              │ phasesale-core │                      │
//! │              │  (THE ENGINE)  │                      │
//! │              └────────────────┘                      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! phasesale init
//! phasesale server --host 0.0.0.0 --port 8080
//! phasesale status --json-mode
//! phasesale quote --amount 1000
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // PHASESALE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("PHASESALE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "phasesale=info,phasesale_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = phasesale::cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = phasesale::cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  phasesale v{}
  pre-sale + main sale, operator controlled
"#,
        env!("CARGO_PKG_VERSION")
    );
}

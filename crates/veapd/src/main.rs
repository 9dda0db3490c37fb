//! veapd - VEAP server daemon
//!
//! Serves an in-memory demo object tree over the VEAP protocol.
//!
//! Usage:
//!   veapd [config.toml]
//!
//! Without a config file the server listens on 0.0.0.0:2121 with the
//! default limits. See `config.rs` for the file format.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veap_core::DefaultMetaService;
use veap_server::{router, Handler};

mod config;
mod demo;

use config::Config;
use demo::DemoService;

struct Args {
    config_path: Option<String>,
}

fn parse_args() -> Args {
    let mut result = Args { config_path: None };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ if !arg.starts_with('-') => result.config_path = Some(arg),
            _ => tracing::warn!("Unknown argument: {}", arg),
        }
    }
    result
}

fn print_help() {
    eprintln!(
        r#"veapd - VEAP server daemon

Usage: veapd [OPTIONS] [config.toml]

Options:
  -h, --help    Print this help message

Without a config file the server listens on 0.0.0.0:2121 and serves an
in-memory demo tree.
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veapd=info,veap_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args();
    let config = match &args.config_path {
        Some(path) => {
            tracing::info!("Loading config from: {}", path);
            Config::load(path)?
        }
        None => Config::default(),
    };

    let service = Arc::new(DefaultMetaService::new(DemoService::with_demo_tree()));
    let handler = Arc::new(
        Handler::new(service)
            .with_url_prefix(config.server.url_prefix.clone())
            .with_request_size_limit(config.server.request_size_limit)
            .with_history_size_limit(config.server.history_size_limit),
    );
    let app = router(handler);

    let addr: SocketAddr = config.server.listen.parse()?;
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

//! redirect-ipv6 sidecar.
//!
//! ```text
//!                     ┌───────────────────────────────────────────────┐
//!                     │                 REDIRECT SIDECAR               │
//!   Client Request    │  ┌──────────┐   ┌────────────┐   ┌─────────┐  │
//!   ──────────────────┼─▶│ listener │──▶│  redirect  │──▶│  proxy  │──┼──▶ Backend
//!                     │  │ (TLS?)   │   │ middleware │   │ handler │  │
//!   Client Response   │  └──────────┘   │  (capture) │   └────┬────┘  │
//!   ◀─────────────────┼─────────────────│  (commit)  │◀───────┘       │
//!                     │                 └────────────┘                │
//!                     └───────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;

use redirect_ipv6::config::watcher::ConfigWatcher;
use redirect_ipv6::config::{load_config, AppConfig};
use redirect_ipv6::http::HttpServer;
use redirect_ipv6::net::tls::load_tls_config;
use redirect_ipv6::observability::{logging, metrics};
use redirect_ipv6::RedirectLocation;

#[derive(Parser)]
#[command(name = "redirect-ipv6")]
#[command(about = "Reverse-proxy sidecar fixing redirect locations for IPv6 clients", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "redirect-ipv6.toml")]
    config: PathBuf,

    /// Validate the configuration, print the redirect settings and exit.
    #[arg(long)]
    check: bool,

    /// Reload the redirect settings when the configuration file changes.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if cli.check {
        return check(&config);
    }

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "redirect-ipv6 starting"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let server = HttpServer::new(config.clone())?;

    // Dropping the watcher stops reloads, keep it for the lifetime of the server.
    let _watcher = if cli.watch {
        let (watcher, mut updates) = ConfigWatcher::new(&cli.config, &config.redirect);
        let watcher = watcher.run()?;
        let redirect = server.redirect_handle();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                if let Err(e) = redirect.reload(&new_config.redirect) {
                    tracing::error!(error = %e, "Rejected redirect configuration, keeping current instance");
                }
            }
        });
        Some(watcher)
    } else {
        None
    };

    match &config.listener.tls {
        Some(tls) => {
            let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
            server.run_tls(config.listener.bind_address.parse()?, rustls).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Compile the redirect settings and print them.
fn check(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let redirect = RedirectLocation::new(&config.redirect)?;
    println!("{}", serde_json::to_string_pretty(&config.redirect)?);
    println!(
        "Configuration OK: {} rewrite rule(s), default handling {}",
        redirect.rules().len(),
        if redirect.rules().default_handling() { "on" } else { "off" }
    );
    Ok(())
}

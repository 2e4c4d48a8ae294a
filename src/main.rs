//! Application entry point for the `evapcool-monitor` service.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Connecting to the telemetry store (REST or in-memory)
//! - Optionally seeding the store with reference test data
//! - Starting the orchestrator run loop
//! - Binding the Axum HTTP server and serving until Ctrl-C
//!
//! # Environment Variables
//! - `STORE_URL` (**required**) – telemetry tree base URL, or `memory://`
//! - `EVAP_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `EVAP_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list.
use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{anyhow, Result};
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use evapcool::{config, routes, MemoryStore, Orchestrator, RawSnapshot, RestStore, TelemetryStore};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let store: Arc<dyn TelemetryStore> = if cfg.uses_memory_store() {
        tracing::info!("Using in-process telemetry store seeded with test data");
        Arc::new(MemoryStore::with_test_data())
    } else {
        let rest = RestStore::new(
            &cfg.store_url,
            cfg.store_auth.clone(),
            cfg.poll_interval,
            cfg.write_timeout,
        )
        .map_err(|e| anyhow!("Failed to build store client for '{}': {}", cfg.store_url, e))?;
        Arc::new(rest)
    };

    if cfg.seed_test_data {
        store
            .seed(&RawSnapshot::test_data())
            .await
            .map_err(|e| anyhow!("Failed to seed test data: {}", e))?;
        tracing::info!("Test data written to store");
    }

    let orchestrator = Arc::new(Orchestrator::new(store, cfg.orchestrator_config()));
    orchestrator.start().await;

    // Build app from routes gateway
    let app: Router = routes::router(Arc::clone(&orchestrator));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, shutting down orchestrator");
    orchestrator.stop().await;

    Ok(())
}

// ---

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Default filter when `RUST_LOG` is unset.
///
/// `level` comes from `EVAP_LOG_LEVEL`; anything unrecognised means `debug`.
/// The REST store polls every couple of seconds, so the HTTP client crates
/// are held at `warn` or they drown out watchdog and command events.
fn default_filter(level: Option<&str>) -> String {
    // ---
    let level = match level {
        Some(l @ ("trace" | "debug" | "info" | "warn" | "error")) => l,
        _ => "debug",
    };
    format!("{level},hyper=warn,hyper_util=warn,reqwest=warn")
}

/// Install the global subscriber. Call once, before the config is loaded,
/// so configuration errors are logged too.
///
/// - `RUST_LOG` wins outright; otherwise [`default_filter`] on `EVAP_LOG_LEVEL`
/// - `EVAP_SPAN_EVENTS=full|enter_exit` adds span events (default: close only)
/// - `FORCE_COLOR=1|0` overrides TTY detection on stdout
fn init_tracing() {
    // ---
    let span_events = match env::var("EVAP_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_filter(env::var("EVAP_LOG_LEVEL").ok().as_deref()))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        // ---
        assert_eq!(default_filter(Some("info")), "info,hyper=warn,hyper_util=warn,reqwest=warn");
        assert!(default_filter(None).starts_with("debug,"));
        assert!(default_filter(Some("loud")).starts_with("debug,"));
    }

    #[test]
    fn test_default_filter_parses() {
        // ---
        for level in ["trace", "error", "bogus"] {
            assert!(default_filter(Some(level)).parse::<EnvFilter>().is_ok());
        }
    }
}

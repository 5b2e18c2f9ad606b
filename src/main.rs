use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use ftc_lending::{
    LendingConfig, LendingEngine,
    api::{LendingApiState, SecurityMiddlewareConfig, SecurityState, create_app},
    config::sanitize_for_logging,
};

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates roles and security settings
    let config = LendingConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check FTC_* environment variables.");
        e
    })?;

    init_secure_logging(&config)?;

    info!("Starting FTC micro-lending engine");
    info!(
        admin = %config.engine.admin,
        loan_system = %config.engine.loan_system,
        event_capacity = config.engine.event_capacity,
        tiers = config.engine.tiers.tiers.len(),
        "Engine roles"
    );

    let engine = LendingEngine::new(config.engine.to_settings())
        .context("Failed to initialize lending engine")?;
    let engine = Arc::new(engine);

    let security_config = SecurityMiddlewareConfig::from(&config);
    if config.logging.sanitize_logs {
        for key in &security_config.api_keys {
            info!("API key loaded: {}", sanitize_for_logging(key));
        }
    } else {
        warn!("Log sanitization disabled - request metadata is logged verbatim");
    }
    let security_state = SecurityState::new(security_config);

    // Expired rate limit windows would otherwise accumulate per client IP
    let rate_limiter = security_state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            rate_limiter.cleanup();
        }
    });

    let app = create_app(LendingApiState::new(engine), security_state)
        .layer(TraceLayer::new_for_http());

    let bind_addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Lending API listening on {}", bind_addr);
    info!(
        "Security middleware: Auth={}, Rate limit={}/min, Max body={}KB",
        config.security.enable_auth,
        config.security.rate_limit_per_minute,
        config.security.max_request_size / 1024
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize logging at the configured level
fn init_secure_logging(config: &LendingConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Secure logging initialized with data sanitization enabled");
    }

    Ok(())
}

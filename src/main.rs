use std::time::Duration;

use tracing::error;

mod app;
mod auth;
mod config;
mod error;
mod middleware;
mod state;

use crate::middleware::rate_limit::RateLimiter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    // Startup failures are fatal: one diagnostic, then exit. No
    // partially-started process.
    let config = match config::AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let state = match state::AppState::init(config).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "storage connection failed");
            std::process::exit(1);
        }
    };

    if let Err(e) = sqlx::migrate!().run(&state.db).await {
        error!(error = %e, "database migration failed");
        std::process::exit(1);
    }

    let limiter = RateLimiter::new(&state.config.rate_limit);
    {
        let limiter = limiter.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(60));
            loop {
                tick.tick().await;
                limiter.cleanup();
            }
        });
    }

    let config = state.config.clone();
    let app = app::build_app(state, limiter);
    if let Err(e) = app::serve(app, &config).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "keygate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::{Router, routing::get};
use chrono::Utc;
use dotenv::dotenv;
use serde_json::json;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

mod api_client;
mod cache;
mod csv_store;
mod format;
mod models;
mod service;

use crate::api_client::{FmpProfileClient, MarketData, YahooQuoteClient};
use crate::csv_store::{FileCsvStore, HoldingStore};
use crate::format::{display_summary, display_table, render_text};
use crate::models::PortfolioReport;
use crate::service::aggregate;

#[derive(Clone)]
struct AppState {
    market: Arc<MarketData>,
    holdings_path: String,
    market_suffix: String,
    fetch_concurrency: usize,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// One full refresh pass: read the holdings CSV, fan out the per-row
/// fetches through the caches, aggregate. A malformed CSV halts here,
/// before any network call; fetch failures never fail the pass.
async fn load_report(state: &AppState) -> Result<PortfolioReport, (StatusCode, Json<serde_json::Value>)> {
    let holdings = match FileCsvStore.read_holdings(&state.holdings_path) {
        Ok(h) => h,
        Err(e) => {
            error!(path = %state.holdings_path, error = %e, "Failed reading holdings");
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": format!("Failed reading holdings: {}", e)})),
            ));
        }
    };

    let results = state
        .market
        .fetch_all(&holdings, &state.market_suffix, state.fetch_concurrency)
        .await;
    let (quotes, profiles): (Vec<_>, Vec<_>) = results.into_iter().unzip();
    let failed = quotes.iter().filter(|q| q.price.is_none()).count();
    if failed > 0 {
        warn!(failed, total = holdings.len(), "Some quotes unavailable this pass");
    }
    info!(holdings = holdings.len(), "Computed portfolio report");

    Ok(aggregate(&holdings, &quotes, &profiles))
}

#[tracing::instrument(skip(state))]
async fn api_portfolio(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let report = load_report(&state).await?;
    Ok(Json(json!({
        "rows": report.rows,
        "summary": report.summary,
        "refreshed_at": Utc::now().to_rfc3339(),
    })))
}

#[tracing::instrument(skip(state))]
async fn api_portfolio_table(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let report = load_report(&state).await?;
    Ok(Json(json!({
        "rows": display_table(&report),
        "summary": display_summary(&report),
        "refreshed_at": Utc::now().to_rfc3339(),
    })))
}

#[tracing::instrument(skip(state))]
async fn dashboard(State(state): State<AppState>) -> Result<String, (StatusCode, Json<serde_json::Value>)> {
    let report = load_report(&state).await?;
    Ok(render_text(&report, &Utc::now().to_rfc3339()))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/portfolio", get(api_portfolio))
        .route("/api/portfolio/table", get(api_portfolio_table))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let quote_ttl = Duration::from_secs(env_u64_or("QUOTE_TTL_SECS", 1800));
    let profile_ttl = Duration::from_secs(env_u64_or("PROFILE_TTL_SECS", 86400));
    let market = Arc::new(MarketData::new(
        Arc::new(YahooQuoteClient::new()?),
        Arc::new(FmpProfileClient::new(env_or("FMP_API_KEY", "demo"))?),
        quote_ttl,
        profile_ttl,
    ));

    let state = AppState {
        market,
        holdings_path: env_or("HOLDINGS_CSV", "portfolio.csv"),
        market_suffix: env_or("MARKET_SUFFIX", ".L"),
        fetch_concurrency: env_u64_or("FETCH_CONCURRENCY", 4) as usize,
    };
    info!(
        holdings = %state.holdings_path,
        quote_ttl_secs = quote_ttl.as_secs(),
        profile_ttl_secs = profile_ttl.as_secs(),
        "Starting income dashboard"
    );

    serve(router(state), env_u64_or("PORT", 3001) as u16).await;
    Ok(())
}

async fn serve(app: Router, port: u16) {
    // Try to bind to the requested port; if it's in use, try a few subsequent ports.
    let max_attempts = 10;
    for offset in 0..max_attempts {
        let try_port = port + offset;
        let addr = SocketAddr::from(([127, 0, 0, 1], try_port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                println!("Listening on {}", addr);
                if let Err(e) = axum::serve(listener, app).await {
                    error!(error = %e, "Server failed while serving");
                }
                return;
            }
            Err(e) => {
                warn!(port = try_port, error = %e, "Port unavailable, trying next");
            }
        }
    }
    error!(
        "Failed to bind to any port in range {}..{}",
        port,
        port + max_attempts - 1
    );
}

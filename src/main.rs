mod config;
mod db;
mod error;
mod handlers;
mod market;
mod middleware;
mod models;
mod state;
mod valuation;

use axum::{
    http::{HeaderValue, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use config::Config;
use handlers::{
    add_stock, get_historical, get_performance, get_portfolio, get_price, get_prices,
    get_profile, get_sectors, get_sectors_with_companies, get_symbols_by_name, login, register,
    remove_stock, search, update_stock, validate,
};
use market::MarketDataClient;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockfolio=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let pool = db::create_pool(&config).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let market = MarketDataClient::new(config.finnhub_api_key.clone());
    let state = AppState {
        pool,
        config: config.clone(),
        market,
    };

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/validate", get(validate))
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/portfolio/add", post(add_stock))
        .route("/api/portfolio/update/:symbol", put(update_stock))
        .route("/api/portfolio/remove/:symbol", delete(remove_stock))
        .route("/api/portfolio/performance", get(get_performance))
        .route("/api/stocks/price/:symbol", get(get_price))
        .route("/api/stocks/prices", post(get_prices))
        .route("/api/stocks/search", get(search))
        .route("/api/stocks/profile/:symbol", get(get_profile))
        .route("/api/stocks/historical/:symbol", get(get_historical))
        .route("/api/stocks/sectors", get(get_sectors))
        .route("/api/stocks/sectors/companies", get(get_sectors_with_companies))
        .route("/api/stocks/symbol/:name", get(get_symbols_by_name))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("server listening on http://{addr}");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Route not found" })),
    )
}

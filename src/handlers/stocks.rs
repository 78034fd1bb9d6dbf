use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{
    error::AppError,
    models::{CandlePoint, CompanyProfile, Quote, Sector, SectorCompany, SectorListing, SymbolMatch},
    state::AppState,
};

pub async fn get_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(state.market.quote(symbol.trim()).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PricesRequest {
    pub symbols: Vec<String>,
}

pub async fn get_prices(
    State(state): State<AppState>,
    Json(req): Json<PricesRequest>,
) -> Result<Json<Vec<Quote>>, AppError> {
    if req.symbols.is_empty() {
        return Err(AppError::validation("At least one symbol is required"));
    }
    Ok(Json(state.market.quotes(&req.symbols).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub query: String,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SymbolMatch>>, AppError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(AppError::validation("Search query is required"));
    }
    Ok(Json(state.market.search(query).await?))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<CompanyProfile>, AppError> {
    Ok(Json(state.market.company_profile(symbol.trim()).await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub resolution: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

pub async fn get_historical(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<CandlePoint>>, AppError> {
    let to = params.to.unwrap_or_else(|| Utc::now().timestamp());
    let from = params
        .from
        .unwrap_or_else(|| (Utc::now() - Duration::days(365)).timestamp());
    if from >= to {
        return Err(AppError::validation("Time range start must precede its end"));
    }

    let resolution = params.resolution.as_deref().unwrap_or("D");
    let candles = state
        .market
        .candles(symbol.trim(), resolution, from, to)
        .await?;

    Ok(Json(candles))
}

pub async fn get_sectors(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let keys: Vec<String> = sqlx::query_scalar("SELECT DISTINCT sector FROM sector_companies")
        .fetch_all(&state.pool)
        .await?;

    let mut sectors = Vec::with_capacity(keys.len());
    for key in keys {
        sectors.push(parse_sector(&key)?);
    }
    sectors.sort();

    Ok(Json(
        sectors.into_iter().map(|s| s.as_str().to_string()).collect(),
    ))
}

pub async fn get_sectors_with_companies(
    State(state): State<AppState>,
) -> Result<Json<Vec<SectorListing>>, AppError> {
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT sector, name, symbol FROM sector_companies ORDER BY sector, position",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut listings: Vec<(Sector, SectorListing)> = Vec::new();
    for (key, name, symbol) in rows {
        let sector = parse_sector(&key)?;
        let company = SectorCompany { name, symbol };
        match listings.iter_mut().find(|(s, _)| *s == sector) {
            Some((_, listing)) => listing.companies.push(company),
            None => listings.push((
                sector,
                SectorListing {
                    sector: sector.as_str().to_string(),
                    companies: vec![company],
                },
            )),
        }
    }
    listings.sort_by_key(|(sector, _)| *sector);

    Ok(Json(listings.into_iter().map(|(_, l)| l).collect()))
}

pub async fn get_symbols_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let symbols: Vec<String> = sqlx::query_scalar(
        "SELECT symbol FROM sector_companies WHERE name = $1 ORDER BY sector, position",
    )
    .bind(name.trim())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(symbols))
}

fn parse_sector(key: &str) -> Result<Sector, AppError> {
    Sector::parse(key).ok_or_else(|| {
        AppError::Internal(format!("unknown sector key in reference data: {key}"))
    })
}

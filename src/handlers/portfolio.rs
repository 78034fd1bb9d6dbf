use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        AddStockRequest, Holding, HoldingPosition, OverallPerformance, PerformanceEntry,
        PerformanceResponse, PortfolioResponse, Quote, UpdateStockRequest,
    },
    state::AppState,
    valuation,
};

pub async fn get_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PortfolioResponse>, AppError> {
    // Lazily create the portfolio on first access.
    sqlx::query("INSERT INTO portfolios (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(auth.id)
        .execute(&state.pool)
        .await?;

    let holdings = load_holdings(&state, auth.id).await?;

    let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
    let quotes = state.market.quote_map(&symbols).await;

    let holdings: Vec<HoldingPosition> = holdings
        .into_iter()
        .map(|holding| {
            let quote = quotes.get(&holding.symbol);
            position_with_quote(holding, quote)
        })
        .collect();

    let summary = valuation::summarize(
        holdings
            .iter()
            .map(|p| (p.current_value, p.invested_value)),
    );

    Ok(Json(PortfolioResponse { holdings, summary }))
}

pub async fn add_stock(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<AddStockRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let symbol = req.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AppError::validation(
            "Symbol, quantity and buy price are required",
        ));
    }
    if !positive(req.quantity) || !positive(req.buy_price) {
        return Err(AppError::validation(
            "Quantity and buy price must be positive values",
        ));
    }

    // Existence check: the symbol must resolve upstream. The provider
    // answers unknown tickers with an all-zero quote rather than an error.
    match state.market.quote(&symbol).await {
        Ok(quote) if !quote.is_empty() => {}
        _ => return Err(AppError::validation("Invalid stock symbol")),
    }

    let mut tx = state.pool.begin().await?;
    let portfolio_id = lock_portfolio(&mut tx, auth.id).await?;

    let existing: Option<(f64, f64)> = sqlx::query_as(
        "SELECT quantity, average_buy_price FROM holdings WHERE portfolio_id = $1 AND symbol = $2",
    )
    .bind(portfolio_id)
    .bind(&symbol)
    .fetch_optional(&mut *tx)
    .await?;

    // Merge-buy: an existing position absorbs the new shares at the
    // quantity-weighted average; a fresh symbol starts a new holding.
    let holding: Holding = match existing {
        Some((quantity, average_buy_price)) => {
            let merged_average =
                valuation::merged_average(quantity, average_buy_price, req.quantity, req.buy_price);
            sqlx::query_as(
                r#"
                UPDATE holdings
                SET quantity = $3,
                    average_buy_price = $4,
                    transactions = array_append(transactions, 'BUY')
                WHERE portfolio_id = $1 AND symbol = $2
                RETURNING symbol, quantity, average_buy_price, transactions, purchase_date
                "#,
            )
            .bind(portfolio_id)
            .bind(&symbol)
            .bind(quantity + req.quantity)
            .bind(merged_average)
            .fetch_one(&mut *tx)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                INSERT INTO holdings (portfolio_id, symbol, quantity, average_buy_price, transactions)
                VALUES ($1, $2, $3, $4, ARRAY['BUY'])
                RETURNING symbol, quantity, average_buy_price, transactions, purchase_date
                "#,
            )
            .bind(portfolio_id)
            .bind(&symbol)
            .bind(req.quantity)
            .bind(req.buy_price)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Stock added to portfolio", "holding": holding })),
    ))
}

pub async fn update_stock(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(symbol): Path<String>,
    Json(req): Json<UpdateStockRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !positive(req.quantity) {
        return Err(AppError::validation("Valid quantity is required"));
    }
    if let Some(buy_price) = req.buy_price {
        if !positive(buy_price) {
            return Err(AppError::validation("Buy price must be a positive value"));
        }
    }

    let symbol = symbol.trim().to_uppercase();

    let mut tx = state.pool.begin().await?;
    let portfolio_id = find_portfolio(&mut tx, auth.id).await?;

    // Replace semantics: overwrites the stored figures directly, unlike the
    // weighted merge applied by add_stock.
    let updated = sqlx::query(
        r#"
        UPDATE holdings
        SET quantity = $3,
            average_buy_price = COALESCE($4, average_buy_price)
        WHERE portfolio_id = $1 AND symbol = $2
        "#,
    )
    .bind(portfolio_id)
    .bind(&symbol)
    .bind(req.quantity)
    .bind(req.buy_price)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::not_found("Stock not found in portfolio"));
    }

    tx.commit().await?;

    Ok(Json(json!({ "message": "Stock updated in portfolio" })))
}

pub async fn remove_stock(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(symbol): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let symbol = symbol.trim().to_uppercase();

    let mut tx = state.pool.begin().await?;
    let portfolio_id = find_portfolio(&mut tx, auth.id).await?;

    // Idempotent: removing a symbol that is not held is still a success.
    sqlx::query("DELETE FROM holdings WHERE portfolio_id = $1 AND symbol = $2")
        .bind(portfolio_id)
        .bind(&symbol)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({ "message": "Stock removed from portfolio" })))
}

pub async fn get_performance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PerformanceResponse>, AppError> {
    let holdings = load_holdings(&state, auth.id).await?;

    if holdings.is_empty() {
        return Ok(Json(PerformanceResponse {
            performance: Vec::new(),
            overall: OverallPerformance::default(),
        }));
    }

    let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
    let quotes = state.market.quote_map(&symbols).await;

    let performance: Vec<PerformanceEntry> = holdings
        .into_iter()
        .map(|holding| {
            let quote = quotes.get(&holding.symbol);
            let (current_price, daily_change) = quote
                .map(|q| (q.current_price, q.percent_change))
                .unwrap_or((0.0, 0.0));
            let value =
                valuation::value_position(holding.quantity, holding.average_buy_price, current_price);

            PerformanceEntry {
                symbol: holding.symbol,
                quantity: holding.quantity,
                average_buy_price: holding.average_buy_price,
                current_price,
                current_value: value.current_value,
                invested_value: value.invested_value,
                profit_loss: value.profit_loss,
                profit_loss_percentage: value.profit_loss_percentage,
                daily_change,
            }
        })
        .collect();

    let overall: OverallPerformance = valuation::summarize(
        performance
            .iter()
            .map(|p| (p.current_value, p.invested_value)),
    )
    .into();

    Ok(Json(PerformanceResponse {
        performance,
        overall,
    }))
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

async fn load_holdings(state: &AppState, user_id: Uuid) -> Result<Vec<Holding>, AppError> {
    let holdings = sqlx::query_as::<_, Holding>(
        r#"
        SELECT h.symbol, h.quantity, h.average_buy_price, h.transactions, h.purchase_date
        FROM holdings h
        JOIN portfolios p ON h.portfolio_id = p.id
        WHERE p.user_id = $1
        ORDER BY h.purchase_date, h.symbol
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(holdings)
}

/// Upserts the user's portfolio row and takes its row lock, serializing
/// concurrent holding mutations for the same user until commit.
async fn lock_portfolio(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Uuid, AppError> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO portfolios (user_id) VALUES ($1)
        ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

/// Locks the user's portfolio row without creating one; 404 when absent.
async fn find_portfolio(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Uuid, AppError> {
    let id: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM portfolios WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

    id.ok_or_else(|| AppError::not_found("Portfolio not found"))
}

fn position_with_quote(holding: Holding, quote: Option<&Quote>) -> HoldingPosition {
    // A symbol with no quote degrades to price 0 instead of failing the
    // whole request.
    let (current_price, percent_change) = quote
        .map(|q| (q.current_price, q.percent_change))
        .unwrap_or((0.0, 0.0));
    let value =
        valuation::value_position(holding.quantity, holding.average_buy_price, current_price);

    HoldingPosition {
        symbol: holding.symbol,
        quantity: holding.quantity,
        average_buy_price: holding.average_buy_price,
        transactions: holding.transactions,
        purchase_date: holding.purchase_date,
        current_price,
        current_value: value.current_value,
        invested_value: value.invested_value,
        profit_loss: value.profit_loss,
        profit_loss_percentage: value.profit_loss_percentage,
        percent_change,
    }
}

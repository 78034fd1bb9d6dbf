use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::valuation::PortfolioSummary;

/// A stored position in one symbol. `average_buy_price` is the
/// quantity-weighted mean across all recorded buys.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub average_buy_price: f64,
    pub transactions: Vec<String>,
    pub purchase_date: DateTime<Utc>,
}

// Defaults keep omitted fields inside the handlers' own validation.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AddStockRequest {
    pub symbol: String,
    pub quantity: f64,
    pub buy_price: f64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateStockRequest {
    pub quantity: f64,
    pub buy_price: Option<f64>,
}

/// A holding merged with its live quote and the derived value figures.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HoldingPosition {
    pub symbol: String,
    pub quantity: f64,
    pub average_buy_price: f64,
    pub transactions: Vec<String>,
    pub purchase_date: DateTime<Utc>,
    pub current_price: f64,
    pub current_value: f64,
    pub invested_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percentage: f64,
    pub percent_change: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PortfolioResponse {
    pub holdings: Vec<HoldingPosition>,
    pub summary: PortfolioSummary,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    pub symbol: String,
    pub quantity: f64,
    pub average_buy_price: f64,
    pub current_price: f64,
    pub current_value: f64,
    pub invested_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percentage: f64,
    pub daily_change: f64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverallPerformance {
    pub total_current_value: f64,
    pub total_invested_value: f64,
    pub total_return: f64,
    pub total_return_percentage: f64,
}

impl From<PortfolioSummary> for OverallPerformance {
    fn from(summary: PortfolioSummary) -> Self {
        Self {
            total_current_value: summary.total_current_value,
            total_invested_value: summary.total_invested_value,
            total_return: summary.total_profit_loss,
            total_return_percentage: summary.total_profit_loss_percentage,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PerformanceResponse {
    pub performance: Vec<PerformanceEntry>,
    pub overall: OverallPerformance,
}

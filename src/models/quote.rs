use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Point-in-time price snapshot for one symbol. Produced fresh on every
/// request; nothing here is persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub current_price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub open_price: f64,
    pub previous_close: f64,
    pub timestamp: i64,
}

impl Quote {
    /// Finnhub answers unknown tickers with an all-zero body instead of an
    /// error status; such a quote does not resolve the symbol.
    pub fn is_empty(&self) -> bool {
        self.current_price == 0.0
            && self.previous_close == 0.0
            && self.open_price == 0.0
            && self.timestamp == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMatch {
    pub description: String,
    pub display_symbol: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyProfile {
    pub country: String,
    pub currency: String,
    pub exchange: String,
    pub finnhub_industry: String,
    pub ipo: String,
    pub logo: String,
    pub market_capitalization: f64,
    pub name: String,
    pub phone: String,
    pub share_outstanding: f64,
    pub ticker: String,
    pub weburl: String,
}

/// One daily bar from the historical endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandlePoint {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

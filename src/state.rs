use sqlx::PgPool;

use crate::config::Config;
use crate::market::MarketDataClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub market: MarketDataClient,
}

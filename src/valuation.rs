//! Portfolio valuation math. Pure functions, no I/O.

use serde::Serialize;
use utoipa::ToSchema;

/// Derived value figures for one holding at a given market price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldingValuation {
    pub current_value: f64,
    pub invested_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percentage: f64,
}

/// Portfolio-level totals across all holdings.
#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_current_value: f64,
    pub total_invested_value: f64,
    pub total_profit_loss: f64,
    pub total_profit_loss_percentage: f64,
}

/// Values a position of `quantity` shares with cost basis
/// `average_buy_price` at `current_price`. The percentage return is defined
/// as 0 when nothing is invested.
pub fn value_position(quantity: f64, average_buy_price: f64, current_price: f64) -> HoldingValuation {
    let current_value = quantity * current_price;
    let invested_value = quantity * average_buy_price;
    let profit_loss = current_value - invested_value;
    let profit_loss_percentage = if invested_value > 0.0 {
        profit_loss / invested_value * 100.0
    } else {
        0.0
    };

    HoldingValuation {
        current_value,
        invested_value,
        profit_loss,
        profit_loss_percentage,
    }
}

/// Quantity-weighted mean cost basis after buying `added_quantity` more
/// shares at `buy_price`. Callers ensure both quantities are positive.
pub fn merged_average(
    quantity: f64,
    average_buy_price: f64,
    added_quantity: f64,
    buy_price: f64,
) -> f64 {
    let total_cost = quantity * average_buy_price + added_quantity * buy_price;
    total_cost / (quantity + added_quantity)
}

/// Aggregates `(current_value, invested_value)` pairs into portfolio totals.
pub fn summarize(values: impl IntoIterator<Item = (f64, f64)>) -> PortfolioSummary {
    let mut total_current_value = 0.0;
    let mut total_invested_value = 0.0;
    for (current, invested) in values {
        total_current_value += current;
        total_invested_value += invested;
    }

    let total_profit_loss = total_current_value - total_invested_value;
    let total_profit_loss_percentage = if total_invested_value > 0.0 {
        total_profit_loss / total_invested_value * 100.0
    } else {
        0.0
    };

    PortfolioSummary {
        total_current_value,
        total_invested_value,
        total_profit_loss,
        total_profit_loss_percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn position_math() {
        let v = value_position(10.0, 150.0, 160.0);
        assert!((v.current_value - 1600.0).abs() < EPS);
        assert!((v.invested_value - 1500.0).abs() < EPS);
        assert!((v.profit_loss - 100.0).abs() < EPS);
        assert!((v.profit_loss_percentage - 100.0 / 15.0).abs() < EPS);
    }

    #[test]
    fn zero_invested_value_yields_zero_percentage() {
        let v = value_position(0.0, 0.0, 123.45);
        assert_eq!(v.invested_value, 0.0);
        assert_eq!(v.profit_loss_percentage, 0.0);

        // Free shares: invested 0, current value positive.
        let v = value_position(5.0, 0.0, 100.0);
        assert_eq!(v.invested_value, 0.0);
        assert_eq!(v.profit_loss_percentage, 0.0);
    }

    #[test]
    fn weighted_average_across_two_buys() {
        // 10 @ 150 then 5 @ 180 -> 15 @ 160.
        let average = merged_average(10.0, 150.0, 5.0, 180.0);
        assert!((average - 160.0).abs() < EPS);
    }

    #[test]
    fn weighted_average_general_form() {
        let (q1, p1, q2, p2) = (3.5, 42.17, 7.25, 98.4);
        let average = merged_average(q1, p1, q2, p2);
        assert!((average - (q1 * p1 + q2 * p2) / (q1 + q2)).abs() < EPS);
    }

    #[test]
    fn summary_aggregates_across_holdings() {
        let summary = summarize([(1600.0, 1500.0), (400.0, 500.0)]);
        assert!((summary.total_current_value - 2000.0).abs() < EPS);
        assert!((summary.total_invested_value - 2000.0).abs() < EPS);
        assert!(summary.total_profit_loss.abs() < EPS);
        assert!(summary.total_profit_loss_percentage.abs() < EPS);
    }

    #[test]
    fn empty_portfolio_summary_is_zeroed() {
        let summary = summarize(std::iter::empty::<(f64, f64)>());
        assert_eq!(summary.total_current_value, 0.0);
        assert_eq!(summary.total_invested_value, 0.0);
        assert_eq!(summary.total_profit_loss, 0.0);
        assert_eq!(summary.total_profit_loss_percentage, 0.0);
    }
}

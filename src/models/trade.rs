use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One row of an imported broker trade log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Local wall-clock time as written in the export
    pub time: NaiveDateTime,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "type", default)]
    pub trade_type: String,
    #[serde(default)]
    pub lots: f64,
    #[serde(default)]
    pub profit: f64,
}

/// Per-week trade statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeekStats {
    pub number_of_trades: u32,
    pub pnl: f64,
}

impl WeekStats {
    /// Count and rounded PnL of `trades`
    pub fn from_trades(trades: &[TradeRecord]) -> Self {
        let total: f64 = trades.iter().map(|t| t.profit).sum();
        Self {
            number_of_trades: trades.len() as u32,
            pnl: round_currency(total),
        }
    }
}

/// Nudge applied in cents so half-cent inputs stored just below the
/// half (1.005 is 1.00499..) still round away from zero
const HALF_CENT_NUDGE: f64 = 1e-9;

/// Two-decimal rounding, half away from zero
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0 + HALF_CENT_NUDGE.copysign(value)).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_currency_sums_mixed_profits() {
        let total = 10.005 + 5.00 + -2.005;
        assert_eq!(round_currency(total), 13.0);
        assert_eq!(round_currency(-0.125), -0.13);
        assert_eq!(round_currency(0.0), 0.0);
    }

    #[test]
    fn test_round_currency_half_cents_go_away_from_zero() {
        assert_eq!(round_currency(1.005), 1.01);
        assert_eq!(round_currency(-1.005), -1.01);
        assert_eq!(round_currency(2.675), 2.68);
        assert_eq!(round_currency(10.005), 10.01);
        assert_eq!(round_currency(1.004), 1.0);
        assert_eq!(round_currency(-2.994), -2.99);
    }

    #[test]
    fn test_trade_type_uses_type_key() {
        let json = r#"{"time":"2026-10-12T09:30:00","symbol":"EURUSD","type":"buy","lots":0.5,"profit":12.5}"#;
        let trade: TradeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(trade.trade_type, "buy");

        let back = serde_json::to_value(&trade).unwrap();
        assert_eq!(back["type"], "buy");
    }
}

use crate::domain::intake::Intake;
use crate::metrics::{position_value, round2};
use serde::Serialize;

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingRow {
    pub label: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

fn first_non_empty(candidates: [&Option<String>; 2]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .cloned()
}

fn name_or(name: &str, fallback: &str) -> String {
    if name.trim().is_empty() {
        fallback.to_string()
    } else {
        name.to_string()
    }
}

/// Largest liquid positions (crypto then equity), at most five, stable on ties.
pub fn top_holdings(intake: &Intake) -> Vec<HoldingRow> {
    let crypto = intake.crypto.iter().map(|h| HoldingRow {
        label: name_or(&h.symbol, "Crypto"),
        value: position_value(&h.qty, &h.avg_cost),
        meta: first_non_empty([&h.chain, &h.venue]),
    });
    let equity = intake.equity.iter().map(|h| HoldingRow {
        label: name_or(&h.ticker, "Equity"),
        value: position_value(&h.qty, &h.avg_cost),
        meta: first_non_empty([&h.market, &h.sector]),
    });

    let mut rows: Vec<HoldingRow> = crypto.chain(equity).collect();
    rows.sort_by(|a, b| b.value.total_cmp(&a.value));
    rows.truncate(TOP_N);
    for row in &mut rows {
        row.value = round2(row.value);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn returns_at_most_five_sorted_descending() {
        let intake: Intake = serde_json::from_value(json!({
            "crypto": [
                {"symbol": "BTC", "qty": "1", "avgCost": "500", "chain": "bitcoin"},
                {"symbol": "ETH", "qty": "2", "avgCost": "100", "venue": "upbit"},
                {"symbol": "", "qty": "7"}
            ],
            "equity": [
                {"ticker": "AAPL", "qty": "3", "avgCost": "150", "market": "NASDAQ"},
                {"ticker": "005930", "qty": "10", "avgCost": "70", "sector": "semis"},
                {"ticker": "MSFT", "qty": "1", "avgCost": "400.123"}
            ]
        }))
        .unwrap();

        let rows = top_holdings(&intake);
        let labels: Vec<_> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["005930", "BTC", "AAPL", "MSFT", "ETH"]);
        assert_eq!(rows[0].meta.as_deref(), Some("semis"));
        assert_eq!(rows[1].meta.as_deref(), Some("bitcoin"));
        assert_eq!(rows[3].value, 400.12);
        assert!(rows.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn ties_keep_input_order() {
        let intake: Intake = serde_json::from_value(json!({
            "crypto": [{"symbol": "AAA", "qty": "10"}],
            "equity": [{"ticker": "BBB", "qty": "10"}, {"ticker": "", "qty": "10"}]
        }))
        .unwrap();

        let labels: Vec<_> = top_holdings(&intake).into_iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["AAA", "BBB", "Equity"]);
    }
}

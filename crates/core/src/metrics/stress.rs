use crate::domain::intake::Intake;
use crate::metrics::{position_value, round2};
use serde::Serialize;

/// (shock in percent, multiplier)
const SHOCKS: [(i32, f64); 3] = [(-5, 0.95), (-10, 0.90), (-20, 0.80)];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressRow {
    pub scenario: String,
    pub shock_pct: i32,
    pub value: f64,
    pub loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressTable {
    /// Unshocked crypto + equity value.
    pub base: f64,
    pub table: Vec<StressRow>,
}

/// Applies fixed market shocks to the liquid (crypto and equity) book.
pub fn stress_test(intake: &Intake) -> StressTable {
    let base: f64 = intake
        .crypto
        .iter()
        .map(|h| position_value(&h.qty, &h.avg_cost))
        .chain(
            intake
                .equity
                .iter()
                .map(|h| position_value(&h.qty, &h.avg_cost)),
        )
        .sum();

    let table = SHOCKS
        .iter()
        .map(|&(shock_pct, multiplier)| {
            let value = base * multiplier;
            StressRow {
                scenario: format!("{shock_pct}%"),
                shock_pct,
                value: round2(value),
                loss: round2(base - value),
            }
        })
        .collect();

    StressTable {
        base: round2(base),
        table,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shocks_liquid_book_of_one_thousand() {
        let intake: Intake = serde_json::from_value(json!({
            "crypto": [{"symbol": "BTC", "qty": "2", "avgCost": "300"}],
            "equity": [{"ticker": "AAPL", "qty": "4", "avgCost": "100"}],
            "realestate": [{"price": "900000"}],
            "cash": {"amount": "50000"}
        }))
        .unwrap();

        let stress = stress_test(&intake);
        assert_eq!(stress.base, 1000.0);
        let rows: Vec<_> = stress
            .table
            .iter()
            .map(|r| (r.shock_pct, r.value, r.loss))
            .collect();
        assert_eq!(
            rows,
            vec![(-5, 950.0, 50.0), (-10, 900.0, 100.0), (-20, 800.0, 200.0)]
        );
        assert_eq!(stress.table[0].scenario, "-5%");
    }

    #[test]
    fn empty_liquid_book_has_zero_losses() {
        let stress = stress_test(&Intake::default());
        assert_eq!(stress.table.len(), 3);
        assert!(stress.table.iter().all(|r| r.value == 0.0 && r.loss == 0.0));
    }
}

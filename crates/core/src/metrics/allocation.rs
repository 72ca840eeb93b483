use crate::domain::intake::{amount, AssetKind, Intake};
use crate::metrics::{position_value, round2};
use serde::Serialize;

/// Categories that carry value in the snapshot, in display order.
pub const VALUED_CATEGORIES: [AssetKind; 5] = [
    AssetKind::Crypto,
    AssetKind::Equity,
    AssetKind::RealEstate,
    AssetKind::Fixed,
    AssetKind::Cash,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSlice {
    pub label: AssetKind,
    /// Approximate value of the category.
    pub amount: f64,
    /// Share of the total, in percent, rounded to 2 decimals.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSnapshot {
    pub slices: Vec<AllocationSlice>,
    /// Sum of category values, floored at 1.
    pub total_value_approx: f64,
}

impl AllocationSnapshot {
    pub fn percent(&self, kind: AssetKind) -> f64 {
        self.slices
            .iter()
            .find(|s| s.label == kind)
            .map_or(0.0, |s| s.value)
    }

    pub fn percent_sum(&self) -> f64 {
        self.slices.iter().map(|s| s.value).sum()
    }
}

pub fn category_value(intake: &Intake, kind: AssetKind) -> f64 {
    match kind {
        AssetKind::Crypto => intake
            .crypto
            .iter()
            .map(|h| position_value(&h.qty, &h.avg_cost))
            .sum(),
        AssetKind::Equity => intake
            .equity
            .iter()
            .map(|h| position_value(&h.qty, &h.avg_cost))
            .sum(),
        AssetKind::RealEstate => intake.real_estate.iter().map(|h| amount(&h.price)).sum(),
        // Coupon plus duration is a sizing proxy, not a present value.
        AssetKind::Fixed => intake
            .fixed
            .iter()
            .map(|h| amount(&h.coupon) + amount(&h.duration))
            .sum(),
        AssetKind::Cash => amount(&intake.cash.amount),
        AssetKind::Other => 0.0,
    }
}

pub fn compute_allocation(intake: &Intake) -> AllocationSnapshot {
    let values: Vec<(AssetKind, f64)> = VALUED_CATEGORIES
        .iter()
        .map(|&kind| (kind, category_value(intake, kind)))
        .collect();

    let total = values.iter().map(|(_, v)| v).sum::<f64>().max(1.0);
    let slices = values
        .into_iter()
        .map(|(label, amount)| AllocationSlice {
            label,
            amount,
            value: round2(amount / total * 100.0),
        })
        .collect();

    AllocationSnapshot {
        slices,
        total_value_approx: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intake(v: serde_json::Value) -> Intake {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn values_each_category() {
        let intake = intake(json!({
            "crypto": [{"symbol": "BTC", "qty": "2", "avgCost": "100"}, {"symbol": "DOGE", "qty": "50"}],
            "equity": [{"ticker": "AAPL", "qty": "4", "avgCost": "not-a-number"}],
            "realestate": [{"price": "400"}, {"price": ""}],
            "fixed": [{"coupon": "4", "duration": "6"}],
            "cash": {"amount": "136"}
        }));

        let snap = compute_allocation(&intake);
        let amounts: Vec<_> = snap.slices.iter().map(|s| (s.label, s.amount)).collect();
        assert_eq!(
            amounts,
            vec![
                (AssetKind::Crypto, 250.0),
                (AssetKind::Equity, 4.0),
                (AssetKind::RealEstate, 400.0),
                (AssetKind::Fixed, 10.0),
                (AssetKind::Cash, 136.0),
            ]
        );
        assert_eq!(snap.total_value_approx, 800.0);
        assert_eq!(snap.percent(AssetKind::Crypto), 31.25);
        assert_eq!(snap.percent(AssetKind::Equity), 0.5);
        assert_eq!(snap.percent(AssetKind::RealEstate), 50.0);
        assert_eq!(snap.percent(AssetKind::Other), 0.0);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let intake = intake(json!({
            "crypto": [{"symbol": "SOL", "qty": "13", "avgCost": "171.3"}],
            "equity": [{"ticker": "NVDA", "qty": "7", "avgCost": "121.9"}, {"ticker": "TSLA", "qty": "3", "avgCost": "251.05"}],
            "realestate": [{"price": "333333"}],
            "fixed": [{"coupon": "3.3", "duration": "7.7"}],
            "cash": {"amount": "9999.99"}
        }));

        let snap = compute_allocation(&intake);
        assert!((snap.percent_sum() - 100.0).abs() <= 0.1, "sum = {}", snap.percent_sum());
        for slice in &snap.slices {
            assert!((0.0..=100.0).contains(&slice.value));
        }
    }

    #[test]
    fn all_zero_intake_yields_zero_percentages() {
        let snap = compute_allocation(&Intake::default());
        assert_eq!(snap.total_value_approx, 1.0);
        assert!(snap.slices.iter().all(|s| s.value == 0.0));
        assert_eq!(snap.slices.len(), VALUED_CATEGORIES.len());
    }
}

//! Financial derivations over a refined intake.
//!
//! Everything here is a pure function of its input: no I/O, no clock, no
//! environment. The report renderer calls these once per build.

pub mod allocation;
pub mod holdings;
pub mod insights;
pub mod scores;
pub mod stress;

pub use allocation::{compute_allocation, AllocationSlice, AllocationSnapshot};
pub use holdings::{top_holdings, HoldingRow};
pub use insights::insights;
pub use scores::{risk_and_fit, Scores};
pub use stress::{stress_test, StressRow, StressTable};

use crate::domain::intake::{amount, Amount, Intake};
use crate::domain::locale::ReportLocale;
use serde::Serialize;

/// All derived figures for one report, in the order the report shows them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub allocation: AllocationSnapshot,
    pub top_holdings: Vec<HoldingRow>,
    pub scores: Scores,
    pub stress: StressTable,
    pub insights: Vec<String>,
}

impl DerivedMetrics {
    pub fn derive(intake: &Intake, locale: ReportLocale) -> Self {
        let allocation = compute_allocation(intake);
        let scores = risk_and_fit(intake, &allocation);
        let insights = insights(intake, &allocation, &scores, locale);
        Self {
            top_holdings: top_holdings(intake),
            stress: stress_test(intake),
            allocation,
            scores,
            insights,
        }
    }
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub(crate) fn clamp_score(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// `quantity × cost basis`, where a missing, unparsable or zero cost basis
/// counts as 1.
pub(crate) fn position_value(qty: &Option<Amount>, avg_cost: &Option<Amount>) -> f64 {
    let cost = amount(avg_cost);
    let cost = if cost == 0.0 { 1.0 } else { cost };
    amount(qty) * cost
}

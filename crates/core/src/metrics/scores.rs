use crate::domain::intake::{AssetKind, Goal, Horizon, Intake, RiskLevel};
use crate::metrics::allocation::AllocationSnapshot;
use crate::metrics::clamp_score;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub risk_score: u8,
    pub fit_score: u8,
}

fn risk_base(risk: RiskLevel, horizon: Horizon) -> f64 {
    let level = match risk {
        RiskLevel::High => 80.0,
        RiskLevel::Mid => 50.0,
        RiskLevel::Low => 25.0,
    };
    let tilt = match horizon {
        Horizon::Long => 10.0,
        Horizon::Short => -10.0,
        Horizon::Mid => 0.0,
    };
    level + tilt
}

fn fit(goal: Goal, allocation: &AllocationSnapshot) -> f64 {
    let pct = |kind| allocation.percent(kind);
    let growth_tilt = pct(AssetKind::Equity) + pct(AssetKind::Crypto);
    let preserve_tilt = pct(AssetKind::Fixed) + pct(AssetKind::Cash);

    match goal {
        Goal::Growth => clamp_score(40.0 + growth_tilt * 0.6),
        Goal::Preserve => clamp_score(40.0 + preserve_tilt * 0.6),
        Goal::Income => clamp_score(35.0 + (preserve_tilt + pct(AssetKind::RealEstate)) * 0.5),
        Goal::Speculative => clamp_score(30.0 + (growth_tilt + pct(AssetKind::Crypto)) * 0.7),
    }
}

/// Risk tolerance and goal fit, both in `0..=100`.
pub fn risk_and_fit(intake: &Intake, allocation: &AllocationSnapshot) -> Scores {
    let profile = &intake.profile;
    let vol = clamp_score(profile.vol_pref());
    let loss = clamp_score(profile.loss_limit());
    let base = risk_base(profile.risk_level(), profile.horizon());

    let risk = clamp_score((0.5 * vol + 0.5 * (100.0 - loss) + base / 2.0).round());
    let fit = fit(profile.goal(), allocation).round();

    Scores {
        risk_score: risk as u8,
        fit_score: fit as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::allocation::compute_allocation;
    use serde_json::json;

    fn scores(v: serde_json::Value) -> Scores {
        let intake: Intake = serde_json::from_value(v).unwrap();
        let allocation = compute_allocation(&intake);
        risk_and_fit(&intake, &allocation)
    }

    #[test]
    fn aggressive_profile_saturates_risk() {
        let s = scores(json!({
            "profile": {"risk": "high", "horizon": "long", "goal": "growth", "volPref": 100, "lossLimit": 0}
        }));
        assert_eq!(s.risk_score, 100);
    }

    #[test]
    fn conservative_profile() {
        // 0.5*10 + 0.5*(100-10) + (25-10)/2 = 5 + 45 + 7.5 = 57.5 -> 58
        let s = scores(json!({
            "profile": {"risk": "low", "horizon": "short", "goal": "preserve", "volPref": 10, "lossLimit": 10}
        }));
        assert_eq!(s.risk_score, 58);
        // Empty portfolio: preserve tilt is 0.
        assert_eq!(s.fit_score, 40);
    }

    #[test]
    fn missing_profile_uses_defaults() {
        // mid/mid: base 50; vol 0, loss 0 -> 0 + 50 + 25 = 75
        let s = scores(json!({}));
        assert_eq!(s.risk_score, 75);
        assert_eq!(s.fit_score, 40);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let s = scores(json!({
            "profile": {"risk": "mid", "horizon": "mid", "volPref": 250, "lossLimit": -40}
        }));
        // clamp(250)=100, clamp(-40)=0 -> 50 + 50 + 25 = 125 -> 100
        assert_eq!(s.risk_score, 100);
    }

    #[test]
    fn fit_per_goal() {
        let holdings = json!({
            "crypto": [{"symbol": "BTC", "qty": "20"}],
            "equity": [{"ticker": "AAPL", "qty": "30"}],
            "realestate": [{"price": "20"}],
            "fixed": [{"coupon": "10", "duration": "0"}],
            "cash": {"amount": "20"}
        });
        // crypto 20%, equity 30%, realestate 20%, fixed 10%, cash 20%
        let with_goal = |goal: &str| {
            let mut v = holdings.clone();
            v["profile"] = json!({"goal": goal});
            scores(v).fit_score
        };

        assert_eq!(with_goal("growth"), 70); // 40 + 50*0.6
        assert_eq!(with_goal("preserve"), 58); // 40 + 30*0.6
        assert_eq!(with_goal("income"), 60); // 35 + 50*0.5
        assert_eq!(with_goal("speculative"), 79); // 30 + 70*0.7
    }

    #[test]
    fn speculative_fit_is_clamped() {
        let s = scores(json!({
            "profile": {"goal": "speculative"},
            "crypto": [{"symbol": "BTC", "qty": "100"}]
        }));
        // 30 + (100 + 100) * 0.7 = 170 -> 100
        assert_eq!(s.fit_score, 100);
    }
}

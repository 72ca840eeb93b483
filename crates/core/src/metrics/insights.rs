use crate::domain::intake::{AssetKind, Intake};
use crate::domain::locale::ReportLocale;
use crate::metrics::allocation::AllocationSnapshot;
use crate::metrics::scores::Scores;

const HIGH_RISK_SCORE: u8 = 70;
const LOW_RISK_SCORE: u8 = 35;
const LOW_CASH_PCT: f64 = 10.0;
const TIGHT_LOSS_LIMIT: f64 = 20.0;

/// Short rule-based observations printed under the gauges.
pub fn insights(
    intake: &Intake,
    allocation: &AllocationSnapshot,
    scores: &Scores,
    locale: ReportLocale,
) -> Vec<String> {
    let ko = locale == ReportLocale::Korean;
    let mut out = Vec::new();

    if scores.risk_score >= HIGH_RISK_SCORE {
        out.push(if ko {
            "변동성 허용도가 높은 편입니다.".to_string()
        } else {
            "Your tolerance for volatility is on the high side.".to_string()
        });
    } else if scores.risk_score <= LOW_RISK_SCORE {
        out.push(if ko {
            "보수적 성향으로 추정됩니다.".to_string()
        } else {
            "Your profile reads as conservative.".to_string()
        });
    }

    if allocation.percent(AssetKind::Cash) < LOW_CASH_PCT {
        out.push(if ko {
            "현금 비중이 낮아 유동성 리스크가 있습니다.".to_string()
        } else {
            "Cash is a small share of the portfolio, which leaves little liquidity buffer.".to_string()
        });
    }

    let loss_limit = intake.profile.loss_limit();
    if loss_limit <= TIGHT_LOSS_LIMIT {
        out.push(if ko {
            format!("손실허용 한도({loss_limit}%)에 민감합니다.")
        } else {
            format!("You are sensitive to drawdowns beyond your {loss_limit}% loss limit.")
        });
    }

    out
}

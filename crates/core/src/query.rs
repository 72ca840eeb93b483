use crate::domain::intake::Intake;

const MAX_SYMBOLS: usize = 6;

fn upper_symbols<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .take(MAX_SYMBOLS)
        .collect()
}

/// Builds the single web-search query for an intake.
pub fn compose_query(intake: &Intake) -> String {
    let mut parts = Vec::new();

    let symbols = upper_symbols(intake.crypto.iter().map(|c| c.symbol.as_str()));
    if !symbols.is_empty() {
        parts.push(format!(
            "crypto: {} onchain & market outlook",
            symbols.join(", ")
        ));
    }

    let tickers = upper_symbols(intake.equity.iter().map(|e| e.ticker.as_str()));
    if !tickers.is_empty() {
        parts.push(format!(
            "equities: {} earnings, valuation, catalysts",
            tickers.join(", ")
        ));
    }

    if let Some(first) = intake.fixed.first() {
        let duration = first
            .duration
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        parts.push(
            format!("rates and credit outlook duration {duration}")
                .trim_end()
                .to_string(),
        );
    }

    if !intake.real_estate.is_empty() {
        parts.push("Korea real estate price trend mortgage rate".to_string());
    }

    let profile = &intake.profile;
    parts.push(format!(
        "risk {}, horizon {}, goal {}",
        profile.risk_level(),
        profile.horizon(),
        profile.goal()
    ));

    parts.join(" ; ")
}

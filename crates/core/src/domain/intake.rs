use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Crypto,
    Equity,
    #[serde(rename = "realestate")]
    RealEstate,
    Fixed,
    Cash,
    Other,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Equity => "equity",
            Self::RealEstate => "realestate",
            Self::Fixed => "fixed",
            Self::Cash => "cash",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Mid,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Short,
    #[default]
    Mid,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Preserve,
    Income,
    #[default]
    Growth,
    Speculative,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        })
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Short => "short",
            Self::Mid => "mid",
            Self::Long => "long",
        })
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preserve => "preserve",
            Self::Income => "income",
            Self::Growth => "growth",
            Self::Speculative => "speculative",
        })
    }
}

/// A numeric field as submitted by the client (string) or as coerced by the
/// refiner (number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    /// Numeric value; blank, unparsable and non-finite input all read as 0.
    pub fn value(&self) -> f64 {
        let v = match self {
            Self::Number(n) => *n,
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return 0.0;
                }
                s.parse::<f64>().unwrap_or(0.0)
            }
        };
        if v.is_finite() {
            v
        } else {
            0.0
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for Amount {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for Amount {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Value of an optional numeric field, 0 when absent.
pub fn amount(field: &Option<Amount>) -> f64 {
    field.as_ref().map_or(0.0, Amount::value)
}

/// Readers for descriptive fields. The refiner is asked to coerce obvious
/// numbers, so `"maturity": "2030"` may come back as `2030` and an unknown
/// value as `null`.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn text_of(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(text_of(Value::deserialize(d)?))
    }

    /// Like `text`, with null reading as an empty label.
    pub fn label<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text_of(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon: Option<Horizon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_limit: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vol_pref: Option<Amount>,
}

impl RiskProfile {
    pub fn risk_level(&self) -> RiskLevel {
        self.risk.unwrap_or_default()
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon.unwrap_or_default()
    }

    pub fn goal(&self) -> Goal {
        self.goal.unwrap_or_default()
    }

    pub fn loss_limit(&self) -> f64 {
        amount(&self.loss_limit)
    }

    pub fn vol_pref(&self) -> f64 {
        amount(&self.vol_pref)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CryptoHolding {
    #[serde(deserialize_with = "lenient::label")]
    pub symbol: String,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<Amount>,
    #[serde(deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub staking: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EquityHolding {
    #[serde(deserialize_with = "lenient::label")]
    pub ticker: String,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<Amount>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealEstateHolding {
    #[serde(
        rename = "type",
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixedIncomeHolding {
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<Amount>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub maturity: Option<String>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CashPosition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub ccy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Amount>,
    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub need_at: Option<String>,
}

/// User-submitted holdings and risk profile.
///
/// The same shape carries both the validated submission and the refined copy
/// returned by the language model. Every field defaults so a sparse refined
/// record still deserializes; `from_submission` enforces the stricter rules
/// that apply to client input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Intake {
    pub assets: Vec<AssetKind>,
    pub profile: RiskProfile,
    pub crypto: Vec<CryptoHolding>,
    pub equity: Vec<EquityHolding>,
    #[serde(rename = "realestate")]
    pub real_estate: Vec<RealEstateHolding>,
    pub fixed: Vec<FixedIncomeHolding>,
    pub cash: CashPosition,
}

impl Intake {
    /// Parses and validates client-submitted intake JSON.
    pub fn from_submission(raw: serde_json::Value) -> Result<Self, ValidationError> {
        if !raw.is_object() {
            return Err(ValidationError::single("", "intake must be a JSON object"));
        }

        let intake = serde_json::from_value::<Intake>(raw)
            .map_err(|e| ValidationError::single("", e.to_string()))?;
        intake.validate()?;
        Ok(intake)
    }

    /// Builds an intake from refined model output, keeping whatever reads
    /// cleanly. A section or holding of the wrong shape is dropped on its own
    /// and the rest survives.
    pub fn from_refined(mut object: Map<String, Value>) -> Self {
        Self {
            assets: records(object.remove("assets"), "assets"),
            profile: refined_profile(object.remove("profile")),
            crypto: records(object.remove("crypto"), "crypto"),
            equity: records(object.remove("equity"), "equity"),
            real_estate: records(object.remove("realestate"), "realestate"),
            fixed: records(object.remove("fixed"), "fixed"),
            cash: section(object.remove("cash"), "cash"),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.assets.is_empty() {
            issues.push(FieldIssue::new("assets", "at least one asset category is required"));
        }

        if self.profile.risk.is_none() {
            issues.push(FieldIssue::new("profile.risk", "expected one of low, mid, high"));
        }
        if self.profile.horizon.is_none() {
            issues.push(FieldIssue::new("profile.horizon", "expected one of short, mid, long"));
        }
        if self.profile.goal.is_none() {
            issues.push(FieldIssue::new(
                "profile.goal",
                "expected one of preserve, income, growth, speculative",
            ));
        }

        for (path, field) in [
            ("profile.lossLimit", &self.profile.loss_limit),
            ("profile.volPref", &self.profile.vol_pref),
        ] {
            match field.as_ref().and_then(Amount::as_number) {
                Some(n) if (0.0..=100.0).contains(&n) => {}
                Some(n) => issues.push(FieldIssue::new(
                    path,
                    format!("must be between 0 and 100 (got {n})"),
                )),
                None => issues.push(FieldIssue::new(path, "a number is required")),
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                message: "Invalid intake payload".to_string(),
                issues,
            })
        }
    }
}

fn section<T: DeserializeOwned + Default>(value: Option<Value>, name: &str) -> T {
    match value {
        None | Some(Value::Null) => T::default(),
        Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
            tracing::warn!(section = name, error = %e, "dropping unreadable refined section");
            T::default()
        }),
    }
}

fn records<T: DeserializeOwned>(value: Option<Value>, name: &str) -> Vec<T> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            tracing::warn!(section = name, "refined section is not a list; dropping it");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(section = name, index, error = %e, "dropping unreadable refined record");
                None
            }
        })
        .collect()
}

/// Profile fields are read one by one so a bad enum value costs only itself.
fn refined_profile(value: Option<Value>) -> RiskProfile {
    let mut fields = match value {
        Some(Value::Object(fields)) => fields,
        other => return section(other, "profile"),
    };
    RiskProfile {
        risk: section(fields.remove("risk"), "profile.risk"),
        horizon: section(fields.remove("horizon"), "profile.horizon"),
        goal: section(fields.remove("goal"), "profile.goal"),
        loss_limit: section(fields.remove("lossLimit"), "profile.lossLimit"),
        vol_pref: section(fields.remove("volPref"), "profile.volPref"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Malformed client input. Never retried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub message: String,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(path: &str, message: impl Into<String>) -> Self {
        Self {
            message: "Invalid intake payload".to_string(),
            issues: vec![FieldIssue::new(path, message)],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for issue in &self.issues {
            if issue.path.is_empty() {
                write!(f, "; {}", issue.message)?;
            } else {
                write!(f, "; {}: {}", issue.path, issue.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

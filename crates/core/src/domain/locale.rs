use serde::Serialize;

/// Language of the fixed report copy: insights, glossary, call to action,
/// page labels and the delivery email. The narrative follows the configured
/// report language on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReportLocale {
    #[default]
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "en")]
    English,
}

impl ReportLocale {
    /// Korean for Korean language names, English for anything else.
    pub fn from_language(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "korean" | "ko" | "ko-kr" | "kr" | "한국어" => Self::Korean,
            _ => Self::English,
        }
    }
}

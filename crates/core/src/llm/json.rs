use serde_json::{Map, Value};

/// Pulls the JSON payload out of model output: the body of a leading
/// Markdown fence, or else the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<String> {
    let text = text.trim();

    if let Some(fenced) = text.strip_prefix("```") {
        // Drop the info string (`json`, `JSON`, or nothing) on the fence line.
        let body = fenced.split_once('\n').map_or("", |(_, rest)| rest);
        let body = body.rfind("```").map_or(body, |end| &body[..end]);
        return Some(body.trim().to_string());
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| text[start..=end].to_string())
}

/// Parses model output into a JSON object, tolerating fences and prose
/// around it. Returns `None` for anything that is not an object.
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let candidate = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    match serde_json::from_str::<Value>(&candidate).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

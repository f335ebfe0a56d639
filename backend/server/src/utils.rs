use chrono::{SecondsFormat, Utc};

/// International form for the verification provider. Numbers already
/// starting with `+` pass through; otherwise one leading `0` is dropped and
/// the country code prefixed.
pub fn normalize_phone(input: &str, country_code: &str) -> String {
    let trimmed = input.trim();

    if trimmed.starts_with('+') {
        return trimmed.to_string();
    }

    let national = trimmed.strip_prefix('0').unwrap_or(trimmed);

    format!("+{country_code}{national}")
}

/// Question rows sometimes arrive with the question mark typed first.
pub fn normalize_question(input: &str) -> String {
    match input.strip_prefix('?') {
        Some(rest) => format!("{}?", rest.trim()),
        None => input.trim().to_string(),
    }
}

pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

use std::time::Duration;

/// Parses a human duration ("5s", "500ms", "1m 30s"). Blank input yields `None`.
pub fn parse_duration(raw: &str) -> Option<Result<Duration, humantime::DurationError>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(humantime::parse_duration(trimmed))
}

/// Like `parse_duration`, but anything blank, unparseable or zero becomes `default`.
pub fn duration_or(raw: &str, default: Duration) -> Duration {
    match parse_duration(raw) {
        Some(Ok(d)) if !d.is_zero() => d,
        Some(Ok(_)) => {
            tracing::warn!("Zero duration '{}' replaced by {:?}", raw, default);
            default
        }
        Some(Err(e)) => {
            tracing::warn!("Unparseable duration '{}' ({}), using {:?}", raw, e, default);
            default
        }
        None => default,
    }
}

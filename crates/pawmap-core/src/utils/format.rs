use chrono::{DateTime, Utc};

/// Format a distance in meters: whole meters below 1 km, else km with two
/// decimals.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.2}km", meters / 1000.0)
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Time left until `expires_at`, relative to `now`.
pub fn format_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (expires_at - now).num_minutes();
    if expires_at <= now {
        "expired".to_string()
    } else if minutes < 60 {
        format!("expires in {}m", minutes.max(1))
    } else if minutes < 1440 {
        format!("expires in {}h", minutes / 60)
    } else {
        format!("expires in {}d", minutes / 1440)
    }
}

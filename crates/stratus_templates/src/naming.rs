//! Instance naming.

use chrono::{DateTime, Utc};

/// Timestamp layout used in instance names (second resolution, UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Reduce a config value to something safe as a directory name component.
pub fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "x".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{name}-{environment}-{timestamp}`.
///
/// Two requests with the same name and environment in the same second get
/// the same base name; the instantiator disambiguates on creation.
pub fn instance_base_name(name: &str, environment: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        sanitize_component(name),
        sanitize_component(environment),
        at.format(TIMESTAMP_FORMAT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_base_name_layout() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(instance_base_name("blog", "dev", at), "blog-dev-20240309140507");
    }

    #[test]
    fn test_distinct_seconds_give_distinct_names() {
        let first = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 8).unwrap();
        assert_ne!(
            instance_base_name("blog", "dev", first),
            instance_base_name("blog", "dev", second)
        );
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("My Blog!"), "my-blog");
        assert_eq!(sanitize_component("../etc/passwd"), "etc-passwd");
        assert_eq!(sanitize_component("orders_api"), "orders_api");
        assert_eq!(sanitize_component("  "), "x");
    }
}

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn utc_ns_now() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    d.as_secs() * 1_000_000_000 + d.subsec_nanos() as u64
}

/// Renders a duration as fractional milliseconds for log lines.
pub fn format_millis(d: Duration) -> String {
    format!("{:.3}ms", d.as_secs_f64() * 1_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_ns_now_is_after_2020() {
        assert!(utc_ns_now() > 1_577_836_800_000_000_000);
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(Duration::from_micros(1500)), "1.500ms");
    }
}

//! Display formatting for byte counts and durations.

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count with binary (1024) units and at most two decimals.
///
/// Trailing zeros are dropped: `1536` → `"1.5 KB"`, `2048` → `"2 KB"`.
/// Anything past the gigabyte range stays in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut i = 0usize;
    while i + 1 < SIZE_UNITS.len() && bytes >= 1024u64.pow(i as u32 + 1) {
        i += 1;
    }
    let value = bytes as f64 / 1024f64.powi(i as i32);
    format!("{} {}", trim_decimals(&format!("{value:.2}")), SIZE_UNITS[i])
}

/// Format seconds as `M:SS`, or `H:MM:SS` once past the hour.
///
/// Fractions are floored. Negative and non-finite inputs render as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

fn trim_decimals(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_size_units() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(1), "1 Bytes");
        assert_eq!(format_file_size(1023), "1023 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1_048_576), "1 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn file_size_two_decimals() {
        // 1234567 / 1024^2 = 1.1773...
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
    }

    #[test]
    fn file_size_beyond_gb_stays_gb() {
        assert_eq!(format_file_size(2 * 1024u64.pow(4)), "2048 GB");
    }

    #[test]
    fn file_size_is_deterministic() {
        assert_eq!(format_file_size(987_654), format_file_size(987_654));
    }

    #[test]
    fn time_formats() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.9), "0:09");
        assert_eq!(format_time(90.0), "1:30");
        assert_eq!(format_time(3723.0), "1:02:03");
        assert_eq!(format_time(-5.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}

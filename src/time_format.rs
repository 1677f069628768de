//! Time results: entered as MM:SS, stored as seconds

use crate::catalog::Direction;

/// Parse "MM:SS" or plain seconds. Returns None on malformed input.
pub fn parse_time_to_seconds(input: &str) -> Option<f64> {
    let trimmed = input.trim();

    if let Some((minutes, seconds)) = trimmed.split_once(':') {
        if seconds.contains(':') {
            return None;
        }
        let minutes: i64 = minutes.trim().parse().ok()?;
        let seconds: i64 = seconds.trim().parse().ok()?;
        if minutes < 0 || !(0..60).contains(&seconds) {
            return None;
        }
        return Some((minutes * 60 + seconds) as f64);
    }

    let secs: f64 = trimmed.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs.round())
}

/// Seconds to "MM:SS"
pub fn format_seconds_to_time(total_seconds: f64) -> String {
    if total_seconds < 0.0 {
        return "00:00".to_string();
    }
    let total = total_seconds.round() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Short intervals as "N сек", longer ones as MM:SS
pub fn format_time_display(total_seconds: f64) -> String {
    if total_seconds < 60.0 {
        return format!("{} сек", total_seconds.round());
    }
    format_seconds_to_time(total_seconds)
}

pub fn is_time_unit(unit: &str) -> bool {
    unit == "sec" || unit == "min"
}

/// MM:SS input is used for timed disciplines where less is better (runs)
pub fn should_use_time_input(unit: &str, direction: Direction) -> bool {
    unit == "sec" && direction == Direction::LowerIsBetter
}

/// Format a result value in its unit for tables and messages
pub fn format_value(value: f64, unit: &str, direction: Direction) -> String {
    if should_use_time_input(unit, direction) {
        return format_seconds_to_time(value);
    }
    let number = if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    };
    if unit.is_empty() {
        number
    } else {
        format!("{} {}", number, unit)
    }
}

/// Parse a user-entered result for a discipline
pub fn parse_value(input: &str, unit: &str, direction: Direction) -> Option<f64> {
    if is_time_unit(unit) || should_use_time_input(unit, direction) {
        return parse_time_to_seconds(input);
    }
    let value: f64 = input.trim().replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mm_ss() {
        assert_eq!(parse_time_to_seconds("04:20"), Some(260.0));
        assert_eq!(parse_time_to_seconds(" 0:59 "), Some(59.0));
    }

    #[test]
    fn test_parse_plain_seconds() {
        assert_eq!(parse_time_to_seconds("95"), Some(95.0));
        assert_eq!(parse_time_to_seconds("12.6"), Some(13.0));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_time_to_seconds("1:60"), None);
        assert_eq!(parse_time_to_seconds("1:2:3"), None);
        assert_eq!(parse_time_to_seconds("-1:10"), None);
        assert_eq!(parse_time_to_seconds("abc"), None);
        assert_eq!(parse_time_to_seconds("-5"), None);
    }

    #[test]
    fn test_format_seconds_to_time() {
        assert_eq!(format_seconds_to_time(260.0), "04:20");
        assert_eq!(format_seconds_to_time(5.0), "00:05");
        assert_eq!(format_seconds_to_time(-3.0), "00:00");
    }

    #[test]
    fn test_format_fractional_seconds_carry_into_minutes() {
        assert_eq!(format_seconds_to_time(119.6), "02:00");
        assert_eq!(format_seconds_to_time(59.5), "01:00");
        assert_eq!(format_seconds_to_time(245.4), "04:05");
    }

    #[test]
    fn test_format_time_display() {
        assert_eq!(format_time_display(45.0), "45 сек");
        assert_eq!(format_time_display(125.0), "02:05");
    }

    #[test]
    fn test_time_input_rules() {
        assert!(should_use_time_input("sec", Direction::LowerIsBetter));
        assert!(!should_use_time_input("sec", Direction::HigherIsBetter));
        assert!(is_time_unit("min"));
        assert!(!is_time_unit("kg"));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(245.0, "sec", Direction::LowerIsBetter), "04:05");
        assert_eq!(format_value(82.5, "kg", Direction::HigherIsBetter), "82.5 kg");
        assert_eq!(format_value(12.0, "reps", Direction::HigherIsBetter), "12 reps");
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("4:05", "sec", Direction::LowerIsBetter), Some(245.0));
        assert_eq!(parse_value("82,5", "kg", Direction::HigherIsBetter), Some(82.5));
        assert_eq!(parse_value("много", "reps", Direction::HigherIsBetter), None);
    }
}

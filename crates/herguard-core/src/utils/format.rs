/// Format a phone number for display.
/// North American numbers become (XXX) XXX-XXXX, anything else keeps its
/// leading `+` and digits only.
pub fn format_phone(phone: &str) -> String {
    // Extract just the digits
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let international = phone.trim_start().starts_with('+');

    match digits.len() {
        10 if !international => format!(
            "({}) {}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..10]
        ),
        11 if digits.starts_with('1') => format!(
            "({}) {}-{}",
            &digits[1..4],
            &digits[4..7],
            &digits[7..11]
        ),
        0 => phone.to_string(),
        _ if international => format!("+{}", digits),
        _ => digits,
    }
}

/// Mask all but the last four digits, for log output
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let visible: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 4), visible)
}

/// Distances are always shown in kilometres with one decimal
pub fn format_distance(km: f64) -> String {
    format!("{:.1} km", km)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("5551234567"), "(555) 123-4567");
        assert_eq!(format_phone("15551234567"), "(555) 123-4567");
        assert_eq!(format_phone("555-123-4567"), "(555) 123-4567");
        assert_eq!(format_phone("+880 1712-345678"), "+8801712345678");
        assert_eq!(format_phone("999"), "999");
        assert_eq!(format_phone("n/a"), "n/a");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+8801712345678"), "*********5678");
        assert_eq!(mask_phone("999"), "***");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.5), "0.5 km");
        assert_eq!(format_distance(3.249), "3.2 km");
        assert_eq!(format_distance(0.0), "0.0 km");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }
}

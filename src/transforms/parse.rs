//! Lenient numeric parsing for directive values.
//!
//! Directive values come straight from URLs, so numbers are read the forgiving
//! way: leading whitespace is skipped and the longest numeric prefix wins.
//! `"300.75"` is the integer `300`, `"2.5px"` is the float `2.5`. A value with
//! no numeric prefix at all is `None`.

/// End of the run of ASCII digits starting at `start`.
fn digits_end(s: &str, start: usize) -> usize {
    let bytes = s.as_bytes();
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    end
}

fn sign_end(s: &str) -> usize {
    match s.as_bytes().first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    }
}

/// Integer prefix of `s`, truncating any fractional part.
pub fn int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let sign = sign_end(s);
    let end = digits_end(s, sign);
    if end == sign {
        return None;
    }
    s[..end].parse().ok()
}

/// Positive integer prefix of `s` that fits in a `u32`.
pub fn positive_int_prefix(s: &str) -> Option<u32> {
    int_prefix(s)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

/// Decimal prefix of `s`, with optional fraction and exponent.
pub fn float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let sign = sign_end(s);
    let int_end = digits_end(s, sign);
    let mut end = int_end;
    let mut has_digits = int_end > sign;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_end = digits_end(s, end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let exp_sign = end + 1 + sign_end(&s[end + 1..]);
        let exp_end = digits_end(s, exp_sign);
        if exp_end > exp_sign {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_prefix_truncates() {
        assert_eq!(int_prefix("300"), Some(300));
        assert_eq!(int_prefix("300.75"), Some(300));
        assert_eq!(int_prefix("  42px"), Some(42));
        assert_eq!(int_prefix("-90"), Some(-90));
        assert_eq!(int_prefix("+7"), Some(7));
    }

    #[test]
    fn int_prefix_rejects_non_numeric() {
        assert_eq!(int_prefix(""), None);
        assert_eq!(int_prefix("abc"), None);
        assert_eq!(int_prefix("-"), None);
        assert_eq!(int_prefix(".5"), None);
    }

    #[test]
    fn positive_int_prefix_rejects_zero_and_negative() {
        assert_eq!(positive_int_prefix("10"), Some(10));
        assert_eq!(positive_int_prefix("0"), None);
        assert_eq!(positive_int_prefix("-3"), None);
        assert_eq!(positive_int_prefix("99999999999"), None);
    }

    #[test]
    fn float_prefix_reads_longest_number() {
        assert_eq!(float_prefix("2.5px"), Some(2.5));
        assert_eq!(float_prefix(".5"), Some(0.5));
        assert_eq!(float_prefix("3."), Some(3.0));
        assert_eq!(float_prefix("1e2x"), Some(100.0));
        assert_eq!(float_prefix("1e"), Some(1.0));
        assert_eq!(float_prefix("-0.25"), Some(-0.25));
    }

    #[test]
    fn float_prefix_rejects_non_numeric() {
        assert_eq!(float_prefix(""), None);
        assert_eq!(float_prefix("."), None);
        assert_eq!(float_prefix("true"), None);
    }
}

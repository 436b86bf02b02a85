//! Text-to-value heuristics for values typed into free-text inputs.
//!
//! Operators type booleans and integers by hand, so a handful of common
//! misspellings are accepted as booleans.

const TRUE_SPELLINGS: &[&str] = &["true", "ture", "treu"];
const FALSE_SPELLINGS: &[&str] = &["false", "flase", "fales", "flsae"];

/// Numeric token parsed from text input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

/// Case-insensitive boolean lookup against the accepted spellings.
pub fn parse_bool(text: &str) -> Option<bool> {
    let lowered = text.to_lowercase();
    if TRUE_SPELLINGS.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSE_SPELLINGS.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Integer for strings made only of ASCII digits (`^\d+$`).
///
/// Digit strings too large for `i64` are left alone.
pub fn parse_integer(text: &str) -> Option<i64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Number from a trimmed token, preferring integers.
pub fn parse_number(token: &str) -> Option<Number> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(Number::Integer(value));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(Number::Float)
}

/// Split a comma separated list such as `"1, 2,3"` into numbers.
///
/// Returns the offending token when one does not parse.
pub fn parse_number_list(text: &str) -> Result<Vec<Number>, String> {
    text.split(',')
        .map(|token| parse_number(token).ok_or_else(|| token.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_misspelled_booleans() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TURE"), Some(true));
        assert_eq!(parse_bool("Treu"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("flsae"), Some(false));
        assert_eq!(parse_bool("FALES"), Some(false));
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn integers_need_digits_only() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("007"), Some(7));
        assert_eq!(parse_integer("4a2"), None);
        assert_eq!(parse_integer("-3"), None);
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("99999999999999999999999"), None);
    }

    #[test]
    fn number_lists_split_on_commas() {
        assert_eq!(
            parse_number_list("1, 2,3").unwrap(),
            vec![Number::Integer(1), Number::Integer(2), Number::Integer(3)]
        );
        assert_eq!(
            parse_number_list("0.5").unwrap(),
            vec![Number::Float(0.5)]
        );
        assert_eq!(parse_number_list("1,,2").unwrap_err(), "");
        assert_eq!(parse_number_list("1,x").unwrap_err(), "x");
    }
}

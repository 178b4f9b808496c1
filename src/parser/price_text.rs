// Locale-tolerant price text parsing
use crate::model::{Currency, PriceCandidate};
use regex::Regex;
use std::sync::LazyLock;

/// Grouped thousands first (`1 299`, `1.299,50`, `1,299.99`), then plain numbers.
static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}(?:[ .,]\d{3})+(?:[.,]\d{2})?|\d+(?:[.,]\d{2})?").unwrap()
});

static CURRENCY_PATTERNS: LazyLock<Vec<(Currency, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Currency::Sek,
            Regex::new(r"(?i)(?:^|[^\p{L}])(?:kr|sek)(?:[^\p{L}]|$)|\d\s?:-").unwrap(),
        ),
        (
            Currency::Eur,
            Regex::new(r"(?i)€|(?:^|[^\p{L}])(?:eur|euro)(?:[^\p{L}]|$)").unwrap(),
        ),
        (
            Currency::Usd,
            Regex::new(r"(?i)\$|(?:^|[^\p{L}])usd(?:[^\p{L}]|$)").unwrap(),
        ),
        (
            Currency::Gbp,
            Regex::new(r"(?i)£|(?:^|[^\p{L}])gbp(?:[^\p{L}]|$)").unwrap(),
        ),
    ]
});

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Used when the text carries no currency marker.
    pub default_currency: Option<Currency>,
    /// Reject text without a currency marker (unless a default is supplied).
    pub require_currency: bool,
}

impl ParseOptions {
    pub fn requiring_currency() -> Self {
        Self { default_currency: None, require_currency: true }
    }

    pub fn with_default(currency: Currency) -> Self {
        Self { default_currency: Some(currency), require_currency: false }
    }
}

pub fn parse_price(text: &str) -> Option<PriceCandidate> {
    parse_price_with(text, ParseOptions::default())
}

/// Parses the first number-like substring of `text`. Returns `None` on anything
/// unparseable, never panics.
pub fn parse_price_with(text: &str, options: ParseOptions) -> Option<PriceCandidate> {
    let text = normalize_spaces(text);

    let currency = match detect_currency(&text) {
        Some(c) => c,
        None => match options.default_currency {
            Some(c) => c,
            None if options.require_currency => return None,
            None => Currency::Unknown,
        },
    };

    let raw = NUMBER_REGEX.find(&text)?.as_str();
    let value = clean_number(raw)?.parse::<f64>().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    Some(PriceCandidate { value, currency })
}

/// Returns the currency whose marker appears earliest in the text.
pub fn detect_currency(text: &str) -> Option<Currency> {
    CURRENCY_PATTERNS
        .iter()
        .filter_map(|(currency, re)| re.find(text).map(|m| (m.start(), *currency)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, currency)| currency)
}

pub fn has_currency_marker(text: &str) -> bool {
    detect_currency(&normalize_spaces(text)).is_some()
}

pub(crate) fn normalize_spaces(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{a0}' | '\u{202f}' | '\u{2009}' => ' ',
            other => other,
        })
        .collect()
}

/// Turns a matched number into a `str::parse`-able form by deciding which of
/// `.`/`,` is the decimal point.
fn clean_number(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let last_dot = compact.rfind('.');
    let last_comma = compact.rfind(',');

    let decimal_at = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(d.max(c)),
        (Some(d), None) => is_decimal_tail(&compact, d).then_some(d),
        (None, Some(c)) => is_decimal_tail(&compact, c).then_some(c),
        (None, None) => None,
    };

    let mut cleaned = String::with_capacity(compact.len());
    for (i, ch) in compact.char_indices() {
        match ch {
            '.' | ',' if Some(i) == decimal_at => cleaned.push('.'),
            '.' | ',' => {}
            d if d.is_ascii_digit() => cleaned.push(d),
            _ => return None,
        }
    }

    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// A lone separator is decimal only when exactly two digits follow it at the end.
fn is_decimal_tail(s: &str, pos: usize) -> bool {
    let tail = &s[pos + 1..];
    tail.len() == 2 && tail.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(text: &str) -> (f64, Currency) {
        let c = parse_price(text).unwrap_or_else(|| panic!("no price in {text:?}"));
        (c.value, c.currency)
    }

    #[test]
    fn test_swedish_formats() {
        assert_eq!(parsed("149,00 kr"), (149.0, Currency::Sek));
        assert_eq!(parsed("149.00 kr"), (149.0, Currency::Sek));
        assert_eq!(parsed("1 299 kr"), (1299.0, Currency::Sek));
        assert_eq!(parsed("1.299,50 kr"), (1299.50, Currency::Sek));
    }

    #[test]
    fn test_non_breaking_space_grouping() {
        assert_eq!(parsed("1\u{a0}299\u{a0}kr"), (1299.0, Currency::Sek));
        assert_eq!(parsed("12\u{202f}345\u{202f}678 SEK"), (12_345_678.0, Currency::Sek));
    }

    #[test]
    fn test_other_currencies() {
        assert_eq!(parsed("$1,299.99"), (1299.99, Currency::Usd));
        assert_eq!(parsed("€ 1.299"), (1299.0, Currency::Eur));
        assert_eq!(parsed("£49.95"), (49.95, Currency::Gbp));
        assert_eq!(parsed("89 EUR"), (89.0, Currency::Eur));
    }

    #[test]
    fn test_lone_comma_as_thousands_separator() {
        assert_eq!(parsed("1,299 USD"), (1299.0, Currency::Usd));
    }

    #[test]
    fn test_swedish_colon_dash_suffix() {
        assert_eq!(parsed("1299:-"), (1299.0, Currency::Sek));
    }

    #[test]
    fn test_currency_glued_to_digits() {
        assert_eq!(parsed("299kr"), (299.0, Currency::Sek));
    }

    #[test]
    fn test_kr_inside_word_is_not_currency() {
        assert!(detect_currency("kraftig 300 W").is_none());
    }

    #[test]
    fn test_installment_text_still_parses() {
        // Filtering installment language is the collector's job, not the parser's.
        assert_eq!(parsed("299 kr/mån"), (299.0, Currency::Sek));
    }

    #[test]
    fn test_missing_currency_is_unknown() {
        assert_eq!(parsed("499"), (499.0, Currency::Unknown));
    }

    #[test]
    fn test_default_currency_applies_without_marker() {
        let c = parse_price_with("499.00", ParseOptions::with_default(Currency::Sek)).unwrap();
        assert_eq!(c.value, 499.0);
        assert_eq!(c.currency, Currency::Sek);
    }

    #[test]
    fn test_marker_beats_default_currency() {
        let c = parse_price_with("€20", ParseOptions::with_default(Currency::Sek)).unwrap();
        assert_eq!(c.currency, Currency::Eur);
    }

    #[test]
    fn test_malformed_inputs_return_none() {
        for text in ["", "kr", "price on request", "€", "0 kr", "0,00 kr", "   "] {
            assert!(parse_price(text).is_none(), "{text:?} should not parse");
        }
    }

    #[test]
    fn test_required_currency_rejects_bare_numbers() {
        assert!(parse_price_with("1299", ParseOptions::requiring_currency()).is_none());
        assert!(parse_price_with("1299 kr", ParseOptions::requiring_currency()).is_some());
    }

    #[test]
    fn test_earliest_marker_wins() {
        assert_eq!(detect_currency("€12 (ca 130 kr)"), Some(Currency::Eur));
    }

    #[test]
    fn test_has_currency_marker() {
        assert!(has_currency_marker("Pris: 1 299 kr"));
        assert!(!has_currency_marker("Artikelnummer 1299"));
    }
}

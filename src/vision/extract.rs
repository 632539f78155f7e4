//! Numeric extraction from recognized text

use crate::vision::region::{contains, Rect};
use crate::vision::RecognizedText;

/// Parsed amount read from the focus band.
///
/// Always non-negative and integral, because parsing only ever sees ASCII
/// digits. When nothing parses the pipeline uses [`NumericAmount::ZERO`]
/// through [`NumericAmount::from_digits_or_zero`]; the fallback is never implicit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct NumericAmount(f64);

impl NumericAmount {
    /// Amount used when no digits could be parsed
    pub const ZERO: NumericAmount = NumericAmount(0.0);

    /// Parse a digit string. `None` for an empty string or a value too large
    /// to represent.
    pub fn parse(digits: &str) -> Option<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(NumericAmount)
    }

    /// Parse a digit string, falling back to zero
    pub fn from_digits_or_zero(digits: &str) -> Self {
        Self::parse(digits).unwrap_or(Self::ZERO)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Concatenate the text of every line whose box center lies in `region`.
///
/// Lines are visited in the recognizer's block/line enumeration order, not
/// sorted geometrically. Each accepted line is followed by a newline.
pub fn extract(text: &RecognizedText, region: &Rect) -> String {
    let mut accumulated = String::new();

    for line in text.lines() {
        if contains(region, line.bounding_box.as_ref()) {
            accumulated.push_str(&line.text);
            accumulated.push('\n');
        }
    }

    accumulated
}

/// Keep only the ASCII digits `0`-`9`.
///
/// Decimal separators and signs are dropped as well, so "12.50" reads as
/// 1250. Prices with cents are therefore scaled by 100; callers that need the
/// fractional part must not rely on this function.
pub fn filter_digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

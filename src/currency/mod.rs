//! Fixed-point money helpers.
//!
//! Amounts are always integers in the currency's minor unit ([`Cents`] for the
//! two-decimal currencies the ledger works in). Floating point only appears at the
//! edges, in [`to_minor_units`] and [`to_major_units`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer amount in minor currency units.
pub type Cents = i64;

const CENTS_PER_UNIT: i64 = 100;
const CURRENCY_SYMBOLS: [&str; 5] = ["A$", "$", "€", "£", "¥"];
/// ISO codes `parse` strips alongside the caller's own currency.
const KNOWN_CODES: [&str; 10] = ["USD", "EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "NZD", "KWD", "BHD"];

/// Failures raised while converting or parsing amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("not a number: `{0}`")]
    NotANumber(String),
    #[error("amount out of range: `{0}`")]
    OutOfRange(String),
}

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

/// Separators used when rendering and reading amounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocaleConfig {
    pub language_tag: String,
    pub decimal_separator: char,
    pub grouping_separator: char,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            language_tag: "en-US".into(),
            decimal_separator: '.',
            grouping_separator: ',',
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FormatOptions {
    pub currency_display: CurrencyDisplay,
    pub negative_style: NegativeStyle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NegativeStyle {
    #[default]
    Sign,
    Parentheses,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CurrencyDisplay {
    #[default]
    Symbol,
    Code,
    SymbolAndCode,
}

pub fn symbol_for(code: &str) -> String {
    match code {
        "USD" => "$".into(),
        "EUR" => "€".into(),
        "GBP" => "£".into(),
        "JPY" => "¥".into(),
        "AUD" => "A$".into(),
        _ => code.into(),
    }
}

pub fn minor_units_for(code: &str) -> u8 {
    match code {
        "JPY" => 0,
        "KWD" | "BHD" => 3,
        _ => 2,
    }
}

/// Converts a major-unit amount (e.g. dollars) into cents, rounding half away from zero.
pub fn to_minor_units(major: f64) -> Result<Cents, MoneyError> {
    if !major.is_finite() {
        return Err(MoneyError::NotANumber(major.to_string()));
    }
    let scaled = (major * CENTS_PER_UNIT as f64).round();
    if scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
        return Err(MoneyError::OutOfRange(major.to_string()));
    }
    Ok(scaled as i64)
}

/// Converts cents back into a major-unit value for display or interop.
pub fn to_major_units(minor: Cents) -> f64 {
    minor as f64 / CENTS_PER_UNIT as f64
}

/// Returns whether a value received as a float is usable as a minor-unit amount.
pub fn is_valid_minor(value: f64) -> bool {
    value.is_finite()
        && value.fract() == 0.0
        && value < i64::MAX as f64
        && value > i64::MIN as f64
}

/// Transaction-level amounts must be strictly positive; direction comes from the accounts.
pub fn ensure_positive(amount: Cents, what: &str) -> crate::errors::Result<Cents> {
    if amount <= 0 {
        return Err(crate::errors::LedgerError::Validation(format!(
            "{what} amount must be positive, got {amount}"
        )));
    }
    Ok(amount)
}

/// Formats cents as a US dollar string, e.g. `-$1,234.56`.
pub fn format_cents(amount: Cents) -> String {
    format_currency_value(
        amount,
        &CurrencyCode::default(),
        &LocaleConfig::default(),
        &FormatOptions::default(),
    )
}

pub fn format_currency_value(
    amount: Cents,
    code: &CurrencyCode,
    locale: &LocaleConfig,
    options: &FormatOptions,
) -> String {
    let body = format_number(locale, amount.unsigned_abs(), minor_units_for(code.as_str()));
    let symbol = symbol_for(code.as_str());
    let negative = amount < 0;
    match (options.negative_style, negative) {
        (_, false) => decorate(&body, &symbol, code, options.currency_display),
        (NegativeStyle::Sign, true) => {
            format!("-{}", decorate(&body, &symbol, code, options.currency_display))
        }
        (NegativeStyle::Parentheses, true) => {
            format!("({})", decorate(&body, &symbol, code, options.currency_display))
        }
    }
}

fn decorate(body: &str, symbol: &str, code: &CurrencyCode, display: CurrencyDisplay) -> String {
    match display {
        CurrencyDisplay::Symbol => format!("{symbol}{body}"),
        CurrencyDisplay::Code => format!("{} {}", code.as_str(), body),
        CurrencyDisplay::SymbolAndCode => format!("{symbol}{body} ({})", code.as_str()),
    }
}

/// Renders an unsigned minor-unit magnitude with grouping and decimal separators.
pub fn format_number(locale: &LocaleConfig, magnitude: u64, precision: u8) -> String {
    let scale = 10u64.pow(precision as u32);
    let whole = group_digits(&(magnitude / scale).to_string(), locale.grouping_separator);
    if precision == 0 {
        return whole;
    }
    format!(
        "{}{}{:0width$}",
        whole,
        locale.decimal_separator,
        magnitude % scale,
        width = precision as usize
    )
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx != 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped
}

/// Parses user text such as `"$1,234.56"` into cents using en-US separators.
pub fn parse(text: &str) -> Result<Cents, MoneyError> {
    parse_with(text, &LocaleConfig::default(), &CurrencyCode::default())
}

/// Parses user text into minor units of `code`, honouring the locale's separators.
///
/// Currency symbols, ISO codes, whitespace and grouping separators are ignored. A
/// leading `-` or wrapping parentheses mark a negative amount. Digits beyond the
/// currency's precision are rounded half-up. Anything else is [`MoneyError::NotANumber`].
pub fn parse_with(text: &str, locale: &LocaleConfig, code: &CurrencyCode) -> Result<Cents, MoneyError> {
    let invalid = || MoneyError::NotANumber(text.to_string());
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != locale.grouping_separator)
        .collect();

    let mut body = strip_affixes(&compact, code.as_str());
    let mut negative = false;
    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        negative = true;
        body = strip_affixes(inner, code.as_str());
    }
    if let Some(rest) = body.strip_prefix('-') {
        if negative {
            return Err(invalid());
        }
        negative = true;
        body = strip_affixes(rest, code.as_str());
    } else if let Some(rest) = body.strip_prefix('+') {
        body = strip_affixes(rest, code.as_str());
    }

    let (whole, fraction) = match body.split_once(locale.decimal_separator) {
        Some((whole, fraction)) => (whole, fraction),
        None => (body, ""),
    };
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid());
    }

    let precision = minor_units_for(code.as_str()) as usize;
    let out_of_range = || MoneyError::OutOfRange(text.to_string());
    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| out_of_range())?
    };

    let mut minor = whole_value
        .checked_mul(10i64.pow(precision as u32))
        .ok_or_else(out_of_range)?;
    let kept: String = fraction.chars().take(precision).collect();
    if !kept.is_empty() {
        let padded = format!("{:0<width$}", kept, width = precision);
        let fraction_value: i64 = padded.parse().map_err(|_| invalid())?;
        minor = minor.checked_add(fraction_value).ok_or_else(out_of_range)?;
    }
    if fraction.chars().nth(precision).is_some_and(|digit| digit >= '5') {
        minor = minor.checked_add(1).ok_or_else(out_of_range)?;
    }

    Ok(if negative { -minor } else { minor })
}

fn strip_affixes<'a>(mut text: &'a str, code: &str) -> &'a str {
    loop {
        let before = text.len();
        for symbol in CURRENCY_SYMBOLS {
            text = text.strip_prefix(symbol).unwrap_or(text);
            text = text.strip_suffix(symbol).unwrap_or(text);
        }
        for iso in KNOWN_CODES.iter().copied().chain([code]) {
            text = text.strip_prefix(iso).unwrap_or(text);
            text = text.strip_suffix(iso).unwrap_or(text);
        }
        if text.len() == before {
            return text;
        }
    }
}

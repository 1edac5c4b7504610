//! Field normalization: locale dates and amounts, description fingerprints
//! and storage keys.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::domain::{PreparedRow, RawRow};

/// Fixed marker embedded in every description key
pub const SOURCE_MARKER: &str = "M&M - Description";

/// Prefix of the key suffix naming a foreign currency
const FOREIGN_PURCHASE_MARKER: &str = "compra internacional em";

/// Parse `dd.MM.yy` or `dd.MM.yyyy`.
///
/// Two-digit years up to 50 land in the 2000s, the rest in the 1900s.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let mut parts = value.split('.');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    if [day, month, year]
        .iter()
        .any(|part| part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let year: i32 = match year.len() {
        2 => {
            let short: i32 = year.parse().ok()?;
            if short <= 50 {
                2000 + short
            } else {
                1900 + short
            }
        }
        4 => year.parse().ok()?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Parse a locale-formatted amount.
///
/// With a comma present, dots are thousands separators and the comma is the
/// decimal point ("1.234,56"). Without a comma, more than one dot means every
/// dot is a thousands separator ("1.082.241.630"). Otherwise the value is
/// parsed as-is.
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let cleaned = if value.contains(',') {
        value.replace('.', "").replacen(',', ".", 1)
    } else if value.matches('.').count() > 1 {
        value.replace('.', "")
    } else {
        value.to_string()
    };

    Decimal::from_str(&cleaned).ok()
}

/// Spacing diacritics NFD leaves in place: ASCII `^` and `` ` ``, the
/// Latin-1 accents, spacing modifier letters and their Greek and
/// fullwidth forms.
fn is_spacing_diacritic(c: char) -> bool {
    matches!(
        c,
        '^' | '`'
            | '\u{a8}'
            | '\u{af}'
            | '\u{b4}'
            | '\u{b7}'
            | '\u{b8}'
            | '\u{2b0}'..='\u{2ff}'
            | '\u{384}'..='\u{385}'
            | '\u{1fbd}'
            | '\u{1fbf}'..='\u{1fc1}'
            | '\u{1fcd}'..='\u{1fcf}'
            | '\u{1fdd}'..='\u{1fdf}'
            | '\u{1fed}'..='\u{1fef}'
            | '\u{1ffd}'..='\u{1ffe}'
            | '\u{ff3e}'
            | '\u{ff40}'
            | '\u{ffe3}'
    )
}

/// Case- and accent-insensitive matching form of a description.
///
/// Lowercases, strips combining and spacing diacritics, collapses
/// whitespace and trims. Shared by rule matching and duplicate detection.
pub fn normalize_description(value: &str) -> String {
    let stripped: String = value
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c) && !is_spacing_diacritic(*c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Description-level key used for rule matching and duplicate detection
pub fn build_key_desc(
    description: &str,
    payment_type: &str,
    status: &str,
    foreign_currency: Option<&str>,
) -> String {
    let base = format!(
        "{} -- {} -- {} -- {}",
        description, payment_type, status, SOURCE_MARKER
    );
    match foreign_currency.filter(|c| !c.is_empty()) {
        Some(currency) => format!("{} -- {} {}", base, FOREIGN_PURCHASE_MARKER, currency),
        None => base,
    }
}

/// Storage idempotency key: description key plus exact amount text and date
pub fn build_storage_key(key_desc: &str, raw_amount: &str, date: NaiveDate) -> String {
    format!("{} -- {} -- {}", key_desc, raw_amount, date.format("%Y-%m-%d"))
}

/// Normalize one row.
///
/// Both date and amount must parse; otherwise every problem found on the
/// row is returned as a message naming `line`.
pub fn prepare_row(row: &RawRow, line: usize) -> Result<PreparedRow, Vec<String>> {
    let mut errors = Vec::new();

    let authorised_on = parse_date(&row.authorised_on);
    if authorised_on.is_none() {
        errors.push(format!("Line {}: invalid date in Authorised on.", line));
    }
    let amount = parse_amount(&row.amount);
    if amount.is_none() {
        errors.push(format!("Line {}: invalid amount in Amount.", line));
    }

    let (Some(authorised_on), Some(amount)) = (authorised_on, amount) else {
        return Err(errors);
    };

    let key_desc = build_key_desc(
        &row.description,
        &row.payment_type,
        &row.status,
        row.foreign_currency.as_deref(),
    );
    let key = build_storage_key(&key_desc, &row.amount, authorised_on);
    let desc_norm = normalize_description(&key_desc);

    Ok(PreparedRow {
        line,
        authorised_on,
        processed_on: row.processed_on.as_deref().and_then(parse_date),
        desc_raw: key_desc.clone(),
        key_desc,
        key,
        desc_norm,
        amount,
        foreign_amount: row.foreign_amount.as_deref().and_then(parse_amount),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_four_digit_year() {
        assert_eq!(parse_date("05.02.2024"), Some(ymd(2024, 2, 5)));
        assert_eq!(parse_date("05.02.2024").unwrap().to_string(), "2024-02-05");
    }

    #[test]
    fn test_parse_date_two_digit_year_pivot() {
        assert_eq!(parse_date("01.12.50"), Some(ymd(2050, 12, 1)));
        assert_eq!(parse_date("01.12.51"), Some(ymd(1951, 12, 1)));
        assert_eq!(parse_date("3.1.24"), Some(ymd(2024, 1, 3)));
    }

    #[test]
    fn test_parse_date_rejects_malformed() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("05.02"), None);
        assert_eq!(parse_date("2024-02-05"), None);
        assert_eq!(parse_date("05..2024"), None);
        assert_eq!(parse_date("aa.bb.cccc"), None);
        assert_eq!(parse_date("31.02.2024"), None);
        assert_eq!(parse_date("05.02.024"), None);
    }

    #[test]
    fn test_parse_date_inverse_of_iso_format() {
        for date in [ymd(2024, 2, 29), ymd(1999, 12, 31), ymd(2000, 1, 1)] {
            let text = date.format("%d.%m.%Y").to_string();
            assert_eq!(parse_date(&text), Some(date));
        }
    }

    #[test]
    fn test_parse_amount_european_format() {
        assert_eq!(parse_amount("1.234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("-12,50"), Some(Decimal::new(-1250, 2)));
        assert_eq!(parse_amount("0,5"), Some(Decimal::new(5, 1)));
    }

    #[test]
    fn test_parse_amount_dot_formats() {
        assert_eq!(parse_amount("12.34"), Some(Decimal::new(1234, 2)));
        assert_eq!(parse_amount("42"), Some(Decimal::new(42, 0)));
        assert_eq!(
            parse_amount("1.082.241.630.276.560"),
            Some(Decimal::from_str("1082241630276560").unwrap())
        );
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("1,2,3"), None);
        assert_eq!(parse_amount("12,3x"), None);
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description("  Açúcar  EXTRA  "), "acucar extra");
        assert_eq!(normalize_description("São\tPaulo\n"), "sao paulo");
        assert_eq!(normalize_description(""), "");
    }

    #[test]
    fn test_normalize_description_drops_spacing_accents() {
        assert_eq!(normalize_description("Cafe\u{b4} ^Bar` \u{a8}"), "cafe bar");
        assert_eq!(normalize_description("Pa\u{2c6}o\u{b8}"), "pao");
    }

    #[test]
    fn test_normalize_description_is_idempotent() {
        for input in ["  Açúcar  EXTRA  ", "İstanbul Café", "ÅNGSTRÖM   naïve", "plain"] {
            let once = normalize_description(input);
            assert_eq!(normalize_description(&once), once);
        }
    }

    #[test]
    fn test_key_desc_with_foreign_currency() {
        let key = build_key_desc("AMAZON", "Card", "Processed", Some("USD"));
        assert!(key.contains("compra internacional em USD"));
        assert!(key.starts_with("AMAZON -- Card -- Processed -- M&M - Description"));

        let domestic = build_key_desc("AMAZON", "Card", "Processed", None);
        assert_eq!(domestic, "AMAZON -- Card -- Processed -- M&M - Description");
    }

    #[test]
    fn test_storage_key_appends_amount_and_date() {
        let key = build_storage_key("REWE -- Card", "-12,50", ymd(2024, 2, 5));
        assert_eq!(key, "REWE -- Card -- -12,50 -- 2024-02-05");
    }

    #[test]
    fn test_prepare_row_collects_both_errors() {
        let row = RawRow {
            authorised_on: "bad".to_string(),
            amount: "n/a".to_string(),
            ..Default::default()
        };
        let errors = prepare_row(&row, 4).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Line 4:"));
        assert!(errors[1].contains("Amount"));
    }

    #[test]
    fn test_prepare_row_builds_keys() {
        let row = RawRow {
            authorised_on: "05.02.24".to_string(),
            processed_on: Some("not a date".to_string()),
            amount: "-1.234,56".to_string(),
            currency: "EUR".to_string(),
            description: "Café CENTRAL".to_string(),
            payment_type: "Card".to_string(),
            status: "Processed".to_string(),
            foreign_amount: Some("-1.300,00".to_string()),
            foreign_currency: Some("USD".to_string()),
            exchange_rate: None,
        };
        let prepared = prepare_row(&row, 3).unwrap();
        assert_eq!(prepared.authorised_on, ymd(2024, 2, 5));
        assert_eq!(prepared.processed_on, None);
        assert_eq!(prepared.amount, Decimal::new(-123456, 2));
        assert_eq!(prepared.foreign_amount, Some(Decimal::new(-130000, 2)));
        assert_eq!(prepared.desc_raw, prepared.key_desc);
        assert!(prepared.desc_norm.starts_with("cafe central -- card -- processed"));
        assert!(prepared.key.ends_with("-- -1.234,56 -- 2024-02-05"));
    }
}

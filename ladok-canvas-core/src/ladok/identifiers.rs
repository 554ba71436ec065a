//! Local validation of person numbers and result dates.

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, IdentifierKind, Result};

static PERSON_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d\d)?(\d\d)(\d\d\d\d)[+\-]?(\w\w\w\w)").unwrap());

static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d\d)?(\d\d)-?(\d\d)-?(\d\d)").unwrap());

/// Normalize a person number to the twelve-character form Ladok expects.
pub fn normalize_person_number(raw: &str) -> Result<String> {
    normalize_person_number_at(raw, chrono::Local::now().year())
}

/// As [`normalize_person_number`], with the reference year for century inference.
///
/// A ten-digit number is placed in the 2000s only when that makes the person
/// at least five years old in `current_year`.
pub fn normalize_person_number_at(raw: &str, current_year: i32) -> Result<String> {
    let captures = PERSON_NUMBER
        .captures(raw.trim())
        .ok_or_else(|| invalid(IdentifierKind::PersonNumber, raw))?;
    let yy = &captures[2];
    let century = match captures.get(1) {
        Some(century) => century.as_str().to_string(),
        None => {
            let yy_num: i32 = yy
                .parse()
                .map_err(|_| invalid(IdentifierKind::PersonNumber, raw))?;
            if current_year - 2000 >= yy_num + 5 {
                "20".to_string()
            } else {
                "19".to_string()
            }
        }
    };
    Ok(format!("{century}{yy}{}{}", &captures[3], &captures[4]))
}

/// Normalize a date to `YYYY-MM-DD`; a two-digit year is placed in the 2000s.
pub fn normalize_date(raw: &str) -> Result<String> {
    let captures = DATE
        .captures(raw.trim())
        .ok_or_else(|| invalid(IdentifierKind::Date, raw))?;
    let century = captures.get(1).map_or("20", |c| c.as_str());
    Ok(format!(
        "{century}{}-{}-{}",
        &captures[2], &captures[3], &captures[4]
    ))
}

fn invalid(kind: IdentifierKind, raw: &str) -> Error {
    Error::InvalidIdentifier {
        kind,
        value: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_digit_person_number_keeps_century() {
        assert_eq!(
            normalize_person_number_at("19461212-1212", 2026).unwrap(),
            "194612121212"
        );
        assert_eq!(
            normalize_person_number_at("200101011234", 2026).unwrap(),
            "200101011234"
        );
    }

    #[test]
    fn ten_digit_person_number_infers_century() {
        // 21 + 5 <= 26 puts 2021 inside the window.
        assert_eq!(
            normalize_person_number_at("210101-1234", 2026).unwrap(),
            "202101011234"
        );
        // 22 + 5 > 26.
        assert_eq!(
            normalize_person_number_at("2201011234", 2026).unwrap(),
            "192201011234"
        );
        assert_eq!(
            normalize_person_number_at("461212+1212", 2026).unwrap(),
            "194612121212"
        );
    }

    #[test]
    fn malformed_person_number_is_rejected() {
        let err = normalize_person_number_at("12-34", 2026).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidIdentifier {
                kind: IdentifierKind::PersonNumber,
                ..
            }
        ));
    }

    #[test]
    fn dates_normalize_to_iso() {
        assert_eq!(normalize_date("2019-01-14").unwrap(), "2019-01-14");
        assert_eq!(normalize_date("20190114").unwrap(), "2019-01-14");
        assert_eq!(normalize_date("190114").unwrap(), "2019-01-14");
        assert_eq!(normalize_date("19-01-14").unwrap(), "2019-01-14");
        assert!(matches!(
            normalize_date("jan 14"),
            Err(Error::InvalidIdentifier {
                kind: IdentifierKind::Date,
                ..
            })
        ));
    }
}

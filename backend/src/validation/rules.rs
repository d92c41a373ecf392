//! Field-level rules.
//!
//! Pure predicates over raw values. Invalid input is a `false`, never an error.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Cell;

/// Minimum age, in years, to register.
pub const MIN_AGE_YEARS: f64 = 17.0;

/// Text birthdate formats, tried in order.
pub const BIRTHDATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("Invalid email pattern")
});

// Area code digits 1-9, then a landline (2-8) or 9-digit mobile number
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\([1-9]{2}\) (?:[2-8]|9[0-9])[0-9]{3}-[0-9]{4}$").expect("Invalid phone pattern")
});

/// Check a CPF given as 11 digits (punctuation already stripped).
pub fn is_valid_cpf(digits: &str) -> bool {
    let digits: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    (9..11).all(|pos| {
        let sum: u32 = (0..pos)
            .map(|i| digits[i] * (pos + 1 - i) as u32)
            .sum();
        (sum * 10 % 11) % 10 == digits[pos]
    })
}

/// At least a first name and a surname.
pub fn is_full_name(name: &str) -> bool {
    name.split_whitespace().count() >= 2
}

/// Read a birthdate from a date cell or from text in one of [`BIRTHDATE_FORMATS`].
pub fn parse_birthdate(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(date) => Some(*date),
        Cell::Text(text) => BIRTHDATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(text, format).ok()),
        _ => None,
    }
}

/// Age in years as elapsed days over 365.25.
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> f64 {
    (today - birth).num_days() as f64 / 365.25
}

pub fn is_of_age(birth: NaiveDate, today: NaiveDate) -> bool {
    age_in_years(birth, today) >= MIN_AGE_YEARS
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// `(DD) XXXXX-XXXX` or `(DD) XXXX-XXXX`.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// A CEP is always 8 digits.
pub fn is_well_formed_cep(digits: &str) -> bool {
    digits.len() == 8 && digits.chars().all(|c| c.is_ascii_digit())
}

//! PII masking for anything that leaves the conversation

use regex::{Captures, Regex};
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

/// 13 to 19 digits, optionally grouped by spaces or dashes
static CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d[ -]?){12,18}\d\b").unwrap());

/// Argentine CUIT/CUIL: `20-12345678-3` or eleven digits
static CUIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:20|23|24|27|30|33|34)-?\d{8}-?\d\b").unwrap());

/// DNI: `12.345.678` or a bare run of 7 to 8 digits
static DNI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,2}\.\d{3}\.\d{3}|\d{7,8})\b").unwrap());

/// Loose phone shape; the digit count decides
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\(?\d[\d\s().-]{6,}\d").unwrap());

const MIN_PHONE_DIGITS: usize = 8;
const MAX_PHONE_DIGITS: usize = 15;

pub const EMAIL_MASK: &str = "[EMAIL]";
pub const CARD_MASK: &str = "[CARD]";
pub const NATIONAL_ID_MASK: &str = "[NATIONAL_ID]";
pub const PHONE_MASK: &str = "[PHONE]";

fn digits(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Luhn checksum over the digits of `s`
pub fn luhn_valid(s: &str) -> bool {
    let digits = digits(s);
    if digits.is_empty() {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Mask e-mails, card numbers, national ids and phone numbers.
///
/// Cards are matched first and only masked when the Luhn check passes, so a
/// long serial number is left to the later rules.
pub fn mask(text: &str) -> String {
    let masked = EMAIL_RE.replace_all(text, EMAIL_MASK);
    let masked = CARD_RE.replace_all(&masked, |caps: &Captures| {
        let m = &caps[0];
        let count = digits(m).len();
        if (13..=19).contains(&count) && luhn_valid(m) {
            CARD_MASK.to_string()
        } else {
            m.to_string()
        }
    });
    let masked = CUIT_RE.replace_all(&masked, NATIONAL_ID_MASK);
    let masked = DNI_RE.replace_all(&masked, NATIONAL_ID_MASK);
    let masked = PHONE_RE.replace_all(&masked, |caps: &Captures| {
        let m = &caps[0];
        let count = digits(m).len();
        if (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&count) {
            PHONE_MASK.to_string()
        } else {
            m.to_string()
        }
    });
    masked.into_owned()
}

/// Whether free text carries something a technician could reach the user at
pub fn looks_like_contact(text: &str) -> bool {
    EMAIL_RE.is_match(text)
        || PHONE_RE
            .find_iter(text)
            .any(|m| (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits(m.as_str()).len()))
}

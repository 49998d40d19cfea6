use crate::core::dispatcher::DispatchError;
use std::fmt;

/// Smallest and largest digit counts accepted for a destination number.
const MIN_DIGITS: usize = 9;
const MAX_DIGITS: usize = 13;

/// Returns true when `raw` is a plausible phone number: an optional leading `+` followed by
/// 9 to 13 digits, ignoring spaces, dashes, dots and parentheses used as separators.
#[must_use]
pub fn validate(raw: &str) -> bool {
    let compact: String = raw.chars().filter(|c| !is_separator(*c)).collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);

    (MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Rewrites `raw` into `+<country><subscriber>` form.
///
/// A leading trunk `0` is replaced by `country_code`; any other number without a `+` simply gets
/// one prepended. Lengths are not checked here, so callers go through [`PhoneNumber::parse`].
#[must_use]
pub fn format(raw: &str, country_code: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();

    if let Some(rest) = cleaned.strip_prefix('0') {
        format!("{country_code}{rest}")
    } else if cleaned.starts_with('+') {
        cleaned
    } else {
        format!("+{cleaned}")
    }
}

const fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '-' | '.' | '(' | ')')
}

/// A destination number that passed validation and has been normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Validates and normalizes `raw`.
    ///
    /// # Errors
    /// Returns `DispatchError::InvalidPhoneFormat` if `raw` fails [`validate`].
    pub fn parse(raw: &str, country_code: &str) -> Result<Self, DispatchError> {
        if !validate(raw) {
            return Err(DispatchError::InvalidPhoneFormat(raw.to_string()));
        }
        Ok(Self(format(raw, country_code)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

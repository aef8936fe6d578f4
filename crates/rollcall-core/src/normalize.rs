//! Phone number normalization contract.
//!
//! The synchronizer never interprets numbers itself; it asks a
//! [`KeyNormalizer`] for the canonical form and hashes whatever comes back.

use crate::error::InvalidNumber;
use crate::types::AccountContext;

/// Turns a raw, user-entered phone number into its canonical form.
pub trait KeyNormalizer: Send + Sync {
    /// Normalize `raw` in the context of `account`.
    fn normalize(&self, raw: &str, account: &AccountContext) -> Result<String, InvalidNumber>;
}

/// Count the ASCII digits in a raw number.
pub fn digit_count(raw: &str) -> usize {
    raw.chars().filter(char::is_ascii_digit).count()
}

/// A small E.164 normalizer.
///
/// Strips visual separators, rewrites the `00` international prefix to `+`,
/// and prefixes national numbers with the account's default calling code
/// (dropping a single trunk `0`). It does not validate numbering plans.
#[derive(Debug, Clone)]
pub struct E164Normalizer {
    /// Minimum number of digits after normalization.
    pub min_digits: usize,
    /// Maximum number of digits after normalization (E.164 allows 15).
    pub max_digits: usize,
}

impl Default for E164Normalizer {
    fn default() -> Self {
        Self {
            min_digits: 4,
            max_digits: 15,
        }
    }
}

impl KeyNormalizer for E164Normalizer {
    fn normalize(&self, raw: &str, account: &AccountContext) -> Result<String, InvalidNumber> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidNumber::Empty);
        }

        let mut international = false;
        let mut digits = String::with_capacity(trimmed.len());
        for (i, c) in trimmed.chars().enumerate() {
            match c {
                '0'..='9' => digits.push(c),
                '+' if i == 0 => international = true,
                ' ' | '-' | '.' | '(' | ')' | '/' => {}
                other => return Err(InvalidNumber::InvalidCharacter(other)),
            }
        }

        if !international {
            if let Some(rest) = digits.strip_prefix("00") {
                digits = rest.to_string();
            } else {
                let code = account.default_calling_code.trim_start_matches('+');
                if code.is_empty() {
                    return Err(InvalidNumber::MissingCallingCode);
                }
                let national = digits.strip_prefix('0').unwrap_or(&digits);
                digits = format!("{}{}", code, national);
            }
        }

        if digits.len() < self.min_digits || digits.len() > self.max_digits {
            return Err(InvalidNumber::InvalidLength {
                digits: digits.len(),
                min: self.min_digits,
                max: self.max_digits,
            });
        }

        Ok(format!("+{}", digits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountContext {
        AccountContext::new("alice", "39")
    }

    #[test]
    fn test_international_number_kept() {
        let n = E164Normalizer::default();
        assert_eq!(
            n.normalize("+1 (555) 000-0000", &account()).unwrap(),
            "+15550000000"
        );
    }

    #[test]
    fn test_double_zero_prefix() {
        let n = E164Normalizer::default();
        assert_eq!(n.normalize("0044 20 7946 0000", &account()).unwrap(), "+442079460000");
    }

    #[test]
    fn test_national_number_gets_calling_code() {
        let n = E164Normalizer::default();
        assert_eq!(n.normalize("02 1234 5678", &account()).unwrap(), "+39212345678");
        assert_eq!(n.normalize("333.1234567", &account()).unwrap(), "+393331234567");
    }

    #[test]
    fn test_rejections() {
        let n = E164Normalizer::default();
        assert_eq!(n.normalize("   ", &account()), Err(InvalidNumber::Empty));
        assert_eq!(
            n.normalize("555-CALL", &account()),
            Err(InvalidNumber::InvalidCharacter('C'))
        );
        assert!(matches!(
            n.normalize("+1234567890123456", &account()),
            Err(InvalidNumber::InvalidLength { digits: 16, .. })
        ));
        assert_eq!(
            n.normalize("5551234", &AccountContext::new("bob", "")),
            Err(InvalidNumber::MissingCallingCode)
        );
    }

    #[test]
    fn test_digit_count_ignores_formatting() {
        assert_eq!(digit_count("+1 (555) 0"), 5);
        assert_eq!(digit_count("*#"), 0);
    }
}

//! The sanitization strategies and their effect contracts.

use hmac::{Hmac, Mac};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fixed replacement constant for the `redact` strategy.
pub const REDACTED: &str = "[REDACTED]";

/// Hex length of the `hash` strategy output.
const HASH_LEN: usize = 16;

/// Hex length of the `tokenize` surrogate (after the `tok_` prefix).
const TOKEN_LEN: usize = 12;

/// Surname pool for `fake_name`.
const LAST_NAMES: [&str; 12] = [
    "Abbott", "Barnes", "Calhoun", "Delgado", "Eastman", "Fletcher", "Grimes", "Holloway",
    "Ingram", "Jacobs", "Kearney", "Lowell",
];

/// Given-name pool for `fake_name`.
const FIRST_NAMES: [&str; 12] = [
    "Avery", "Blake", "Casey", "Dana", "Ellis", "Frankie", "Gray", "Harper", "Indigo", "Jordan",
    "Kendall", "Logan",
];

/// Street-name pool for `fake_address`.
const STREET_NAMES: [&str; 10] = [
    "Maple", "Oak", "Cedar", "Birch", "Willow", "Chestnut", "Spruce", "Juniper", "Alder",
    "Hawthorn",
];

/// Street-suffix pool for `fake_address`.
const STREET_SUFFIXES: [&str; 5] = ["St", "Ave", "Rd", "Ln", "Ct"];

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Field-level sanitization strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Mask,
    Hash,
    Redact,
    Null,
    FakeName,
    FakeAddress,
    Tokenize,
}

impl Strategy {
    /// String representation for display and database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mask => "mask",
            Self::Hash => "hash",
            Self::Redact => "redact",
            Self::Null => "null",
            Self::FakeName => "fake_name",
            Self::FakeAddress => "fake_address",
            Self::Tokenize => "tokenize",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mask" => Ok(Self::Mask),
            "hash" => Ok(Self::Hash),
            "redact" => Ok(Self::Redact),
            "null" => Ok(Self::Null),
            "fake_name" => Ok(Self::FakeName),
            "fake_address" => Ok(Self::FakeAddress),
            "tokenize" => Ok(Self::Tokenize),
            other => Err(format!("Unknown sanitization strategy: {other}")),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("Value has no string form for strategy {strategy}")]
    NotStringable { strategy: Strategy },
}

/// Result of a successful strategy application.
pub struct Applied {
    pub value: Value,
    /// True when `null` degraded to `redact` on a non-nullable column.
    pub degraded: bool,
    /// The tokenize surrogate, surfaced for the audit log only.
    pub token: Option<String>,
}

/// Apply one strategy to one value.
///
/// `key` feeds the keyed strategies (`hash`, `tokenize`); `record_pk` and
/// `field` seed the deterministic fake-value strategies so regenerating
/// the training database is stable across jobs.
pub fn apply(
    strategy: Strategy,
    value: &Value,
    nullable: bool,
    key: &[u8],
    record_pk: &str,
    field: &str,
) -> Result<Applied, StrategyError> {
    let plain = || string_form(value).ok_or(StrategyError::NotStringable { strategy });

    let applied = match strategy {
        Strategy::Mask => Applied {
            value: Value::String(mask(&plain()?)),
            degraded: false,
            token: None,
        },
        Strategy::Hash => Applied {
            value: Value::String(keyed_hex(key, &plain()?, HASH_LEN)),
            degraded: false,
            token: None,
        },
        Strategy::Redact => Applied {
            value: Value::String(REDACTED.to_string()),
            degraded: false,
            token: None,
        },
        Strategy::Null => {
            if nullable {
                Applied {
                    value: Value::Null,
                    degraded: false,
                    token: None,
                }
            } else {
                Applied {
                    value: Value::String(REDACTED.to_string()),
                    degraded: true,
                    token: None,
                }
            }
        }
        Strategy::FakeName => Applied {
            value: Value::String(fake_name(record_pk, field)),
            degraded: false,
            token: None,
        },
        Strategy::FakeAddress => Applied {
            value: Value::String(fake_address(record_pk, field)),
            degraded: false,
            token: None,
        },
        Strategy::Tokenize => {
            let token = format!("tok_{}", keyed_hex(key, &plain()?, TOKEN_LEN));
            Applied {
                value: Value::String(token.clone()),
                degraded: false,
                token: Some(token),
            }
        }
    };
    Ok(applied)
}

// ---------------------------------------------------------------------------
// Individual strategies
// ---------------------------------------------------------------------------

/// Preserve length and character classes: letters -> `X`, digits -> `9`,
/// punctuation and whitespace kept.
pub fn mask(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_alphabetic() {
                'X'
            } else if c.is_ascii_digit() {
                '9'
            } else {
                c
            }
        })
        .collect()
}

/// Deterministic keyed hash -> fixed-length hex string.
pub fn keyed_hex(key: &[u8], input: &str, len: usize) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(input.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut hex = String::with_capacity(len);
    for byte in digest.iter() {
        if hex.len() >= len {
            break;
        }
        hex.push_str(&format!("{byte:02x}"));
    }
    hex.truncate(len);
    hex
}

/// Deterministic synthesized full name, seeded by record PK + field.
pub fn fake_name(record_pk: &str, field: &str) -> String {
    let mut rng = seeded_rng(record_pk, field);
    let first = FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())];
    let last = LAST_NAMES[rng.random_range(0..LAST_NAMES.len())];
    format!("{first} {last}")
}

/// Deterministic synthesized street address, seeded by record PK + field.
pub fn fake_address(record_pk: &str, field: &str) -> String {
    let mut rng = seeded_rng(record_pk, field);
    let number: u32 = rng.random_range(100..10_000);
    let street = STREET_NAMES[rng.random_range(0..STREET_NAMES.len())];
    let suffix = STREET_SUFFIXES[rng.random_range(0..STREET_SUFFIXES.len())];
    format!("{number} {street} {suffix}")
}

fn seeded_rng(record_pk: &str, field: &str) -> StdRng {
    let mut hasher = Sha256::new();
    hasher.update(record_pk.as_bytes());
    hasher.update(b"/");
    hasher.update(field.as_bytes());
    let digest = hasher.finalize();
    let seed = u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"));
    StdRng::seed_from_u64(seed)
}

fn string_form(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_preserves_shape() {
        assert_eq!(mask("111-22-3333"), "999-99-9999");
        assert_eq!(mask("Alice Smith"), "XXXXX XXXXX");
        assert_eq!(mask("A1-b2"), "X9-X9");
    }

    #[test]
    fn mask_is_idempotent() {
        let once = mask("111-22-3333");
        assert_eq!(mask(&once), once);
    }

    #[test]
    fn mask_of_empty_is_empty() {
        assert_eq!(mask(""), "");
    }

    #[test]
    fn hash_is_deterministic_per_key() {
        let a = keyed_hex(b"k1", "input", 16);
        let b = keyed_hex(b"k1", "input", 16);
        let c = keyed_hex(b"k2", "input", 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn fake_name_is_stable_across_jobs() {
        assert_eq!(fake_name("42", "owner"), fake_name("42", "owner"));
        assert_ne!(fake_name("42", "owner"), fake_name("43", "owner"));
        assert_ne!(fake_name("42", "owner"), fake_name("42", "spouse"));
    }

    #[test]
    fn fake_address_has_expected_shape() {
        let addr = fake_address("42", "site_address");
        let number: u32 = addr.split(' ').next().unwrap().parse().unwrap();
        assert!((100..10_000).contains(&number));
    }

    #[test]
    fn tokenize_surrogate_differs_from_input() {
        let applied = apply(Strategy::Tokenize, &Value::String("ACCT-1".into()), true, b"k", "1", "acct")
            .unwrap();
        assert_ne!(applied.value, Value::String("ACCT-1".into()));
        assert!(applied.token.is_some());
    }

    #[test]
    fn redact_is_fixed_point() {
        let first = apply(Strategy::Redact, &Value::String("x".into()), true, b"k", "1", "f")
            .unwrap();
        let second = apply(Strategy::Redact, &first.value, true, b"k", "1", "f").unwrap();
        assert_eq!(first.value, second.value);
    }

    #[test]
    fn object_value_fails_stringable_strategies() {
        let err = apply(
            Strategy::Hash,
            &serde_json::json!({"a": 1}),
            true,
            b"k",
            "1",
            "f",
        );
        assert!(err.is_err());
    }

    #[test]
    fn numbers_are_maskable() {
        let applied =
            apply(Strategy::Mask, &serde_json::json!(5551234), true, b"k", "1", "f").unwrap();
        assert_eq!(applied.value, Value::String("9999999".into()));
    }
}

//! Human-shareable room codes.
//!
//! Codes are read aloud and typed on phones, so the alphabet leaves out
//! glyphs that are easy to confuse (`0/O`, `1/I`). `L` is excluded as
//! well, which leaves 31 symbols; codes already handed out by deployed
//! clients never contain it.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Symbols a generated code may contain.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of codes produced by the room registry unless configured otherwise.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// A short code that players share out-of-band to join a room.
///
/// Codes are not unique by construction; the store rejects a duplicate
/// insert and the registry retries with a fresh code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generates a code of `length` symbols using the thread-local RNG.
    pub fn generate(length: usize) -> Self {
        Self::generate_with(&mut rand::rng(), length)
    }

    /// Generates a code of `length` symbols, sampling each one uniformly
    /// from [`CODE_ALPHABET`].
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Self {
        let code = (0..length)
            .map(|_| {
                let idx = rng.random_range(0..CODE_ALPHABET.len());
                char::from(CODE_ALPHABET[idx])
            })
            .collect();
        Self(code)
    }

    /// Normalizes user input: surrounding whitespace is trimmed and the
    /// result upper-cased.
    ///
    /// No alphabet check happens here. A code typed with a stray `1` is
    /// still looked up and simply fails to match any room.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    /// Normalizes and validates a code of `length` symbols.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidCode`] if the normalized code does
    /// not have exactly `length` symbols, all from [`CODE_ALPHABET`].
    pub fn parse(raw: &str, length: usize) -> Result<Self, ProtocolError> {
        let code = Self::normalize(raw);
        if !code.is_well_formed(length) {
            return Err(ProtocolError::InvalidCode(raw.to_string()));
        }
        Ok(code)
    }

    /// Returns `true` if the code has exactly `length` symbols, all from
    /// [`CODE_ALPHABET`].
    pub fn is_well_formed(&self, length: usize) -> bool {
        self.0.len() == length && self.0.bytes().all(|b| CODE_ALPHABET.contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_alphabet_excludes_ambiguous_symbols() {
        for ambiguous in [b'0', b'O', b'1', b'I'] {
            assert!(!CODE_ALPHABET.contains(&ambiguous));
        }
    }

    #[test]
    fn test_generate_has_requested_length_and_alphabet() {
        for length in [1, 4, DEFAULT_CODE_LENGTH, 12] {
            for _ in 0..200 {
                let code = RoomCode::generate(length);
                assert!(code.is_well_formed(length), "bad code {code}");
            }
        }
    }

    #[test]
    fn test_generate_with_seeded_rng_is_deterministic() {
        let a = RoomCode::generate_with(&mut StdRng::seed_from_u64(7), 6);
        let b = RoomCode::generate_with(&mut StdRng::seed_from_u64(7), 6);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_covers_whole_alphabet() {
        let mut rng = StdRng::seed_from_u64(42);
        let code = RoomCode::generate_with(&mut rng, 4_000);
        for symbol in CODE_ALPHABET {
            assert!(
                code.as_str().as_bytes().contains(symbol),
                "symbol {} never sampled",
                char::from(*symbol)
            );
        }
    }

    #[test]
    fn test_normalize_trims_and_uppercases() {
        assert_eq!(RoomCode::normalize("  ab12xy \n").as_str(), "AB12XY");
    }

    #[test]
    fn test_parse_rejects_ambiguous_symbol() {
        let result = RoomCode::parse("ab12xy", 6);
        assert!(matches!(result, Err(ProtocolError::InvalidCode(_))));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(RoomCode::parse("   ", 6).is_err());
    }

    #[test]
    fn test_parse_accepts_lowercase_valid_code() {
        let code = RoomCode::parse(" k7mq2z", 6).unwrap();
        assert_eq!(code.as_str(), "K7MQ2Z");
        assert!(code.is_well_formed(6));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(matches!(
            RoomCode::parse("AB", 6),
            Err(ProtocolError::InvalidCode(_))
        ));
        assert!(RoomCode::parse("K7MQ2ZZ", 6).is_err());
        assert!(RoomCode::parse("K7MQ", 4).is_ok());
    }

    #[test]
    fn test_alphabet_excludes_l() {
        assert_eq!(CODE_ALPHABET.len(), 31);
        assert!(!CODE_ALPHABET.contains(&b'L'));
        assert!(RoomCode::parse("LLLLLL", 6).is_err());
    }

    #[test]
    fn test_is_well_formed_checks_length() {
        let code = RoomCode::normalize("ABCD");
        assert!(!code.is_well_formed(6));
        assert!(code.is_well_formed(4));
    }
}

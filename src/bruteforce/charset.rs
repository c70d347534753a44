//! Charset tiers and the ordered candidate space

use serde::{Deserialize, Serialize};

const DIGITS: &str = "0123456789";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS_LOWER: &str = "0123456789abcdefghijklmnopqrstuvwxyz";
const DIGITS_UPPER: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS_LETTERS: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALL: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!@#$%^&()_+-=[]{}|;:,.<>?";

/// A brute-force alphabet
///
/// Tiers go from small to rich alphabets; [`Tier::ALL`] is the search order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// `0-9`
    Digits,
    /// `a-z`
    Lower,
    /// `A-Z`
    Upper,
    /// `0-9a-z`
    DigitsLower,
    /// `0-9A-Z`
    DigitsUpper,
    /// `0-9a-zA-Z`
    DigitsLetters,
    /// `0-9a-zA-Z` plus `!@#$%^&()_+-=[]{}|;:,.<>?`
    All,
}

impl Tier {
    /// Every tier, in search order
    pub const ALL: [Tier; 7] = [
        Tier::Digits,
        Tier::Lower,
        Tier::Upper,
        Tier::DigitsLower,
        Tier::DigitsUpper,
        Tier::DigitsLetters,
        Tier::All,
    ];

    /// Characters of this tier, in odometer order
    pub fn alphabet(self) -> &'static str {
        match self {
            Tier::Digits => DIGITS,
            Tier::Lower => LOWER,
            Tier::Upper => UPPER,
            Tier::DigitsLower => DIGITS_LOWER,
            Tier::DigitsUpper => DIGITS_UPPER,
            Tier::DigitsLetters => DIGITS_LETTERS,
            Tier::All => ALL,
        }
    }

    /// Human-readable name for log lines
    pub fn description(self) -> &'static str {
        match self {
            Tier::Digits => "digits",
            Tier::Lower => "lowercase letters",
            Tier::Upper => "uppercase letters",
            Tier::DigitsLower => "digits and lowercase letters",
            Tier::DigitsUpper => "digits and uppercase letters",
            Tier::DigitsLetters => "digits and letters",
            Tier::All => "digits, letters and symbols",
        }
    }

    /// Number of candidates of exactly `length` characters (saturating)
    pub fn combinations(self, length: usize) -> u64 {
        let base = self.alphabet().len() as u64;
        u32::try_from(length)
            .ok()
            .and_then(|exp| base.checked_pow(exp))
            .unwrap_or(u64::MAX)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Odometer over every candidate of one length: `aa, ab, .., ba, ..`
#[derive(Clone, Debug)]
pub struct Odometer {
    alphabet: &'static [u8],
    digits: Vec<usize>,
    done: bool,
}

impl Odometer {
    /// Start at the first candidate of `length` characters
    pub fn new(alphabet: &'static str, length: usize) -> Self {
        Self {
            alphabet: alphabet.as_bytes(),
            digits: vec![0; length],
            done: alphabet.is_empty() || length == 0,
        }
    }
}

impl Iterator for Odometer {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }

        let current = self
            .digits
            .iter()
            .map(|&d| char::from(self.alphabet[d]))
            .collect();

        // Carry from the rightmost position; wrapping the leftmost ends the sequence
        self.done = true;
        for digit in self.digits.iter_mut().rev() {
            *digit += 1;
            if *digit < self.alphabet.len() {
                self.done = false;
                break;
            }
            *digit = 0;
        }

        Some(current)
    }
}

/// A candidate handed to the worker pool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Position in the overall enumeration order
    pub index: u64,
    /// Tier the candidate was drawn from
    pub tier: Tier,
    /// The password to try
    pub password: String,
}

/// The ordered brute-force search space: tiers, then lengths, then odometer order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateSpace {
    tiers: Vec<Tier>,
    min_length: usize,
    max_length: usize,
}

impl CandidateSpace {
    /// Space over `tiers` (in the given order) and lengths `min_length..=max_length`
    pub fn new(tiers: Vec<Tier>, min_length: usize, max_length: usize) -> Self {
        Self {
            tiers,
            min_length: min_length.max(1),
            max_length,
        }
    }

    /// Tiers in search order
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Lengths tried within each tier
    pub fn lengths(&self) -> std::ops::RangeInclusive<usize> {
        self.min_length..=self.max_length
    }

    /// Total number of candidates (saturating)
    pub fn len(&self) -> u64 {
        self.tiers
            .iter()
            .flat_map(|&tier| self.lengths().map(move |len| tier.combinations(len)))
            .fold(0u64, u64::saturating_add)
    }

    /// Whether the space has no candidates
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every candidate, in search order
    pub fn iter(&self) -> impl Iterator<Item = Candidate> + '_ {
        self.tiers
            .iter()
            .flat_map(move |&tier| {
                self.lengths()
                    .flat_map(move |len| Odometer::new(tier.alphabet(), len).map(move |pw| (tier, pw)))
            })
            .zip(0u64..)
            .map(|((tier, password), index)| Candidate {
                index,
                tier,
                password,
            })
    }
}

impl Default for CandidateSpace {
    fn default() -> Self {
        Self::new(Tier::ALL.to_vec(), 1, 8)
    }
}

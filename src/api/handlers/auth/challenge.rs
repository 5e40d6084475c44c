//! Self-verifying arithmetic challenges for throttled login attempts.
//!
//! Flow Overview:
//! 1) Once a client address reaches the failure threshold, the login form
//!    carries a small arithmetic question and a signed answer token.
//! 2) The token is `hex(HMAC-SHA256(secret, decimal(answer)))`; nothing is
//!    stored server-side.
//! 3) On submit, the user's answer is re-signed and compared in constant time.
//!
//! The secret lives only in process memory, so a restart invalidates every
//! outstanding challenge.

use anyhow::{Context, Result, anyhow};
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, rngs::OsRng};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SECRET_BYTES: usize = 32;

const NUMBER_WORDS: [&str; 21] = [
    "", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
    "twenty",
];

/// A rendered challenge: the question shown to the user and the signed answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub question: String,
    pub token: String,
}

/// The four puzzle shapes. Operands are kept small so the answer is always a
/// positive integer a human can compute in their head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Puzzle {
    /// `a × b + c`
    MulAdd { a: u32, b: u32, c: u32 },
    /// `a × b - c`, with `c < a·b`
    MulSub { a: u32, b: u32, c: u32 },
    /// `a + b`, both spelled out
    WordSum { a: u32, b: u32 },
    /// `a + b × c`
    AddMul { a: u32, b: u32, c: u32 },
}

impl Puzzle {
    /// Pick a puzzle shape uniformly, then its operands.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..4) {
            0 => Self::MulAdd {
                a: rng.gen_range(2..=9),
                b: rng.gen_range(2..=9),
                c: rng.gen_range(1..=9),
            },
            1 => {
                let a = rng.gen_range(2..=9);
                let b = rng.gen_range(2..=9);
                let c = rng.gen_range(1..a * b);
                Self::MulSub { a, b, c }
            }
            2 => Self::WordSum {
                a: rng.gen_range(2..=20),
                b: rng.gen_range(2..=20),
            },
            _ => Self::AddMul {
                a: rng.gen_range(1..=15),
                b: rng.gen_range(2..=9),
                c: rng.gen_range(2..=9),
            },
        }
    }

    #[must_use]
    pub fn answer(&self) -> i64 {
        match *self {
            Self::MulAdd { a, b, c } => i64::from(a) * i64::from(b) + i64::from(c),
            Self::MulSub { a, b, c } => i64::from(a) * i64::from(b) - i64::from(c),
            Self::WordSum { a, b } => i64::from(a) + i64::from(b),
            Self::AddMul { a, b, c } => i64::from(a) + i64::from(b) * i64::from(c),
        }
    }

    /// Render the question. `words[i]` selects word form for operand `i`.
    ///
    /// The two multiplied operands always get opposite forms so every
    /// question mixes digits and words; `WordSum` ignores the flags.
    #[must_use]
    pub fn question(&self, words: [bool; 3]) -> String {
        match *self {
            Self::MulAdd { a, b, c } => format!(
                "{} × {} + {}",
                format_number(a, words[0]),
                format_number(b, !words[0]),
                format_number(c, words[2])
            ),
            Self::MulSub { a, b, c } => format!(
                "{} × {} - {c}",
                format_number(a, words[0]),
                format_number(b, !words[0])
            ),
            Self::WordSum { a, b } => {
                format!("{} + {}", format_number(a, true), format_number(b, true))
            }
            Self::AddMul { a, b, c } => format!(
                "{} + {} × {}",
                format_number(a, words[2]),
                format_number(b, words[1]),
                format_number(c, !words[1])
            ),
        }
    }
}

/// Spell out `n` when asked and when it has a word form (1..=20).
fn format_number(n: u32, use_word: bool) -> String {
    match NUMBER_WORDS.get(n as usize) {
        Some(word) if use_word && n >= 1 => (*word).to_string(),
        _ => n.to_string(),
    }
}

/// Issues and verifies challenges with a per-process HMAC key.
#[derive(Clone)]
pub struct ChallengeIssuer {
    mac: HmacSha256,
}

impl std::fmt::Debug for ChallengeIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeIssuer")
            .field("secret", &"***")
            .finish()
    }
}

impl ChallengeIssuer {
    /// Build an issuer around an explicit secret.
    ///
    /// # Errors
    /// Returns an error if the HMAC key cannot be initialized.
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|err| anyhow!("invalid challenge secret: {err}"))?;
        Ok(Self { mac })
    }

    /// Build an issuer with a fresh 32-byte secret from the OS RNG.
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails.
    pub fn random() -> Result<Self> {
        let mut secret = [0u8; SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut secret)
            .context("failed to generate challenge secret")?;
        Self::new(&secret)
    }

    #[must_use]
    pub fn generate(&self) -> Challenge {
        self.generate_with_rng(&mut OsRng)
    }

    pub fn generate_with_rng<R: Rng>(&self, rng: &mut R) -> Challenge {
        let puzzle = Puzzle::random(rng);
        let words = [rng.gen_bool(0.5), rng.gen_bool(0.5), rng.gen_bool(0.5)];
        self.issue(&puzzle, words)
    }

    /// Render and sign a specific puzzle.
    #[must_use]
    pub fn issue(&self, puzzle: &Puzzle, words: [bool; 3]) -> Challenge {
        Challenge {
            question: puzzle.question(words),
            token: self.sign(puzzle.answer()),
        }
    }

    #[must_use]
    pub fn sign(&self, answer: i64) -> String {
        let tag = self
            .mac
            .clone()
            .chain_update(answer.to_string().as_bytes())
            .finalize()
            .into_bytes();
        hex::encode(tag)
    }

    /// Check a user-supplied answer against a signed token.
    ///
    /// Non-numeric answers and malformed tokens are rejected.
    #[must_use]
    pub fn verify(&self, user_answer: &str, token: &str) -> bool {
        let Ok(answer) = user_answer.trim().parse::<i64>() else {
            return false;
        };
        let Ok(expected) = hex::decode(token.trim()) else {
            return false;
        };
        self.mac
            .clone()
            .chain_update(answer.to_string().as_bytes())
            .verify_slice(&expected)
            .is_ok()
    }
}

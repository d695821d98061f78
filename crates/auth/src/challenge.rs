/// Sign-in challenges
///
/// A challenge is a fresh nonce plus the issue time, rendered into a fixed
/// human-readable template. Wallets sign the rendered message verbatim, so
/// the rendering must be byte-stable.
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{generate_nonce, AuthError};

pub const SIGN_IN_PREAMBLE: &str = "Sign in to Garden of Giving";

const NONCE_LABEL: &str = "\n\nNonce: ";
const TIMESTAMP_LABEL: &str = "\nTimestamp: ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub message: String,
    pub nonce: String,
    /// Epoch milliseconds
    #[serde(rename = "timestamp")]
    pub issued_at_millis: i64,
}

impl Challenge {
    pub fn new(nonce: impl Into<String>, issued_at_millis: i64) -> Self {
        let nonce = nonce.into();
        Self {
            message: build_challenge_message(&nonce, issued_at_millis),
            nonce,
            issued_at_millis,
        }
    }
}

/// Issue a new challenge with a nonce from the OS random generator.
///
/// Fails only if the random source does; there is no weaker fallback.
pub fn issue_challenge() -> Result<Challenge, AuthError> {
    let nonce = generate_nonce()?;
    Ok(Challenge::new(nonce, Utc::now().timestamp_millis()))
}

pub fn build_challenge_message(nonce: &str, issued_at_millis: i64) -> String {
    format!("{SIGN_IN_PREAMBLE}{NONCE_LABEL}{nonce}{TIMESTAMP_LABEL}{issued_at_millis}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeFields<'a> {
    pub nonce: &'a str,
    pub issued_at_millis: i64,
}

/// Recover nonce and timestamp from a rendered challenge.
///
/// Returns `None` unless re-rendering the recovered fields reproduces
/// `message` exactly.
pub fn parse_challenge_message(message: &str) -> Option<ChallengeFields<'_>> {
    let rest = message
        .strip_prefix(SIGN_IN_PREAMBLE)?
        .strip_prefix(NONCE_LABEL)?;
    let (nonce, timestamp) = rest.split_once(TIMESTAMP_LABEL)?;
    if nonce.is_empty() {
        return None;
    }
    let issued_at_millis = timestamp.parse::<i64>().ok()?;

    // "+17" and "017" parse, but do not round-trip
    (build_challenge_message(nonce, issued_at_millis) == message).then_some(ChallengeFields {
        nonce,
        issued_at_millis,
    })
}

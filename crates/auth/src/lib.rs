/// Wallet sign-in primitives for Garden of Giving
///
/// Challenge issuance, Ed25519 signature verification and the JSON bodies
/// exchanged between the sign-in service and its clients. Nothing in this
/// crate performs I/O.

pub mod challenge;
pub mod wire;

pub use challenge::{
    build_challenge_message, issue_challenge, parse_challenge_message, Challenge,
    ChallengeFields, SIGN_IN_PREAMBLE,
};

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),
    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),
    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(String),
    #[error("Invalid public key length: expected 32 bytes, got {0}")]
    InvalidPubkeyLength(usize),
    #[error("Invalid signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),
    #[error("Invalid public key: {0}")]
    InvalidPubkey(String),
    #[error("Unknown key encoding: {0}")]
    UnknownEncoding(String),
    #[error("Secure random source failed: {0}")]
    RandomSource(String),
}

/// Why a signature was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("bad encoding: {0}")]
    BadEncoding(#[from] AuthError),
    #[error("signature does not match message and public key")]
    SignatureMismatch,
}

/// String encoding used by a wallet for public keys and signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEncoding {
    /// Lowercase or uppercase hex, optional `0x` prefix (Aptos-style wallets)
    #[default]
    Hex,
    /// Bitcoin-alphabet base58 (Solana-style wallets)
    Base58,
    /// Standard padded base64
    Base64,
}

impl KeyEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyEncoding::Hex => "hex",
            KeyEncoding::Base58 => "base58",
            KeyEncoding::Base64 => "base64",
        }
    }

    pub fn decode(&self, value: &str) -> Result<Vec<u8>, AuthError> {
        match self {
            KeyEncoding::Hex => {
                let digits = value
                    .strip_prefix("0x")
                    .or_else(|| value.strip_prefix("0X"))
                    .unwrap_or(value);
                hex::decode(digits).map_err(|e| AuthError::InvalidHex(e.to_string()))
            }
            KeyEncoding::Base58 => bs58::decode(value)
                .into_vec()
                .map_err(|e| AuthError::InvalidBase58(e.to_string())),
            KeyEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(value)
                .map_err(|e| AuthError::InvalidBase64(e.to_string())),
        }
    }

    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            KeyEncoding::Hex => format!("0x{}", hex::encode(bytes)),
            KeyEncoding::Base58 => bs58::encode(bytes).into_string(),
            KeyEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

impl FromStr for KeyEncoding {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" => Ok(KeyEncoding::Hex),
            "base58" | "b58" => Ok(KeyEncoding::Base58),
            "base64" | "b64" => Ok(KeyEncoding::Base64),
            other => Err(AuthError::UnknownEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a 32-byte Ed25519 public key
pub fn decode_public_key(value: &str, encoding: KeyEncoding) -> Result<[u8; PUBLIC_KEY_LEN], AuthError> {
    let bytes = encoding.decode(value)?;
    <[u8; PUBLIC_KEY_LEN]>::try_from(bytes.as_slice())
        .map_err(|_| AuthError::InvalidPubkeyLength(bytes.len()))
}

/// Decode a 64-byte Ed25519 signature
pub fn decode_signature(value: &str, encoding: KeyEncoding) -> Result<[u8; SIGNATURE_LEN], AuthError> {
    let bytes = encoding.decode(value)?;
    <[u8; SIGNATURE_LEN]>::try_from(bytes.as_slice())
        .map_err(|_| AuthError::InvalidSignatureLength(bytes.len()))
}

/// Verify Ed25519 signature
pub fn verify_ed25519(
    pubkey: &[u8; PUBLIC_KEY_LEN],
    message: &[u8],
    sig: &[u8; SIGNATURE_LEN],
) -> Result<bool, AuthError> {
    let verifying_key =
        VerifyingKey::from_bytes(pubkey).map_err(|e| AuthError::InvalidPubkey(e.to_string()))?;

    let signature = Signature::from_bytes(sig);

    Ok(verifying_key.verify(message, &signature).is_ok())
}

/// Check that the holder of `public_key` signed exactly the bytes of `message`.
///
/// Undecodable or off-curve keys and undecodable signatures come back as
/// [`VerifyError::BadEncoding`]; a well-formed signature over anything other
/// than `message` is [`VerifyError::SignatureMismatch`].
pub fn verify(
    public_key: &str,
    message: &str,
    signature: &str,
    encoding: KeyEncoding,
) -> Result<(), VerifyError> {
    let pubkey = decode_public_key(public_key, encoding)?;
    let sig = decode_signature(signature, encoding)?;

    if verify_ed25519(&pubkey, message.as_bytes(), &sig)? {
        Ok(())
    } else {
        Err(VerifyError::SignatureMismatch)
    }
}

pub fn is_valid(public_key: &str, message: &str, signature: &str, encoding: KeyEncoding) -> bool {
    verify(public_key, message, signature, encoding).is_ok()
}

fn os_random<const N: usize>() -> Result<[u8; N], AuthError> {
    let mut buf = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| AuthError::RandomSource(e.to_string()))?;
    Ok(buf)
}

/// Generate a sign-in nonce: 16 bytes from the OS generator, rendered as a v4 UUID
pub fn generate_nonce() -> Result<String, AuthError> {
    let bytes = os_random::<16>()?;
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
}

/// Generate an opaque 256-bit bearer token (URL-safe base64, unpadded)
pub fn generate_token() -> Result<String, AuthError> {
    let bytes = os_random::<32>()?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

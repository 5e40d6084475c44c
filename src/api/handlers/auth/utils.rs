//! Small helpers for token generation, hashing and request inspection.

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Random bytes behind every session and reset token.
pub(crate) const TOKEN_BYTES: usize = 64;

/// Create a new opaque token (64 random bytes, hex encoded to 128 chars).
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(hex::encode(bytes))
}

/// Cheap shape check before touching storage with client-supplied tokens.
pub(crate) fn well_formed_token(token: &str) -> bool {
    Regex::new(r"^[0-9a-fA-F]{128}$").is_ok_and(|re| re.is_match(token))
}

/// Hash a session token so raw values never touch the database.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Normalize an email for lookups.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Best-effort client address: first `X-Forwarded-For` entry, else the peer address.
pub(crate) fn client_key(headers: &HeaderMap, peer: Option<std::net::SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }
    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Escape text for inclusion in HTML bodies and attribute values.
pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

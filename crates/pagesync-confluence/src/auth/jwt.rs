//! Atlassian Connect JWT (HS256) with query string hash.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// RFC 3986 unreserved characters: A-Z a-z 0-9 - . _ ~
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// JWT claims sent to Confluence.
#[derive(Debug, Serialize)]
pub(super) struct Claims<'a> {
    iss: &'a str,
    iat: u64,
    exp: u64,
    qsh: String,
}

impl<'a> Claims<'a> {
    pub(super) fn new(
        issuer: &'a str,
        method: &str,
        path: &str,
        query: &[(&str, String)],
        now: u64,
        expiry_seconds: u64,
    ) -> Self {
        Self {
            iss: issuer,
            iat: now,
            exp: now + expiry_seconds,
            qsh: query_string_hash(method, path, query),
        }
    }
}

/// Current Unix timestamp in seconds.
pub(super) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Sign claims and return the compact token `header.claims.signature`.
pub(super) fn sign(claims: &Claims<'_>, secret: &str) -> String {
    // Serializing a struct of strings and integers cannot fail.
    let claims_json = serde_json::to_string(claims).unwrap_or_default();
    let signing_input = format!(
        "{}.{}",
        BASE64_URL_SAFE_NO_PAD.encode(HEADER),
        BASE64_URL_SAFE_NO_PAD.encode(claims_json)
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(signing_input.as_bytes());
    let signature = BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{signing_input}.{signature}")
}

/// Hex SHA-256 of the canonical request `METHOD&path&query`.
fn query_string_hash(method: &str, path: &str, query: &[(&str, String)]) -> String {
    let mut params: Vec<(String, String)> = query
        .iter()
        .filter(|(k, _)| *k != "jwt")
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    params.sort();

    let canonical_query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let canonical_path = if path.is_empty() { "/" } else { path };
    let canonical = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        canonical_path,
        canonical_query
    );

    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn encode(input: &str) -> String {
    utf8_percent_encode(input, QUERY_ENCODE_SET).to_string()
}

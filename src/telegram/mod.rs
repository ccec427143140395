//! Telegram Mini App init-data verification.
//!
//! Telegram's client shell hands Mini Apps a URL-encoded, HMAC-signed blob
//! proving the session came from Telegram. Verification recomputes the
//! signature over a canonical form of the payload with a key derived from
//! the bot token, then checks payload freshness.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Accepted age of a signed payload. Telegram stamps `auth_date` at the
/// moment the Mini App opens; anything older than an hour is replayable
/// material and gets rejected. Future-dated payloads pass (clock skew).
pub const ALLOWED_TIME_SKEW_SECONDS: i64 = 60 * 60;

/// Identity extracted from a verified init-data payload. Transient; never
/// persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramAuthData {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    pub auth_date: i64,
    pub hash: String,
    pub locale: Option<String>,
}

/// Shape of the `user` field inside init-data. Telegram sends the locale as
/// `language_code`.
#[derive(Debug, Deserialize)]
struct InitDataUser {
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    photo_url: Option<String>,
    language_code: Option<String>,
}

pub struct TelegramVerifier {
    bot_token: String,
}

impl TelegramVerifier {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
        }
    }

    /// Verify a raw init-data blob against the bot token and the freshness
    /// window, using the current wall clock.
    pub fn verify(&self, raw_init_data: &str) -> Result<TelegramAuthData, AuthError> {
        self.verify_at(raw_init_data, Utc::now().timestamp())
    }

    /// Verification with an injectable clock, for boundary tests.
    pub fn verify_at(&self, raw_init_data: &str, now: i64) -> Result<TelegramAuthData, AuthError> {
        let params = parse_init_data(raw_init_data)?;

        let provided_hash = params
            .iter()
            .find(|(key, _)| key == "hash")
            .map(|(_, value)| value.as_str())
            .ok_or(AuthError::InvalidPayload)?;

        self.check_signature(&params, provided_hash)?;

        let auth_data = build_auth_data(&params, provided_hash)?;
        if now - auth_data.auth_date > ALLOWED_TIME_SKEW_SECONDS {
            return Err(AuthError::AuthExpired);
        }
        Ok(auth_data)
    }

    fn check_signature(
        &self,
        params: &[(String, String)],
        provided_hash: &str,
    ) -> Result<(), AuthError> {
        let check_string = build_data_check_string(params);

        // Key derivation as Telegram documents it: the bot token is HMAC'd with
        // the literal string "WebAppData", and that digest keys the payload
        // signature.
        let mut mac = HmacSha256::new_from_slice(b"WebAppData")
            .map_err(|_| AuthError::InvalidSignature)?;
        mac.update(self.bot_token.as_bytes());
        let secret_key = mac.finalize().into_bytes();

        let mut mac = HmacSha256::new_from_slice(&secret_key)
            .map_err(|_| AuthError::InvalidSignature)?;
        mac.update(check_string.as_bytes());

        // verify_slice is constant-time; a malformed hex hash is just a
        // signature mismatch to the caller.
        let provided = hex::decode(provided_hash).map_err(|_| AuthError::InvalidSignature)?;
        mac.verify_slice(&provided)
            .map_err(|_| AuthError::InvalidSignature)
    }
}

/// Decode the URL-encoded blob into ordered key/value pairs, blanks kept.
fn parse_init_data(raw: &str) -> Result<Vec<(String, String)>, AuthError> {
    if raw.is_empty() {
        return Err(AuthError::MissingPayload);
    }
    let params: Vec<(String, String)> = url::form_urlencoded::parse(raw.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if !params.iter().any(|(key, _)| key == "hash") {
        return Err(AuthError::InvalidPayload);
    }
    Ok(params)
}

/// Canonical form signed by Telegram: every pair except `hash`, keys sorted
/// lexicographically, joined as `key=value` lines.
fn build_data_check_string(params: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> =
        params.iter().filter(|(key, _)| key != "hash").collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_auth_data(
    params: &[(String, String)],
    provided_hash: &str,
) -> Result<TelegramAuthData, AuthError> {
    let lookup = |wanted: &str| {
        params
            .iter()
            .find(|(key, _)| key == wanted)
            .map(|(_, value)| value.as_str())
    };

    let user_raw = lookup("user").filter(|raw| !raw.is_empty());
    let user_raw = user_raw.ok_or(AuthError::MissingUserPayload)?;

    // Distinguish "no id at all" from "unparsable JSON / wrong id type":
    // peek at the raw value before binding the typed struct.
    let user_value: serde_json::Value =
        serde_json::from_str(user_raw).map_err(|_| AuthError::InvalidUserPayload)?;
    if user_value.get("id").is_none() {
        return Err(AuthError::MissingUserId);
    }
    let user: InitDataUser =
        serde_json::from_value(user_value).map_err(|_| AuthError::InvalidUserPayload)?;

    let auth_date: i64 = lookup("auth_date")
        .unwrap_or("0")
        .parse()
        .map_err(|_| AuthError::InvalidAuthDate)?;
    if auth_date <= 0 {
        return Err(AuthError::InvalidAuthDate);
    }

    Ok(TelegramAuthData {
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        photo_url: user.photo_url,
        auth_date,
        hash: provided_hash.to_string(),
        locale: user.language_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_rejected() {
        let verifier = TelegramVerifier::new("token");
        assert_eq!(verifier.verify(""), Err(AuthError::MissingPayload));
    }

    #[test]
    fn test_payload_without_hash_rejected() {
        let verifier = TelegramVerifier::new("token");
        assert_eq!(
            verifier.verify("user=%7B%22id%22%3A1%7D&auth_date=1"),
            Err(AuthError::InvalidPayload)
        );
    }

    #[test]
    fn test_check_string_sorts_keys_and_skips_hash() {
        let params = vec![
            ("user".to_string(), "{\"id\":1}".to_string()),
            ("auth_date".to_string(), "123".to_string()),
            ("hash".to_string(), "abcd".to_string()),
            ("query_id".to_string(), "".to_string()),
        ];
        assert_eq!(
            build_data_check_string(&params),
            "auth_date=123\nquery_id=\nuser={\"id\":1}"
        );
    }

    #[test]
    fn test_non_hex_hash_is_invalid_signature() {
        let verifier = TelegramVerifier::new("token");
        assert_eq!(
            verifier.verify("auth_date=1&hash=zzzz"),
            Err(AuthError::InvalidSignature)
        );
    }
}

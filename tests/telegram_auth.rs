mod common;

use chrono::Utc;
use common::{sign_init_data, signed_user_blob, BOT_TOKEN};
use quadrant_server::error::AuthError;
use quadrant_server::telegram::ALLOWED_TIME_SKEW_SECONDS;
use quadrant_server::TelegramVerifier;

#[test]
fn test_signed_blob_round_trip() {
    let verifier = TelegramVerifier::new(BOT_TOKEN);
    let blob = signed_user_blob(BOT_TOKEN, 42, Utc::now().timestamp());

    let auth = verifier.verify(&blob).unwrap();
    assert_eq!(auth.id, 42);
    assert_eq!(auth.username.as_deref(), Some("reader"));
    assert_eq!(auth.first_name.as_deref(), Some("Test"));
    assert_eq!(auth.locale.as_deref(), Some("en"));
}

#[test]
fn test_tampered_hash_rejected() {
    let verifier = TelegramVerifier::new(BOT_TOKEN);
    let blob = signed_user_blob(BOT_TOKEN, 42, Utc::now().timestamp());

    // Flip the last hex digit of the hash.
    let mut tampered = blob.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == '0' { '1' } else { '0' });

    assert_eq!(verifier.verify(&tampered), Err(AuthError::InvalidSignature));
}

#[test]
fn test_tampered_payload_rejected() {
    let verifier = TelegramVerifier::new(BOT_TOKEN);
    let blob = signed_user_blob(BOT_TOKEN, 42, Utc::now().timestamp());

    // Valid hash over different data.
    let tampered = blob.replace("%22id%22%3A42", "%22id%22%3A43");
    assert_eq!(verifier.verify(&tampered), Err(AuthError::InvalidSignature));
}

#[test]
fn test_wrong_bot_token_rejected() {
    let verifier = TelegramVerifier::new("999999:some-other-bot");
    let blob = signed_user_blob(BOT_TOKEN, 42, Utc::now().timestamp());
    assert_eq!(verifier.verify(&blob), Err(AuthError::InvalidSignature));
}

#[test]
fn test_freshness_window_boundaries() {
    let verifier = TelegramVerifier::new(BOT_TOKEN);
    let auth_date = 1_700_000_000i64;
    let blob = signed_user_blob(BOT_TOKEN, 7, auth_date);

    // Exactly at the window edge is still acceptable.
    assert!(verifier
        .verify_at(&blob, auth_date + ALLOWED_TIME_SKEW_SECONDS)
        .is_ok());
    assert!(verifier
        .verify_at(&blob, auth_date + ALLOWED_TIME_SKEW_SECONDS - 1)
        .is_ok());
    assert_eq!(
        verifier.verify_at(&blob, auth_date + ALLOWED_TIME_SKEW_SECONDS + 1),
        Err(AuthError::AuthExpired)
    );
}

#[test]
fn test_future_dated_payload_accepted() {
    let verifier = TelegramVerifier::new(BOT_TOKEN);
    let now = 1_700_000_000i64;
    let blob = signed_user_blob(BOT_TOKEN, 7, now + 900);
    assert!(verifier.verify_at(&blob, now).is_ok());
}

#[test]
fn test_signed_blob_without_user_rejected() {
    let verifier = TelegramVerifier::new(BOT_TOKEN);
    let auth_date = Utc::now().timestamp().to_string();
    let blob = sign_init_data(BOT_TOKEN, &[("auth_date", auth_date.as_str())]);
    assert_eq!(verifier.verify(&blob), Err(AuthError::MissingUserPayload));
}

#[test]
fn test_user_without_id_rejected() {
    let verifier = TelegramVerifier::new(BOT_TOKEN);
    let auth_date = Utc::now().timestamp().to_string();
    let blob = sign_init_data(
        BOT_TOKEN,
        &[
            ("auth_date", auth_date.as_str()),
            ("user", r#"{"username":"reader"}"#),
        ],
    );
    assert_eq!(verifier.verify(&blob), Err(AuthError::MissingUserId));
}

#[test]
fn test_zero_auth_date_rejected() {
    let verifier = TelegramVerifier::new(BOT_TOKEN);
    let blob = sign_init_data(
        BOT_TOKEN,
        &[("auth_date", "0"), ("user", r#"{"id":7}"#)],
    );
    assert_eq!(verifier.verify(&blob), Err(AuthError::InvalidAuthDate));
}

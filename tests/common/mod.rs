use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const BOT_TOKEN: &str = "123456:test-bot-token";

/// Sign a set of init-data pairs the way the Telegram client shell does:
/// sorted `key=value` lines keyed by HMAC("WebAppData", bot_token), with
/// the hex digest appended as the `hash` parameter.
pub fn sign_init_data(bot_token: &str, pairs: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let check_string = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n");

    let mut mac = HmacSha256::new_from_slice(b"WebAppData").unwrap();
    mac.update(bot_token.as_bytes());
    let secret_key = mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&secret_key).unwrap();
    mac.update(check_string.as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}

/// Signed blob carrying a plausible `user` payload.
pub fn signed_user_blob(bot_token: &str, user_id: i64, auth_date: i64) -> String {
    let user = format!(
        r#"{{"id":{},"username":"reader","first_name":"Test","language_code":"en"}}"#,
        user_id
    );
    let auth_date = auth_date.to_string();
    sign_init_data(bot_token, &[("auth_date", &auth_date), ("user", &user)])
}

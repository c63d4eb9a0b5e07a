//! Telegram Mini App launch data
//!
//! Launch data arrives as a URL-encoded query string. Its `hash` field is
//! `hex(HMAC_SHA256(secret, data_check_string))` where
//!
//! ```text
//! secret            = HMAC_SHA256(key = "WebAppData", msg = bot_token)
//! data_check_string = "k1=v1\nk2=v2\n..."   (every pair except hash, sorted by key)
//! ```

use crate::error::{AuthError, Result};
use neon_core::TelegramUser;
use ring::hmac;
use std::collections::BTreeMap;

const SECRET_KEY_LABEL: &[u8] = b"WebAppData";

/// Verified (or, in development mode, merely parsed) launch data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchData {
    pub user: TelegramUser,
    pub auth_date: i64,
    pub query_id: Option<String>,
    pub start_param: Option<String>,
}

impl LaunchData {
    /// Ledger identity for this user
    pub fn user_id(&self) -> String {
        self.user.id.to_string()
    }
}

/// Decode the query string into sorted pairs
fn parse_pairs(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut pairs = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        if pairs.insert(key.to_string(), value.to_string()).is_some() {
            return Err(AuthError::Malformed(format!("duplicate field '{}'", key)));
        }
    }
    if pairs.is_empty() {
        return Err(AuthError::Malformed("empty launch data".to_string()));
    }
    Ok(pairs)
}

fn data_check_string(pairs: &BTreeMap<String, String>) -> String {
    pairs
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn signing_key(bot_token: &str) -> hmac::Key {
    let label = hmac::Key::new(hmac::HMAC_SHA256, SECRET_KEY_LABEL);
    let secret = hmac::sign(&label, bot_token.as_bytes());
    hmac::Key::new(hmac::HMAC_SHA256, secret.as_ref())
}

fn extract(pairs: &BTreeMap<String, String>) -> Result<LaunchData> {
    let auth_date = pairs
        .get("auth_date")
        .ok_or_else(|| AuthError::Malformed("missing auth_date".to_string()))?
        .parse::<i64>()
        .map_err(|e| AuthError::Malformed(format!("auth_date: {}", e)))?;

    let user_json = pairs
        .get("user")
        .ok_or_else(|| AuthError::Malformed("missing user".to_string()))?;
    let user: TelegramUser = serde_json::from_str(user_json)
        .map_err(|e| AuthError::Malformed(format!("user: {}", e)))?;

    Ok(LaunchData {
        user,
        auth_date,
        query_id: pairs.get("query_id").cloned(),
        start_param: pairs.get("start_param").cloned(),
    })
}

/// Verify launch data against the bot token and freshness window
///
/// The signature is checked before any field is decoded.
pub fn verify_init_data(raw: &str, bot_token: &str, now: i64, max_age_secs: i64) -> Result<LaunchData> {
    let pairs = parse_pairs(raw)?;

    let hash = pairs.get("hash").ok_or(AuthError::InvalidSignature)?;
    let expected = hex::decode(hash).map_err(|_| AuthError::InvalidSignature)?;
    let message = data_check_string(&pairs);
    hmac::verify(&signing_key(bot_token), message.as_bytes(), &expected)
        .map_err(|_| AuthError::InvalidSignature)?;

    let data = extract(&pairs)?;
    if max_age_secs > 0 && now.saturating_sub(data.auth_date) > max_age_secs {
        return Err(AuthError::Expired);
    }
    Ok(data)
}

/// Parse launch data without checking its signature (no bot token configured)
pub fn parse_init_data_unverified(raw: &str) -> Result<LaunchData> {
    extract(&parse_pairs(raw)?)
}

/// Produce signed launch data for the given fields
///
/// Used by tests and local tooling to impersonate the Telegram client.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> String {
    let pairs: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let tag = hmac::sign(&signing_key(bot_token), data_check_string(&pairs).as_bytes());

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hex::encode(tag.as_ref()));
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456:TEST-TOKEN";
    const USER: &str = r#"{"id":279058397,"first_name":"Vlad","username":"vdkfrost","language_code":"en","is_premium":true}"#;

    fn signed(auth_date: &str) -> String {
        sign_init_data(
            &[("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"), ("user", USER), ("auth_date", auth_date)],
            TOKEN,
        )
    }

    #[test]
    fn test_valid_launch_data() {
        let raw = signed("1662771648");
        let data = verify_init_data(&raw, TOKEN, 1662771648 + 60, 86_400).unwrap();
        assert_eq!(data.user_id(), "279058397");
        assert_eq!(data.user.username.as_deref(), Some("vdkfrost"));
        assert!(data.user.is_premium);
        assert_eq!(data.query_id.as_deref(), Some("AAHdF6IQAAAAAN0XohDhrOrc"));
    }

    #[test]
    fn test_wrong_token_rejected() {
        let raw = signed("1662771648");
        let err = verify_init_data(&raw, "other-token", 1662771648, 86_400).unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
    }

    #[test]
    fn test_tampered_field_rejected() {
        let raw = signed("1662771648").replace("vdkfrost", "mallory");
        let err = verify_init_data(&raw, TOKEN, 1662771648, 86_400).unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
    }

    #[test]
    fn test_missing_or_garbled_hash() {
        let raw = "auth_date=1&user=%7B%22id%22%3A1%7D";
        assert_eq!(
            verify_init_data(raw, TOKEN, 1, 86_400).unwrap_err(),
            AuthError::InvalidSignature
        );

        let raw = format!("{}&hash=zz", raw);
        assert_eq!(
            verify_init_data(&raw, TOKEN, 1, 86_400).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_stale_launch_data_expires() {
        let raw = signed("1000");
        assert!(verify_init_data(&raw, TOKEN, 1000 + 86_400, 86_400).is_ok());
        assert_eq!(
            verify_init_data(&raw, TOKEN, 1000 + 86_401, 86_400).unwrap_err(),
            AuthError::Expired
        );
        // zero disables the age check
        assert!(verify_init_data(&raw, TOKEN, i64::MAX, 0).is_ok());
    }

    #[test]
    fn test_signed_but_malformed_user() {
        let raw = sign_init_data(&[("user", "not json"), ("auth_date", "5")], TOKEN);
        assert!(matches!(
            verify_init_data(&raw, TOKEN, 5, 86_400),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_unverified_parse() {
        let raw = "user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ann%22%7D&auth_date=7&hash=bogus";
        let data = parse_init_data_unverified(raw).unwrap();
        assert_eq!(data.user_id(), "42");
        assert_eq!(data.auth_date, 7);

        assert!(matches!(
            parse_init_data_unverified(""),
            Err(AuthError::Malformed(_))
        ));
    }
}

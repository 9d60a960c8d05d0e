//! Telegram Web App init data validation.
//!
//! Telegram signs the init data with HMAC-SHA256; the secret key is derived
//! from the bot token as HMAC_SHA256("WebAppData", bot_token). The REST
//! layer treats the raw init data string as an opaque bearer token and only
//! this module looks inside.

use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of init data, in seconds (24 hours).
const MAX_AUTH_AGE_SECONDS: i64 = 86400;

/// The `user` object embedded in init data.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WebAppUser {
    pub id: i64,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

fn parse_params(init_data: &str) -> HashMap<String, String> {
    init_data
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) => {
                    let decoded = urlencoding::decode(value).ok()?;
                    Some((key.to_string(), decoded.to_string()))
                }
                _ => None,
            }
        })
        .collect()
}

fn parse_user(params: &HashMap<String, String>) -> Result<WebAppUser> {
    let user_json = params.get("user").ok_or_else(|| anyhow!("Missing user parameter"))?;
    serde_json::from_str(user_json).map_err(|e| anyhow!("Failed to parse user JSON: {}", e))
}

/// HMAC-SHA256 of the data check string under the token-derived secret key.
fn signature(bot_token: &str, data_check_string: &str) -> Result<String> {
    let mut secret_key_mac =
        HmacSha256::new_from_slice(b"WebAppData").map_err(|_| anyhow!("HMAC key setup failed"))?;
    secret_key_mac.update(bot_token.as_bytes());
    let secret_key = secret_key_mac.finalize().into_bytes();

    let mut mac =
        HmacSha256::new_from_slice(&secret_key).map_err(|_| anyhow!("HMAC key setup failed"))?;
    mac.update(data_check_string.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Validates Telegram Web App init data and returns the embedded user.
///
/// Checks the HMAC signature against the bot token and rejects data older
/// than 24 hours.
pub fn validate_init_data(init_data: &str, bot_token: &str) -> Result<WebAppUser> {
    let params = parse_params(init_data);

    let received_hash = params.get("hash").ok_or_else(|| anyhow!("Missing hash parameter"))?;

    // data_check_string: every parameter except hash, sorted by key
    let mut check_pairs: Vec<String> = params
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    check_pairs.sort();
    let data_check_string = check_pairs.join("\n");

    let calculated_hash = signature(bot_token, &data_check_string)?;

    if calculated_hash != *received_hash {
        return Err(anyhow!("Invalid hash - data may be tampered"));
    }

    if let Some(auth_date_str) = params.get("auth_date") {
        if let Ok(auth_date) = auth_date_str.parse::<i64>() {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            let age_seconds = now - auth_date;
            if age_seconds > MAX_AUTH_AGE_SECONDS {
                return Err(anyhow!("Init data is too old ({} seconds)", age_seconds));
            }
        }
    }

    parse_user(&params)
}

/// Extracts the user from init data WITHOUT validating the signature.
///
/// Only for local development with an empty bot token.
pub fn extract_user_unchecked(init_data: &str) -> Result<WebAppUser> {
    parse_user(&parse_params(init_data))
}

/// Mints init data for calls this process makes to a remote booking backend
/// on behalf of a chat user. The output passes [`validate_init_data`] under
/// the same token.
pub fn sign_init_data(bot_token: &str, user: &WebAppUser) -> Result<String> {
    let mut user_obj = serde_json::Map::new();
    user_obj.insert("id".to_string(), serde_json::json!(user.id));
    if let Some(first_name) = &user.first_name {
        user_obj.insert("first_name".to_string(), serde_json::json!(first_name));
    }
    if let Some(username) = &user.username {
        user_obj.insert("username".to_string(), serde_json::json!(username));
    }
    let user_json = serde_json::Value::Object(user_obj).to_string();

    let auth_date = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string();

    let mut pairs = vec![
        format!("auth_date={}", auth_date),
        format!("user={}", user_json),
    ];
    pairs.sort();
    let hash = signature(bot_token, &pairs.join("\n"))?;

    Ok(format!(
        "user={}&auth_date={}&hash={}",
        urlencoding::encode(&user_json),
        auth_date,
        hash
    ))
}

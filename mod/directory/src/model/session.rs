use serde::{Deserialize, Serialize};

/// A JWT issuance record, kept so logout can revoke a token before it
/// expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session id (UUIDv4, no dashes). Matches the `sid` claim.
    pub id: String,

    /// Effective user id the token was issued for.
    pub user_id: String,

    /// RFC 3339 timestamp when the token was issued.
    pub issued_at: String,

    /// RFC 3339 timestamp when the token expires.
    pub expires_at: String,

    /// Whether this session has been revoked.
    #[serde(default)]
    pub revoked: bool,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response body.
///
/// `user` is the public projection of the effective account. Under
/// substitution it carries the substitute's identity, the absent
/// user's input permissions, and an `originalUser` marker; `message`
/// then names both parties.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

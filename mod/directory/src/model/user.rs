use serde::{Deserialize, Serialize};

use esurat_core::{OrgUser, Role};

/// A directory account.
///
/// The hierarchy is an explicit tree: `parent_id` is the source of
/// truth, and `path` is the derived dot-delimited ancestry string
/// (e.g. `kpa.sekretaris.kasub_umum.pelaksana`). A prefix of a path is
/// always an ancestor, so subtree queries stay simple string matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Login name, unique across the directory.
    pub username: String,

    /// Argon2id PHC hash. Never leaves the module; stripped from every
    /// public projection.
    pub password_hash: String,

    /// Display name, e.g. "Kasub Umum Keuangan".
    pub name: String,

    /// Organizational role.
    pub role: Role,

    /// Signatory code stamped into outgoing mail numbers (KPA, SEK, PAN).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_code: Option<String>,

    /// Id of the direct superior. None for tree roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Derived ancestry path. Recomputed whenever the parent changes.
    pub path: String,

    /// Whether the user is currently on leave.
    #[serde(default)]
    pub on_leave: bool,

    /// Id of the user covering during leave, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitute: Option<String>,

    /// May register incoming mail.
    #[serde(default)]
    pub can_input_incoming: bool,

    /// May register outgoing mail.
    #[serde(default)]
    pub can_input_outgoing: bool,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

impl User {
    /// Public-safe JSON projection: everything except the password hash.
    pub fn public_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!(self);
        if let Some(obj) = value.as_object_mut() {
            obj.remove("passwordHash");
        }
        value
    }
}

impl From<&User> for OrgUser {
    fn from(u: &User) -> Self {
        OrgUser {
            id: u.id.clone(),
            username: u.username.clone(),
            name: u.name.clone(),
            role: u.role,
            sign_code: u.sign_code.clone(),
            path: u.path.clone(),
            can_input_incoming: u.can_input_incoming,
            can_input_outgoing: u.can_input_outgoing,
        }
    }
}

/// Input for creating a new user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub sign_code: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Own path component. Defaults to the username.
    #[serde(default)]
    pub path_segment: Option<String>,
    #[serde(default)]
    pub can_input_incoming: bool,
    #[serde(default)]
    pub can_input_outgoing: bool,
}

/// Request body for the leave/substitution endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthority {
    pub on_leave: bool,
    /// Required when `on_leave` is set and coverage is wanted.
    #[serde(default)]
    pub substitute: Option<String>,
}

/// Request body for the input-permission endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissions {
    pub can_input_incoming: bool,
    pub can_input_outgoing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use esurat_core::now_rfc3339;

    #[test]
    fn test_public_json_strips_hash() {
        let now = now_rfc3339();
        let user = User {
            id: "u1".into(),
            username: "kpa".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            name: "Ketua Pengadilan Agama".into(),
            role: Role::Kpa,
            sign_code: Some("KPA".into()),
            parent_id: None,
            path: "kpa".into(),
            on_leave: false,
            substitute: None,
            can_input_incoming: false,
            can_input_outgoing: false,
            created_at: now.clone(),
            updated_at: now,
        };

        let public = user.public_json();
        assert!(public.get("passwordHash").is_none());
        assert_eq!(public["username"], "kpa");
        assert_eq!(public["signCode"], "KPA");
        assert_eq!(public["role"], "kpa");
    }
}

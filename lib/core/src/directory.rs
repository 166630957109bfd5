//! User directory seam.
//!
//! The mail module does NOT depend on the concrete directory module.
//! It only knows this trait plus the projection types below. The
//! concrete implementation is injected at startup time.

use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Organizational role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    Kpa,
    Sekretaris,
    Panitera,
    KasubUmum,
    Kasub,
    Panmud,
    Pelaksana,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Superadmin => "superadmin",
            Self::Kpa => "kpa",
            Self::Sekretaris => "sekretaris",
            Self::Panitera => "panitera",
            Self::KasubUmum => "kasub_umum",
            Self::Kasub => "kasub",
            Self::Panmud => "panmud",
            Self::Pelaksana => "pelaksana",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "superadmin" => Some(Self::Superadmin),
            "kpa" => Some(Self::Kpa),
            "sekretaris" => Some(Self::Sekretaris),
            "panitera" => Some(Self::Panitera),
            "kasub_umum" => Some(Self::KasubUmum),
            "kasub" => Some(Self::Kasub),
            "panmud" => Some(Self::Panmud),
            "pelaksana" => Some(Self::Pelaksana),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public-safe projection of a directory account, as consumed by other
/// modules. No credential material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_code: Option<String>,
    /// Dot-delimited ancestry string, e.g. `kpa.sekretaris.kasub_umum`.
    pub path: String,
    #[serde(default)]
    pub can_input_incoming: bool,
    #[serde(default)]
    pub can_input_outgoing: bool,
}

/// JWT claims payload carried through request extensions.
///
/// Under substitution the subject is the substitute's identity while
/// the two input permissions are the absent user's, and
/// `original_user` names them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject: effective user id.
    pub sub: String,
    /// Display name of the effective user.
    pub name: String,
    pub role: Role,
    pub path: String,
    #[serde(default)]
    pub can_input_incoming: bool,
    #[serde(default)]
    pub can_input_outgoing: bool,
    /// Name of the user being substituted for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_user: Option<String>,
    /// Session id (for revocation).
    pub sid: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl Claims {
    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }
}

/// True when `sub_path` sits exactly one level below `sup_path`.
///
/// Ancestry is prefix-encoded: `kpa.sekretaris.kasub_umum.pelaksana`
/// is a direct report of `kpa.sekretaris.kasub_umum` but not of
/// `kpa.sekretaris`.
pub fn is_direct_subordinate(sup_path: &str, sub_path: &str) -> bool {
    sub_path.starts_with(&format!("{}.", sup_path))
        && sub_path.split('.').count() == sup_path.split('.').count() + 1
}

/// Pluggable directory lookup. Consumers resolve recipients, walk the
/// org chart, and enumerate role holders through this interface.
pub trait UserDirectory: Send + Sync {
    /// Fetch one account by id.
    fn get_user(&self, id: &str) -> Result<OrgUser, ServiceError>;

    /// All accounts holding the given role.
    fn find_by_role(&self, role: Role) -> Result<Vec<OrgUser>, ServiceError>;

    /// All accounts, hierarchy order not guaranteed.
    fn list_users(&self) -> Result<Vec<OrgUser>, ServiceError>;

    /// Accounts exactly one level below the given user.
    fn direct_subordinates(&self, user_id: &str) -> Result<Vec<OrgUser>, ServiceError>;

    /// Display name for an id, None when unknown.
    fn display_name(&self, id: &str) -> Option<String>;
}

/// A fixed in-memory directory. Used for testing and for embedding the
/// mail module without the full directory service.
pub struct StaticDirectory {
    users: Vec<OrgUser>,
}

impl StaticDirectory {
    pub fn new(users: Vec<OrgUser>) -> Self {
        Self { users }
    }
}

impl UserDirectory for StaticDirectory {
    fn get_user(&self, id: &str) -> Result<OrgUser, ServiceError> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("users/{}", id)))
    }

    fn find_by_role(&self, role: Role) -> Result<Vec<OrgUser>, ServiceError> {
        Ok(self.users.iter().filter(|u| u.role == role).cloned().collect())
    }

    fn list_users(&self) -> Result<Vec<OrgUser>, ServiceError> {
        Ok(self.users.clone())
    }

    fn direct_subordinates(&self, user_id: &str) -> Result<Vec<OrgUser>, ServiceError> {
        let user = self.get_user(user_id)?;
        Ok(self
            .users
            .iter()
            .filter(|u| is_direct_subordinate(&user.path, &u.path))
            .cloned()
            .collect())
    }

    fn display_name(&self, id: &str) -> Option<String> {
        self.users.iter().find(|u| u.id == id).map(|u| u.name.clone())
    }
}

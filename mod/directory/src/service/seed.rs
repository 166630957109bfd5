use esurat_core::{Role, ServiceError};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::model::{CreateUser, User};
use crate::service::DirectoryService;

struct SeedAccount {
    username: &'static str,
    password: &'static str,
    name: &'static str,
    role: Role,
    sign_code: Option<&'static str>,
    parent: Option<&'static str>,
    segment: &'static str,
    can_input_incoming: bool,
    can_input_outgoing: bool,
}

/// The default office hierarchy created on first run. Parents are
/// referenced by username and must be listed before their children.
const DEFAULT_ACCOUNTS: &[SeedAccount] = &[
    SeedAccount {
        username: "kpa",
        password: "password",
        name: "Ketua Pengadilan Agama",
        role: Role::Kpa,
        sign_code: Some("KPA"),
        parent: None,
        segment: "kpa",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "sekretaris",
        password: "password",
        name: "Sekretaris",
        role: Role::Sekretaris,
        sign_code: Some("SEK"),
        parent: Some("kpa"),
        segment: "sekretaris",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "panitera",
        password: "password",
        name: "Panitera",
        role: Role::Panitera,
        sign_code: Some("PAN"),
        parent: Some("kpa"),
        segment: "panitera",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "kasub_umum",
        password: "password",
        name: "Kasub Umum Keuangan",
        role: Role::KasubUmum,
        sign_code: None,
        parent: Some("sekretaris"),
        segment: "kasub_umum",
        can_input_incoming: true,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "kasub_kepeg",
        password: "password",
        name: "Kasub Kepegawaian",
        role: Role::Kasub,
        sign_code: None,
        parent: Some("sekretaris"),
        segment: "kasub_kepeg",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "kasub_ptip",
        password: "password",
        name: "Kasub PTIP",
        role: Role::Kasub,
        sign_code: None,
        parent: Some("sekretaris"),
        segment: "kasub_ptip",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "panmud_gugatan",
        password: "password",
        name: "Panitera Muda Gugatan",
        role: Role::Panmud,
        sign_code: None,
        parent: Some("panitera"),
        segment: "panmud_gugatan",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "panmud_hukum",
        password: "password",
        name: "Panitera Muda Hukum",
        role: Role::Panmud,
        sign_code: None,
        parent: Some("panitera"),
        segment: "panmud_hukum",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "panmud_permohonan",
        password: "password",
        name: "Panitera Muda Permohonan",
        role: Role::Panmud,
        sign_code: None,
        parent: Some("panitera"),
        segment: "panmud_permohonan",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "pelaksana_umum",
        password: "password",
        name: "Staf Pelaksana Umum",
        role: Role::Pelaksana,
        sign_code: None,
        parent: Some("kasub_umum"),
        segment: "pelaksana",
        can_input_incoming: false,
        can_input_outgoing: true,
    },
    SeedAccount {
        username: "pelaksana_kepeg",
        password: "password",
        name: "Staf Pelaksana Kepegawaian",
        role: Role::Pelaksana,
        sign_code: None,
        parent: Some("kasub_kepeg"),
        segment: "pelaksana",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "pelaksana_ptip",
        password: "password",
        name: "Staf Pelaksana PTIP",
        role: Role::Pelaksana,
        sign_code: None,
        parent: Some("kasub_ptip"),
        segment: "pelaksana",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "pelaksana_gugatan",
        password: "password",
        name: "Staf Pelaksana Gugatan",
        role: Role::Pelaksana,
        sign_code: None,
        parent: Some("panmud_gugatan"),
        segment: "pelaksana",
        can_input_incoming: false,
        can_input_outgoing: false,
    },
    SeedAccount {
        username: "superadmin",
        password: "admin",
        name: "Super Admin",
        role: Role::Superadmin,
        sign_code: None,
        parent: None,
        segment: "superadmin",
        can_input_incoming: true,
        can_input_outgoing: true,
    },
];

impl DirectoryService {
    /// Seed the default account hierarchy when the users table is
    /// empty. On later runs, backfill permission fields that older
    /// data is missing without overwriting explicit values.
    pub fn seed_defaults(&self) -> Result<(), ServiceError> {
        let rows = self
            .sql
            .query("SELECT COUNT(*) as cnt FROM users", &[])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let count = rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0);

        if count > 0 {
            return self.backfill_permissions();
        }

        let mut ids: HashMap<&'static str, String> = HashMap::new();
        for account in DEFAULT_ACCOUNTS {
            let parent_id = match account.parent {
                Some(parent) => Some(ids.get(parent).cloned().ok_or_else(|| {
                    ServiceError::Internal(format!("seed parent '{}' not defined yet", parent))
                })?),
                None => None,
            };

            let user = self.create_user(CreateUser {
                username: account.username.to_string(),
                password: account.password.to_string(),
                name: account.name.to_string(),
                role: account.role,
                sign_code: account.sign_code.map(|s| s.to_string()),
                parent_id,
                path_segment: Some(account.segment.to_string()),
                can_input_incoming: account.can_input_incoming,
                can_input_outgoing: account.can_input_outgoing,
            })?;
            ids.insert(account.username, user.id);
        }

        info!("seeded {} default directory accounts", DEFAULT_ACCOUNTS.len());
        Ok(())
    }

    /// Fill in permission flags missing from stored rows using
    /// role-based defaults. Rows that already carry the keys are left
    /// untouched.
    fn backfill_permissions(&self) -> Result<(), ServiceError> {
        let rows = self
            .sql
            .query("SELECT id, data FROM users", &[])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut backfilled = 0usize;
        for row in &rows {
            let (Some(id), Some(data)) = (row.get_str("id"), row.get_str("data")) else {
                continue;
            };
            let mut doc: serde_json::Value = match serde_json::from_str(data) {
                Ok(v) => v,
                Err(e) => {
                    warn!("skipping undecodable user row '{}': {}", id, e);
                    continue;
                }
            };
            let Some(obj) = doc.as_object_mut() else {
                continue;
            };

            let role = obj
                .get("role")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let mut changed = false;

            if !obj.contains_key("canInputIncoming") {
                obj.insert(
                    "canInputIncoming".into(),
                    serde_json::json!(role == "superadmin" || role == "kasub_umum"),
                );
                changed = true;
            }
            if !obj.contains_key("canInputOutgoing") {
                obj.insert(
                    "canInputOutgoing".into(),
                    serde_json::json!(role == "superadmin" || role == "pelaksana"),
                );
                changed = true;
            }

            if changed {
                let user: User = serde_json::from_value(doc)
                    .map_err(|e| ServiceError::Internal(e.to_string()))?;
                self.update_record("users", &user.id, &user, &[])?;
                backfilled += 1;
            }
        }

        if backfilled > 0 {
            info!("backfilled permission flags on {} accounts", backfilled);
        }
        Ok(())
    }

    /// Delete every account and session, then re-create the default
    /// hierarchy. The re-seeded accounts get fresh ids, so tokens
    /// issued before the reset no longer resolve and every client has
    /// to log in again.
    pub fn reset_accounts(&self) -> Result<AccountReset, ServiceError> {
        let sessions = self
            .sql
            .exec("DELETE FROM sessions", &[])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let users = self
            .sql
            .exec("DELETE FROM users", &[])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        self.seed_defaults()?;

        info!(
            "directory reset: {} accounts and {} sessions removed",
            users, sessions
        );

        Ok(AccountReset { users, sessions })
    }
}

/// Rows removed by an account reset.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReset {
    pub users: u64,
    pub sessions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::DirectoryConfig;
    use esurat_sql::{SQLStore, SqliteStore, Value};
    use std::sync::Arc;

    #[test]
    fn test_backfill_fills_missing_flags_only() {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let svc = DirectoryService::new(sql.clone(), DirectoryConfig::default()).unwrap();

        // Simulate an old row without the permission keys.
        let old = serde_json::json!({
            "id": "legacy1",
            "username": "legacy_kasub",
            "passwordHash": "$argon2id$stub",
            "name": "Legacy Kasub Umum",
            "role": "kasub_umum",
            "path": "kpa.sekretaris.legacy_kasub",
            "onLeave": false,
            "createdAt": "2024-01-01T00:00:00+00:00",
            "updatedAt": "2024-01-01T00:00:00+00:00"
        });
        sql.exec(
            "INSERT INTO users (id, username, name, role, parent_id, path, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?7)",
            &[
                Value::Text("legacy1".into()),
                Value::Text("legacy_kasub".into()),
                Value::Text("Legacy Kasub Umum".into()),
                Value::Text("kasub_umum".into()),
                Value::Text("kpa.sekretaris.legacy_kasub".into()),
                Value::Text(old.to_string()),
                Value::Text("2024-01-01T00:00:00+00:00".into()),
            ],
        )
        .unwrap();

        // An explicit false must survive the backfill.
        let kasub_umum = svc.find_by_username("kasub_umum").unwrap().unwrap();
        svc.update_permissions(
            &kasub_umum.id,
            crate::model::UpdatePermissions {
                can_input_incoming: false,
                can_input_outgoing: false,
            },
        )
        .unwrap();

        svc.seed_defaults().unwrap();

        let legacy = svc.get_user_record("legacy1").unwrap();
        assert!(legacy.can_input_incoming);
        assert!(!legacy.can_input_outgoing);

        let kasub_umum = svc.get_user_record(&kasub_umum.id).unwrap();
        assert!(!kasub_umum.can_input_incoming);
    }

    #[test]
    fn test_reset_accounts_restores_defaults() {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let svc = DirectoryService::new(sql, DirectoryConfig::default()).unwrap();

        let kasub = svc.find_by_username("kasub_umum").unwrap().unwrap();
        svc.create_user(CreateUser {
            username: "honorer".into(),
            password: "rahasia".into(),
            name: "Staf Honorer".into(),
            role: Role::Pelaksana,
            sign_code: None,
            parent_id: Some(kasub.id),
            path_segment: None,
            can_input_incoming: false,
            can_input_outgoing: false,
        })
        .unwrap();
        svc.login("kasub_umum", "password").unwrap();
        svc.login("honorer", "rahasia").unwrap();

        let removed = svc.reset_accounts().unwrap();
        assert_eq!(removed.users, DEFAULT_ACCOUNTS.len() as u64 + 1);
        assert_eq!(removed.sessions, 2);

        // The extra account is gone and the defaults are back.
        assert!(svc.find_by_username("honorer").unwrap().is_none());
        let resp = svc.login("superadmin", "admin").unwrap();
        assert_eq!(resp.user["role"], "superadmin");
    }
}

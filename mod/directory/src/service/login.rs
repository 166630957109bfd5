use tracing::info;

use esurat_core::ServiceError;

use crate::model::{LoginResponse, User};
use crate::service::{DirectoryService, password};

impl DirectoryService {
    /// Authenticate a user by username and password.
    ///
    /// Unknown usernames and wrong passwords produce the same generic
    /// error. When the matched account is on leave with a substitute
    /// on record, the session is issued as the substitute, carrying
    /// the absent user's input permissions and an `originalUser`
    /// marker.
    pub fn login(&self, username: &str, pass: &str) -> Result<LoginResponse, ServiceError> {
        let user = self
            .find_by_username(username)?
            .ok_or_else(|| ServiceError::Unauthorized("invalid username or password".into()))?;

        if !password::verify_password(pass, &user.password_hash) {
            return Err(ServiceError::Unauthorized(
                "invalid username or password".into(),
            ));
        }

        if user.on_leave {
            if let Some(substitute_id) = &user.substitute {
                // Fall back to a plain self login if the substitute
                // account has since disappeared.
                if let Ok(substitute) = self.get_user_record(substitute_id) {
                    return self.substituted_login(&user, &substitute);
                }
            }
        }

        let (token, _session) = self.issue_session(&user, None)?;
        info!("login: {}", user.username);

        Ok(LoginResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_ttl,
            user: user.public_json(),
            message: None,
        })
    }

    fn substituted_login(
        &self,
        original: &User,
        substitute: &User,
    ) -> Result<LoginResponse, ServiceError> {
        let (token, _session) = self.issue_session(substitute, Some(original))?;
        info!(
            "login: {} covered by {}",
            original.username, substitute.username
        );

        // The effective identity is the substitute's, with the absent
        // user's input permissions layered on top.
        let mut view = substitute.public_json();
        if let Some(obj) = view.as_object_mut() {
            obj.insert(
                "canInputIncoming".into(),
                serde_json::json!(original.can_input_incoming),
            );
            obj.insert(
                "canInputOutgoing".into(),
                serde_json::json!(original.can_input_outgoing),
            );
            obj.insert("originalUser".into(), serde_json::json!(original.name));
        }

        Ok(LoginResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_ttl,
            user: view,
            message: Some(format!(
                "Login sebagai {} (pengganti {})",
                substitute.name, original.name
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UpdateAuthority;
    use crate::service::DirectoryConfig;
    use esurat_sql::SqliteStore;
    use std::sync::Arc;

    fn test_service() -> Arc<DirectoryService> {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        DirectoryService::new(sql, DirectoryConfig::default()).unwrap()
    }

    #[test]
    fn test_login_success() {
        let svc = test_service();

        let resp = svc.login("kasub_umum", "password").unwrap();
        assert_eq!(resp.token_type, "Bearer");
        assert_eq!(resp.user["username"], "kasub_umum");
        assert!(resp.user.get("passwordHash").is_none());
        assert_eq!(resp.message, None);

        let claims = svc.verify_token(&resp.access_token).unwrap();
        assert!(claims.can_input_incoming);
        assert_eq!(claims.original_user, None);
    }

    #[test]
    fn test_login_failures_are_generic() {
        let svc = test_service();

        let bad_pass = svc.login("kasub_umum", "wrong");
        let bad_user = svc.login("no_such_user", "password");

        for result in [bad_pass, bad_user] {
            match result {
                Err(ServiceError::Unauthorized(msg)) => {
                    assert_eq!(msg, "invalid username or password")
                }
                other => panic!("expected Unauthorized, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_substitution_login() {
        let svc = test_service();
        let kasub = svc.find_by_username("kasub_umum").unwrap().unwrap();
        let staf = svc.find_by_username("pelaksana_umum").unwrap().unwrap();

        svc.update_authority(
            &kasub.id,
            UpdateAuthority {
                on_leave: true,
                substitute: Some(staf.id.clone()),
            },
        )
        .unwrap();

        // Logging in with the absent user's credentials yields the
        // substitute's identity plus the absent user's permissions.
        let resp = svc.login("kasub_umum", "password").unwrap();
        assert_eq!(resp.user["username"], "pelaksana_umum");
        assert_eq!(resp.user["originalUser"], "Kasub Umum Keuangan");
        assert_eq!(resp.user["canInputIncoming"], true);
        assert_eq!(resp.user["canInputOutgoing"], false);
        assert_eq!(
            resp.message.as_deref(),
            Some("Login sebagai Staf Pelaksana Umum (pengganti Kasub Umum Keuangan)")
        );

        let claims = svc.verify_token(&resp.access_token).unwrap();
        assert_eq!(claims.sub, staf.id);
        assert!(claims.can_input_incoming);
        assert!(!claims.can_input_outgoing);
        assert_eq!(claims.original_user.as_deref(), Some("Kasub Umum Keuangan"));
    }

    #[test]
    fn test_leave_without_substitute_logs_in_as_self() {
        let svc = test_service();
        let kasub = svc.find_by_username("kasub_umum").unwrap().unwrap();

        svc.update_authority(
            &kasub.id,
            UpdateAuthority {
                on_leave: true,
                substitute: None,
            },
        )
        .unwrap();

        let resp = svc.login("kasub_umum", "password").unwrap();
        assert_eq!(resp.user["username"], "kasub_umum");
        assert_eq!(resp.message, None);
    }
}

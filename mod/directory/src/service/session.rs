use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use esurat_core::{Claims, ServiceError, new_id};
use esurat_sql::Value;

use crate::model::{Session, User};
use crate::service::DirectoryService;

impl DirectoryService {
    /// Issue a signed JWT for the effective user and record the
    /// session. Under substitution `original` is the absent account:
    /// its input permissions ride along and its name is kept in the
    /// `original_user` claim.
    pub(crate) fn issue_session(
        &self,
        effective: &User,
        original: Option<&User>,
    ) -> Result<(String, Session), ServiceError> {
        let session_id = new_id();
        let now = chrono::Utc::now();
        let expires = now + chrono::Duration::seconds(self.config.token_ttl);

        let permission_source = original.unwrap_or(effective);
        let claims = Claims {
            sub: effective.id.clone(),
            name: effective.name.clone(),
            role: effective.role,
            path: effective.path.clone(),
            can_input_incoming: permission_source.can_input_incoming,
            can_input_outgoing: permission_source.can_input_outgoing,
            original_user: original.map(|u| u.name.clone()),
            sid: session_id.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(format!("JWT encode failed: {}", e)))?;

        let session = Session {
            id: session_id,
            user_id: effective.id.clone(),
            issued_at: now.to_rfc3339(),
            expires_at: expires.to_rfc3339(),
            revoked: false,
        };

        self.insert_record(
            "sessions",
            &session.id,
            &session,
            &[
                ("user_id", Value::Text(session.user_id.clone())),
                ("revoked", Value::Integer(0)),
                ("issued_at", Value::Text(session.issued_at.clone())),
                ("expires_at", Value::Text(session.expires_at.clone())),
            ],
        )?;

        Ok((token, session))
    }

    /// Verify and decode a JWT. Returns the claims if the signature
    /// holds, the token has not expired, and the session is not
    /// revoked.
    pub fn verify_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?;

        let claims = token_data.claims;

        if let Ok(session) = self.get_record::<Session>("sessions", &claims.sid) {
            if session.revoked {
                return Err(ServiceError::Unauthorized("session has been revoked".into()));
            }
        }

        Ok(claims)
    }

    /// Revoke a session. The matching token fails validation afterwards.
    pub fn revoke_session(&self, session_id: &str) -> Result<(), ServiceError> {
        let mut session: Session = self.get_record("sessions", session_id)?;
        session.revoked = true;

        self.update_record(
            "sessions",
            session_id,
            &session,
            &[("revoked", Value::Integer(1))],
        )?;

        Ok(())
    }

    /// Get a session by id.
    pub fn get_session(&self, id: &str) -> Result<Session, ServiceError> {
        self.get_record("sessions", id)
    }
}

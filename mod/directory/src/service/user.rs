use esurat_core::{
    ListParams, ListResult, OrgUser, Role, ServiceError, UserDirectory, merge_patch, new_id,
    now_rfc3339,
};
use esurat_sql::Value;

use crate::model::{CreateUser, UpdateAuthority, UpdatePermissions, User};
use crate::service::{DirectoryService, password};

/// Indexed columns kept in sync with the JSON document on every write.
fn index_columns(user: &User) -> Vec<(&'static str, Value)> {
    vec![
        ("username", Value::Text(user.username.clone())),
        ("name", Value::Text(user.name.clone())),
        ("role", Value::Text(user.role.as_str().to_string())),
        (
            "parent_id",
            match &user.parent_id {
                Some(p) => Value::Text(p.clone()),
                None => Value::Null,
            },
        ),
        ("path", Value::Text(user.path.clone())),
        ("updated_at", Value::Text(user.updated_at.clone())),
    ]
}

impl DirectoryService {
    /// Create a new user. The ancestry path is derived from the parent;
    /// the user's own component defaults to the username.
    pub fn create_user(&self, input: CreateUser) -> Result<User, ServiceError> {
        if input.username.trim().is_empty() {
            return Err(ServiceError::Validation("username is required".into()));
        }
        if input.password.is_empty() {
            return Err(ServiceError::Validation("password is required".into()));
        }
        if input.name.trim().is_empty() {
            return Err(ServiceError::Validation("name is required".into()));
        }

        let segment = input
            .path_segment
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| input.username.clone());
        if segment.contains('.') {
            return Err(ServiceError::Validation(
                "path segment must not contain '.'".into(),
            ));
        }

        if self.find_by_username(&input.username)?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "username '{}' already taken",
                input.username
            )));
        }

        let path = match &input.parent_id {
            Some(pid) => {
                let parent = self.get_user_record(pid).map_err(|_| {
                    ServiceError::Validation(format!("parent user '{}' not found", pid))
                })?;
                format!("{}.{}", parent.path, segment)
            }
            None => segment,
        };

        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            username: input.username,
            password_hash: password::hash_password(&input.password)?,
            name: input.name,
            role: input.role,
            sign_code: input.sign_code,
            parent_id: input.parent_id,
            path,
            on_leave: false,
            substitute: None,
            can_input_incoming: input.can_input_incoming,
            can_input_outgoing: input.can_input_outgoing,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let mut indexes = index_columns(&user);
        indexes.push(("created_at", Value::Text(now)));
        self.insert_record("users", &user.id, &user, &indexes)?;
        Ok(user)
    }

    /// Get the full user record (including the password hash).
    pub fn get_user_record(&self, id: &str) -> Result<User, ServiceError> {
        self.get_record("users", id)
    }

    /// Look up a user by login name.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let users = self.query_users(
            "SELECT data FROM users WHERE username = ?1",
            &[Value::Text(username.to_string())],
        )?;
        Ok(users.into_iter().next())
    }

    /// List users as public projections, with pagination, an optional
    /// role filter, and an optional substring search on username/name.
    pub fn search_users(
        &self,
        params: &ListParams,
        role: Option<&str>,
    ) -> Result<ListResult<serde_json::Value>, ServiceError> {
        let mut where_clauses = Vec::new();
        let mut bind: Vec<Value> = Vec::new();

        if let Some(role) = role {
            where_clauses.push(format!("role = ?{}", bind.len() + 1));
            bind.push(Value::Text(role.to_string()));
        }
        if let Some(q) = &params.q {
            let pattern = format!("%{}%", q);
            let i = bind.len() + 1;
            where_clauses.push(format!("(username LIKE ?{} OR name LIKE ?{})", i, i + 1));
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern));
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as cnt FROM users{}", where_sql);
        let count_rows = self
            .sql
            .query(&count_sql, &bind)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let limit_idx = bind.len() + 1;
        let offset_idx = bind.len() + 2;
        bind.push(Value::Integer(params.limit as i64));
        bind.push(Value::Integer(params.offset as i64));

        let sql = format!(
            "SELECT data FROM users{} ORDER BY path ASC, username ASC LIMIT ?{} OFFSET ?{}",
            where_sql, limit_idx, offset_idx,
        );
        let users = self.query_users(&sql, &bind)?;

        Ok(ListResult {
            items: users.iter().map(User::public_json).collect(),
            total,
        })
    }

    /// Update a user with JSON merge-patch semantics.
    ///
    /// `id`, `createdAt`, and `path` are not patchable; `password`
    /// (plaintext) is accepted and re-hashed; a changed `parentId`
    /// re-derives the path and moves the whole subtree along.
    pub fn update_user(&self, id: &str, patch: serde_json::Value) -> Result<User, ServiceError> {
        let current: User = self.get_record("users", id)?;
        let now = now_rfc3339();
        let old_path = current.path.clone();
        let old_parent = current.parent_id.clone();

        let mut patch = patch;
        let mut new_password: Option<String> = None;
        if let Some(obj) = patch.as_object_mut() {
            if let Some(pw) = obj.remove("password") {
                if let Some(pw) = pw.as_str() {
                    new_password = Some(pw.to_string());
                }
            }
            obj.remove("passwordHash");
            obj.remove("path");
        }

        let mut base =
            serde_json::to_value(&current).map_err(|e| ServiceError::Internal(e.to_string()))?;
        merge_patch(&mut base, &patch);
        // Force updated_at and preserve id/created_at
        base["updatedAt"] = serde_json::json!(now);
        base["id"] = serde_json::json!(current.id);
        base["createdAt"] = serde_json::json!(current.created_at);
        if let Some(pw) = new_password {
            base["passwordHash"] = serde_json::json!(password::hash_password(&pw)?);
        }

        let mut updated: User = serde_json::from_value(base)
            .map_err(|e| ServiceError::Validation(format!("invalid user patch: {}", e)))?;

        if updated.parent_id != old_parent {
            let segment = old_path.rsplit('.').next().unwrap_or(&old_path).to_string();
            updated.path = match &updated.parent_id {
                Some(pid) => {
                    let parent = self.get_user_record(pid).map_err(|_| {
                        ServiceError::Validation(format!("parent user '{}' not found", pid))
                    })?;
                    if parent.id == updated.id
                        || parent.path.starts_with(&format!("{}.", old_path))
                    {
                        return Err(ServiceError::Validation(
                            "user cannot be moved under its own subtree".into(),
                        ));
                    }
                    format!("{}.{}", parent.path, segment)
                }
                None => segment,
            };
        } else {
            updated.path = old_path.clone();
        }

        self.update_record("users", id, &updated, &index_columns(&updated))?;

        if updated.path != old_path {
            self.repath_descendants(&old_path, &updated.path)?;
        }

        Ok(updated)
    }

    /// Delete a user. Refused while the user still has subordinates;
    /// open sessions are removed alongside.
    pub fn delete_user(&self, id: &str) -> Result<(), ServiceError> {
        let user: User = self.get_record("users", id)?;

        let rows = self
            .sql
            .query(
                "SELECT COUNT(*) as cnt FROM users WHERE parent_id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let subordinates = rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0);
        if subordinates > 0 {
            return Err(ServiceError::Conflict(format!(
                "user '{}' still has {} subordinates",
                user.username, subordinates
            )));
        }

        self.sql
            .exec(
                "DELETE FROM sessions WHERE user_id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        self.delete_record("users", id)
    }

    /// Set or clear leave state. The substitute reference is cleared
    /// whenever leave ends, and must name another existing user.
    pub fn update_authority(
        &self,
        user_id: &str,
        input: UpdateAuthority,
    ) -> Result<User, ServiceError> {
        let mut user: User = self.get_record("users", user_id)?;

        let substitute = if input.on_leave { input.substitute } else { None };
        if let Some(sid) = &substitute {
            if sid == user_id {
                return Err(ServiceError::Validation(
                    "a user cannot substitute for themselves".into(),
                ));
            }
            self.get_user_record(sid).map_err(|_| {
                ServiceError::Validation(format!("substitute user '{}' not found", sid))
            })?;
        }

        user.on_leave = input.on_leave;
        user.substitute = substitute;
        user.updated_at = now_rfc3339();
        self.update_record("users", user_id, &user, &index_columns(&user))?;
        Ok(user)
    }

    /// Set the two mail-input permissions.
    pub fn update_permissions(
        &self,
        user_id: &str,
        input: UpdatePermissions,
    ) -> Result<User, ServiceError> {
        let mut user: User = self.get_record("users", user_id)?;
        user.can_input_incoming = input.can_input_incoming;
        user.can_input_outgoing = input.can_input_outgoing;
        user.updated_at = now_rfc3339();
        self.update_record("users", user_id, &user, &index_columns(&user))?;
        Ok(user)
    }

    /// Install a pre-computed PHC hash on an account, replacing the
    /// seeded default. The server applies the operator-configured
    /// superadmin hash through this at boot.
    pub fn apply_password_hash(
        &self,
        username: &str,
        hash: &str,
    ) -> Result<(), ServiceError> {
        let mut user = self
            .find_by_username(username)?
            .ok_or_else(|| ServiceError::NotFound(format!("users '{}' not found", username)))?;

        if user.password_hash == hash {
            return Ok(());
        }

        user.password_hash = hash.to_string();
        user.updated_at = now_rfc3339();
        self.update_record("users", &user.id, &user, &index_columns(&user))
    }

    /// Run a query returning `data` rows and deserialize each into a
    /// User. Undecodable rows are skipped with a warning.
    pub(crate) fn query_users(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<User>, ServiceError> {
        let rows = self
            .sql
            .query(sql, params)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut users = Vec::new();
        for row in &rows {
            if let Some(data) = row.get_str("data") {
                match serde_json::from_str::<User>(data) {
                    Ok(u) => users.push(u),
                    Err(e) => tracing::warn!("skipping undecodable user row: {}", e),
                }
            }
        }
        Ok(users)
    }

    /// Rewrite the paths of every descendant after a subtree move.
    fn repath_descendants(&self, old_path: &str, new_path: &str) -> Result<(), ServiceError> {
        let prefix = format!("{}.", old_path);
        let descendants = self.query_users(
            "SELECT data FROM users WHERE path LIKE ?1",
            &[Value::Text(format!("{}%", prefix))],
        )?;

        for mut d in descendants {
            // LIKE treats '_' as a wildcard, so re-check the prefix.
            if !d.path.starts_with(&prefix) {
                continue;
            }
            let remainder = d.path[prefix.len()..].to_string();
            d.path = format!("{}.{}", new_path, remainder);
            d.updated_at = now_rfc3339();
            self.update_record("users", &d.id, &d, &index_columns(&d))?;
        }
        Ok(())
    }
}

impl UserDirectory for DirectoryService {
    fn get_user(&self, id: &str) -> Result<OrgUser, ServiceError> {
        let user: User = self.get_record("users", id)?;
        Ok(OrgUser::from(&user))
    }

    fn find_by_role(&self, role: Role) -> Result<Vec<OrgUser>, ServiceError> {
        let users = self.query_users(
            "SELECT data FROM users WHERE role = ?1 ORDER BY username ASC",
            &[Value::Text(role.as_str().to_string())],
        )?;
        Ok(users.iter().map(OrgUser::from).collect())
    }

    fn list_users(&self) -> Result<Vec<OrgUser>, ServiceError> {
        let users = self.query_users("SELECT data FROM users ORDER BY path ASC, username ASC", &[])?;
        Ok(users.iter().map(OrgUser::from).collect())
    }

    fn direct_subordinates(&self, user_id: &str) -> Result<Vec<OrgUser>, ServiceError> {
        let users = self.query_users(
            "SELECT data FROM users WHERE parent_id = ?1 ORDER BY username ASC",
            &[Value::Text(user_id.to_string())],
        )?;
        Ok(users.iter().map(OrgUser::from).collect())
    }

    fn display_name(&self, id: &str) -> Option<String> {
        self.get_record::<User>("users", id).ok().map(|u| u.name)
    }
}

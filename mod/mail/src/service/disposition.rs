use std::collections::HashSet;

use tracing::info;

use esurat_core::{
    Claims, ListParams, ListResult, OrgUser, Role, ServiceError, merge_patch, now_rfc3339,
};
use esurat_sql::Value;

use crate::model::{Disposition, HistoryEntry, RouteCommand};
use crate::service::MailService;

/// Indexed columns kept in sync with the JSON document on every write.
pub(crate) fn index_columns(disp: &Disposition) -> Vec<(&'static str, Value)> {
    vec![
        ("mail_id", Value::Text(disp.mail_id.clone())),
        ("mail_subject", Value::Text(disp.mail_subject.clone())),
        ("status", Value::Text(disp.status.as_str().to_string())),
        ("recipient_id", Value::Text(disp.recipient_id.clone())),
        ("recipient_name", Value::Text(disp.recipient_name.clone())),
        ("instruction", Value::Text(disp.instruction.clone())),
        ("updated_at", Value::Text(disp.updated_at.clone())),
    ]
}

/// Whether `claims` may act on a disposition: route it onward or change
/// its status.
///
/// Superadmin always may. An unassigned disposition is picked up by the
/// general-affairs subsection head; an assigned one only by its current
/// recipient.
pub fn can_direct(claims: &Claims, disp: &Disposition) -> bool {
    if claims.is_superadmin() {
        return true;
    }
    if disp.recipient_id.is_empty() {
        return claims.role == Role::KasubUmum;
    }
    disp.recipient_id == claims.sub
}

/// Non-privileged visibility: own task, a task the user routed at some
/// point, or a task currently sitting with a direct subordinate.
fn visible_to(disp: &Disposition, user_id: &str, subordinate_ids: &HashSet<String>) -> bool {
    disp.recipient_id == user_id
        || disp.history.iter().any(|h| h.from_id == user_id)
        || (!disp.recipient_id.is_empty() && subordinate_ids.contains(&disp.recipient_id))
}

impl MailService {
    /// Fetch one disposition by id, without a visibility check.
    pub fn get_disposition(&self, id: &str) -> Result<Disposition, ServiceError> {
        self.get_record("dispositions", id)
    }

    /// Fetch one disposition on behalf of a caller, enforcing the same
    /// visibility rules as [`Self::list_dispositions`].
    pub fn get_disposition_for(
        &self,
        id: &str,
        claims: &Claims,
    ) -> Result<Disposition, ServiceError> {
        let disp = self.get_disposition(id)?;
        if matches!(claims.role, Role::Superadmin | Role::Kpa) {
            return Ok(disp);
        }
        let subordinate_ids = self.subordinate_ids(&claims.sub)?;
        if visible_to(&disp, &claims.sub, &subordinate_ids) {
            Ok(disp)
        } else {
            Err(ServiceError::PermissionDenied(
                "this disposition is not visible to you".into(),
            ))
        }
    }

    /// List dispositions visible to the caller, newest first, with an
    /// optional substring search over mail subject, recipient name, and
    /// instruction.
    ///
    /// Superadmin and KPA see everything. Visibility depends on the
    /// caller's position in the org chart, so pagination runs after the
    /// filter.
    pub fn list_dispositions(
        &self,
        params: &ListParams,
        claims: &Claims,
    ) -> Result<ListResult<Disposition>, ServiceError> {
        let mut where_sql = String::new();
        let mut bind: Vec<Value> = Vec::new();

        if let Some(q) = &params.q {
            let pattern = format!("%{}%", q);
            where_sql =
                " WHERE (mail_subject LIKE ?1 OR recipient_name LIKE ?2 OR instruction LIKE ?3)"
                    .to_string();
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern));
        }

        let sql = format!(
            "SELECT data FROM dispositions{} ORDER BY created_at DESC",
            where_sql
        );
        let all: Vec<Disposition> = self.query_records("disposition", &sql, &bind)?;

        let visible = if matches!(claims.role, Role::Superadmin | Role::Kpa) {
            all
        } else {
            let subordinate_ids = self.subordinate_ids(&claims.sub)?;
            all.into_iter()
                .filter(|d| visible_to(d, &claims.sub, &subordinate_ids))
                .collect()
        };

        let total = visible.len();
        let items = visible
            .into_iter()
            .skip(params.offset)
            .take(params.limit)
            .collect();

        Ok(ListResult { items, total })
    }

    /// Update a disposition with JSON merge-patch semantics.
    ///
    /// Assignment moves through the `recipient` key: a non-empty value
    /// becomes the new `recipientId`, anything else keeps the stored
    /// one. An empty or null `recipientName` likewise never clears the
    /// stored name. `id`, `mailId`, and `createdAt` are not patchable.
    pub fn update_disposition(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Disposition, ServiceError> {
        let current = self.get_disposition(id)?;
        let now = now_rfc3339();

        let mut patch = patch;
        if let Some(obj) = patch.as_object_mut() {
            obj.remove("id");
            obj.remove("createdAt");
            obj.remove("mailId");
            obj.remove("recipientId");

            match obj.remove("recipient") {
                Some(serde_json::Value::String(rid)) if !rid.is_empty() => {
                    obj.insert("recipientId".to_string(), serde_json::json!(rid));
                }
                _ => {}
            }

            let keep_stored_name = match obj.get("recipientName") {
                Some(serde_json::Value::Null) => true,
                Some(serde_json::Value::String(s)) => s.is_empty(),
                _ => false,
            };
            if keep_stored_name {
                obj.remove("recipientName");
            }
        }

        let mut base = serde_json::to_value(&current)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        merge_patch(&mut base, &patch);
        // Force updated_at and preserve id/created_at
        base["id"] = serde_json::json!(current.id);
        base["createdAt"] = serde_json::json!(current.created_at);
        base["updatedAt"] = serde_json::json!(now);

        let updated: Disposition = serde_json::from_value(base)
            .map_err(|e| ServiceError::Validation(format!("invalid disposition patch: {}", e)))?;

        self.update_record("dispositions", id, &updated, &index_columns(&updated))?;
        self.mirror.update("dispositions", id, &updated);
        Ok(updated)
    }

    /// Route a disposition: update its status and instruction, and when
    /// a recipient is named, hand it over and append the hop to the
    /// history chain.
    pub fn route_disposition(
        &self,
        id: &str,
        claims: &Claims,
        cmd: RouteCommand,
    ) -> Result<Disposition, ServiceError> {
        let current = self.get_disposition(id)?;

        if !can_direct(claims, &current) {
            return Err(ServiceError::PermissionDenied(
                "you may not direct this disposition".into(),
            ));
        }
        if cmd.instruction.trim().is_empty() {
            return Err(ServiceError::Validation("instruction is required".into()));
        }

        let next_recipient = match cmd.recipient.as_deref().filter(|r| !r.is_empty()) {
            Some(rid) => Some(self.directory.get_user(rid)?),
            None => None,
        };

        let mut patch = serde_json::json!({
            "instruction": cmd.instruction.clone(),
        });
        if let Some(status) = cmd.status {
            patch["status"] = serde_json::json!(status);
        }
        if let Some(recipient) = next_recipient {
            let mut history = current.history.clone();
            history.push(HistoryEntry {
                from_id: claims.sub.clone(),
                from: claims.name.clone(),
                to_id: recipient.id.clone(),
                to: recipient.name.clone(),
                timestamp: now_rfc3339(),
                instruction: cmd.instruction.clone(),
            });

            patch["recipient"] = serde_json::json!(recipient.id);
            patch["recipientName"] = serde_json::json!(recipient.name);
            patch["history"] = serde_json::to_value(&history)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
        }

        let updated = self.update_disposition(id, patch)?;
        info!(
            "disposition {} directed by {} (status {})",
            updated.id, claims.sub, updated.status
        );
        Ok(updated)
    }

    /// Users the caller may route a disposition to, following the
    /// standing escalation paths of the court workflow.
    ///
    /// Substitutes route with the absent user's role and position, not
    /// their own.
    pub fn route_targets(&self, claims: &Claims) -> Result<Vec<OrgUser>, ServiceError> {
        let all = self.directory.list_users()?;

        let (role, path) = match claims
            .original_user
            .as_deref()
            .and_then(|name| all.iter().find(|u| u.name == name))
        {
            Some(original) => (original.role, original.path.clone()),
            None => (claims.role, claims.path.clone()),
        };

        let targets = match role {
            Role::KasubUmum => all
                .into_iter()
                .filter(|u| matches!(u.role, Role::Kpa | Role::Sekretaris))
                .collect(),
            Role::Kpa => all
                .into_iter()
                .filter(|u| matches!(u.role, Role::Sekretaris | Role::Panitera))
                .collect(),
            Role::Sekretaris => all.into_iter().filter(|u| u.role == Role::Kasub).collect(),
            Role::Panitera => all.into_iter().filter(|u| u.role == Role::Panmud).collect(),
            Role::Kasub | Role::Panmud => {
                let prefix = format!("{}.", path);
                all.into_iter()
                    .filter(|u| u.role == Role::Pelaksana && u.path.starts_with(&prefix))
                    .collect()
            }
            Role::Superadmin => all.into_iter().filter(|u| u.id != claims.sub).collect(),
            Role::Pelaksana => Vec::new(),
        };

        Ok(targets)
    }

    fn subordinate_ids(&self, user_id: &str) -> Result<HashSet<String>, ServiceError> {
        Ok(self
            .directory
            .direct_subordinates(user_id)?
            .into_iter()
            .map(|u| u.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use esurat_core::{ListParams, ServiceError};

    use super::*;
    use crate::model::{CreateIncomingMail, DispositionStatus};
    use crate::service::testutil::{claims, test_service};

    fn intake(svc: &Arc<MailService>, subject: &str, recipient: Option<&str>) -> Disposition {
        let (_, disp) = svc
            .add_incoming_mail(CreateIncomingMail {
                sender: "Pengadilan Tinggi Agama".to_string(),
                subject: subject.to_string(),
                received_date: None,
                mail_date: None,
                file_url: None,
                classification_code: "UM.01".to_string(),
                initial_recipient_id: recipient.map(|r| r.to_string()),
            })
            .unwrap();
        disp
    }

    fn visible_ids(svc: &Arc<MailService>, user: &str) -> Vec<String> {
        svc.list_dispositions(&ListParams::default(), &claims(user))
            .unwrap()
            .items
            .into_iter()
            .map(|d| d.id)
            .collect()
    }

    #[test]
    fn test_visibility_follows_org_chart() {
        let (svc, _tmp) = test_service();

        let to_staff = intake(&svc, "Untuk Staf Umum", Some("pu-1"));
        let unassigned = intake(&svc, "Belum Diarahkan", None);

        // Superadmin and KPA see everything, unassigned included.
        for privileged in ["adm-1", "kpa-1"] {
            let seen = visible_ids(&svc, privileged);
            assert!(seen.contains(&to_staff.id));
            assert!(seen.contains(&unassigned.id));
        }

        // The recipient sees their own task.
        assert!(visible_ids(&svc, "pu-1").contains(&to_staff.id));

        // The direct superior sees it; a grand-superior does not.
        assert!(visible_ids(&svc, "ku-1").contains(&to_staff.id));
        assert!(!visible_ids(&svc, "sek-1").contains(&to_staff.id));

        // Unassigned tasks are invisible to everyone below KPA, even to
        // the kasub umum who is allowed to pick them up.
        assert!(!visible_ids(&svc, "ku-1").contains(&unassigned.id));
        assert!(!visible_ids(&svc, "pu-1").contains(&unassigned.id));

        // get_disposition_for enforces the same rules.
        assert!(svc.get_disposition_for(&to_staff.id, &claims("ku-1")).is_ok());
        assert!(matches!(
            svc.get_disposition_for(&to_staff.id, &claims("sek-1")),
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_router_keeps_seeing_routed_task() {
        let (svc, _tmp) = test_service();

        let disp = intake(&svc, "Perkara Warisan", Some("pm-1"));
        svc.route_disposition(
            &disp.id,
            &claims("pm-1"),
            RouteCommand {
                recipient: Some("ph-1".to_string()),
                status: Some(DispositionStatus::Process),
                instruction: "Siapkan berkas".to_string(),
            },
        )
        .unwrap();

        // Sender stays in the loop through the history chain.
        assert!(visible_ids(&svc, "pm-1").contains(&disp.id));
        assert!(visible_ids(&svc, "ph-1").contains(&disp.id));
        // The panitera is two levels above the new recipient and never
        // touched the task.
        assert!(!visible_ids(&svc, "pan-1").contains(&disp.id));
    }

    #[test]
    fn test_can_direct_matrix() {
        let (svc, _tmp) = test_service();

        let unassigned = intake(&svc, "Tanpa Penerima", None);
        assert!(can_direct(&claims("adm-1"), &unassigned));
        assert!(can_direct(&claims("ku-1"), &unassigned));
        assert!(!can_direct(&claims("kk-1"), &unassigned));
        assert!(!can_direct(&claims("pu-1"), &unassigned));

        let assigned = intake(&svc, "Untuk Staf", Some("pu-1"));
        assert!(can_direct(&claims("pu-1"), &assigned));
        assert!(can_direct(&claims("adm-1"), &assigned));
        // Even the superior may not act while the task sits with the
        // staff member.
        assert!(!can_direct(&claims("ku-1"), &assigned));
    }

    #[test]
    fn test_route_disposition_appends_history() {
        let (svc, _tmp) = test_service();
        let disp = intake(&svc, "Undangan Rapat", Some("kpa-1"));

        let routed = svc
            .route_disposition(
                &disp.id,
                &claims("kpa-1"),
                RouteCommand {
                    recipient: Some("sek-1".to_string()),
                    status: Some(DispositionStatus::Process),
                    instruction: "Tindak lanjuti segera".to_string(),
                },
            )
            .unwrap();

        assert_eq!(routed.recipient_id, "sek-1");
        assert_eq!(routed.recipient_name, "Sekretaris");
        assert_eq!(routed.status, DispositionStatus::Process);
        assert_eq!(routed.instruction, "Tindak lanjuti segera");
        assert_eq!(routed.history.len(), 1);
        let hop = &routed.history[0];
        assert_eq!(hop.from_id, "kpa-1");
        assert_eq!(hop.from, "Ketua Pengadilan Agama");
        assert_eq!(hop.to_id, "sek-1");
        assert_eq!(hop.instruction, "Tindak lanjuti segera");
        assert!(!hop.timestamp.is_empty());

        // The chain grows hop by hop, oldest first.
        let routed = svc
            .route_disposition(
                &disp.id,
                &claims("sek-1"),
                RouteCommand {
                    recipient: Some("kk-1".to_string()),
                    status: None,
                    instruction: "Proses administrasi".to_string(),
                },
            )
            .unwrap();
        assert_eq!(routed.history.len(), 2);
        assert_eq!(routed.history[0].from_id, "kpa-1");
        assert_eq!(routed.history[1].from_id, "sek-1");

        // A status-only update leaves the chain and assignment alone.
        let completed = svc
            .route_disposition(
                &disp.id,
                &claims("kk-1"),
                RouteCommand {
                    recipient: None,
                    status: Some(DispositionStatus::Completed),
                    instruction: "Selesai dikerjakan".to_string(),
                },
            )
            .unwrap();
        assert_eq!(completed.status, DispositionStatus::Completed);
        assert_eq!(completed.history.len(), 2);
        assert_eq!(completed.recipient_id, "kk-1");
    }

    #[test]
    fn test_route_disposition_guards() {
        let (svc, _tmp) = test_service();
        let disp = intake(&svc, "Surat Penting", Some("kpa-1"));

        // Not the recipient.
        assert!(matches!(
            svc.route_disposition(
                &disp.id,
                &claims("pu-1"),
                RouteCommand {
                    recipient: Some("sek-1".to_string()),
                    status: None,
                    instruction: "Coba ambil".to_string(),
                },
            ),
            Err(ServiceError::PermissionDenied(_))
        ));

        // Instruction is mandatory.
        assert!(matches!(
            svc.route_disposition(
                &disp.id,
                &claims("kpa-1"),
                RouteCommand {
                    recipient: Some("sek-1".to_string()),
                    status: None,
                    instruction: "  ".to_string(),
                },
            ),
            Err(ServiceError::Validation(_))
        ));

        // Unknown recipient.
        assert!(matches!(
            svc.route_disposition(
                &disp.id,
                &claims("kpa-1"),
                RouteCommand {
                    recipient: Some("ghost".to_string()),
                    status: None,
                    instruction: "Ke mana ini".to_string(),
                },
            ),
            Err(ServiceError::NotFound(_))
        ));

        // Nothing stuck to the disposition.
        let unchanged = svc.get_disposition(&disp.id).unwrap();
        assert_eq!(unchanged.recipient_id, "kpa-1");
        assert!(unchanged.history.is_empty());
    }

    #[test]
    fn test_update_disposition_recipient_contract() {
        let (svc, _tmp) = test_service();
        let disp = intake(&svc, "Kontrak Penerima", Some("kpa-1"));

        // Assignment moves through `recipient`.
        let moved = svc
            .update_disposition(
                &disp.id,
                serde_json::json!({"recipient": "sek-1", "recipientName": "Sekretaris"}),
            )
            .unwrap();
        assert_eq!(moved.recipient_id, "sek-1");
        assert_eq!(moved.recipient_name, "Sekretaris");

        // Empty values keep the stored assignment.
        let kept = svc
            .update_disposition(
                &disp.id,
                serde_json::json!({"recipient": "", "recipientName": "", "status": "process"}),
            )
            .unwrap();
        assert_eq!(kept.recipient_id, "sek-1");
        assert_eq!(kept.recipient_name, "Sekretaris");
        assert_eq!(kept.status, DispositionStatus::Process);

        // A raw recipientId never takes effect, and protected fields
        // stay put.
        let ignored = svc
            .update_disposition(
                &disp.id,
                serde_json::json!({"recipientId": "hax", "id": "hax", "mailId": "hax", "createdAt": "hax"}),
            )
            .unwrap();
        assert_eq!(ignored.recipient_id, "sek-1");
        assert_eq!(ignored.id, disp.id);
        assert_eq!(ignored.mail_id, disp.mail_id);
        assert_eq!(ignored.created_at, disp.created_at);
    }

    #[test]
    fn test_route_targets_per_role() {
        let (svc, _tmp) = test_service();

        let ids = |user: &str| -> Vec<String> {
            let mut ids: Vec<String> = svc
                .route_targets(&claims(user))
                .unwrap()
                .into_iter()
                .map(|u| u.id)
                .collect();
            ids.sort();
            ids
        };

        // Kasub umum escalates upward.
        assert_eq!(ids("ku-1"), vec!["kpa-1", "sek-1"]);
        // KPA fans out to the two chains.
        assert_eq!(ids("kpa-1"), vec!["pan-1", "sek-1"]);
        // Sekretaris reaches subsection heads; the kasub umum role is a
        // separate role and stays out.
        assert_eq!(ids("sek-1"), vec!["kk-1"]);
        assert_eq!(ids("pan-1"), vec!["pm-1"]);
        // Heads reach only their own staff.
        assert_eq!(ids("kk-1"), vec!["pk-1"]);
        assert_eq!(ids("pm-1"), vec!["ph-1"]);
        // Staff route nowhere.
        assert!(ids("pu-1").is_empty());
        // Superadmin reaches everyone but themselves.
        assert_eq!(ids("adm-1").len(), 9);
    }

    #[test]
    fn test_route_targets_under_substitution() {
        let (svc, _tmp) = test_service();

        // A staff member standing in for the kasub umum routes with the
        // absent user's role and position.
        let mut substitute = claims("pu-1");
        substitute.original_user = Some("Kasub Umum Keuangan".to_string());

        let mut ids: Vec<String> = svc
            .route_targets(&substitute)
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["kpa-1", "sek-1"]);
    }
}

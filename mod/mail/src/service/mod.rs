pub mod catalog;
pub mod disposition;
pub mod incoming;
pub mod numbering;
pub mod outgoing;
pub mod schema;

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use esurat_core::{ServiceError, UserDirectory, merge_patch, now_rfc3339};
use esurat_kv::KVStore;
use esurat_sql::{SQLError, SQLStore, Value};

use crate::mirror::MirrorHandle;
use crate::model::MailKind;

/// Configuration for the mail service.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Court office code embedded in outgoing mail numbers.
    pub office_code: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            office_code: "W3-A7".to_string(),
        }
    }
}

/// The mail service. Sole writer of the mail ledger: incoming mails,
/// outgoing mails, and dispositions.
pub struct MailService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) kv: Arc<dyn KVStore>,
    pub(crate) directory: Arc<dyn UserDirectory>,
    pub(crate) mirror: MirrorHandle,
    pub(crate) config: MailConfig,
    /// Serializes counter read-modify-write cycles.
    pub(crate) counter_lock: Mutex<()>,
}

impl MailService {
    /// Create a new MailService, initializing the DB schema and seeding
    /// the classification catalog on first run.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        directory: Arc<dyn UserDirectory>,
        mirror: MirrorHandle,
        config: MailConfig,
    ) -> Result<Arc<Self>, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        let svc = Arc::new(Self {
            sql,
            kv,
            directory,
            mirror,
            config,
            counter_lock: Mutex::new(()),
        });
        svc.seed_catalog()?;
        Ok(svc)
    }

    // ── Generic CRUD helpers ──

    /// Build the INSERT statement and bind list for a record. Split out
    /// of [`Self::insert_record`] so paired writes can go through
    /// `exec_many` in one transaction.
    pub(crate) fn insert_statement<T: Serialize>(
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(String, Vec<Value>), ServiceError> {
        let json = serde_json::to_string(record)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut cols = vec!["id", "data"];
        let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
        let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            let idx = i + 3;
            cols.push(col);
            placeholders.push(format!("?{}", idx));
            params.push(val.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", "),
        );

        Ok((sql, params))
    }

    /// Insert a record as JSON into a table with indexed columns.
    pub(crate) fn insert_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let (sql, params) = Self::insert_statement(table, id, record, indexes)?;
        self.sql.exec(&sql, &params).map_err(constraint_error)?;
        Ok(())
    }

    /// Get a record by id, deserializing the JSON `data` column.
    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<T, ServiceError> {
        let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
        let rows = self
            .sql
            .query(&sql, &[Value::Text(id.to_string())])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("{} '{}' not found", table, id)))?;
        let data = row
            .get_str("data")
            .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
        serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))
    }

    /// Update a record's JSON data and indexed columns.
    pub(crate) fn update_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let json = serde_json::to_string(record)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            let idx = i + 2;
            sets.push(format!("{} = ?{}", col, idx));
            params.push(val.clone());
        }

        let id_idx = params.len() + 1;
        params.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets.join(", "),
            id_idx,
        );

        let affected = self.sql.exec(&sql, &params).map_err(constraint_error)?;
        if affected == 0 {
            return Err(ServiceError::NotFound(format!("{} '{}' not found", table, id)));
        }

        Ok(())
    }

    /// Run a query returning `data` rows and deserialize each.
    /// Undecodable rows are skipped with a warning.
    pub(crate) fn query_records<T: DeserializeOwned>(
        &self,
        label: &str,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, ServiceError> {
        let rows = self
            .sql
            .query(sql, params)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut records = Vec::new();
        for row in &rows {
            if let Some(data) = row.get_str("data") {
                match serde_json::from_str::<T>(data) {
                    Ok(r) => records.push(r),
                    Err(e) => tracing::warn!("skipping undecodable {} row: {}", label, e),
                }
            }
        }
        Ok(records)
    }

    /// Run a `SELECT COUNT(*) as cnt` query.
    pub(crate) fn count_rows(&self, sql: &str, bind: &[Value]) -> Result<usize, ServiceError> {
        let rows = self
            .sql
            .query(sql, bind)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize)
    }

    /// Apply a merge patch to a mail record and persist it.
    ///
    /// `id`, `createdAt`, and the number stamped at creation are not
    /// patchable; `updatedAt` is always refreshed.
    pub(crate) fn apply_mail_patch<T: Serialize + DeserializeOwned>(
        &self,
        kind: MailKind,
        id: &str,
        mut patch: serde_json::Value,
        index_fn: fn(&T) -> Vec<(&'static str, Value)>,
    ) -> Result<T, ServiceError> {
        let current: T = self.get_record(kind.table(), id)?;
        let now = now_rfc3339();

        if let Some(obj) = patch.as_object_mut() {
            obj.remove("id");
            obj.remove("createdAt");
            obj.remove(kind.number_field());
        }

        let mut base = serde_json::to_value(&current)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let original_id = base["id"].clone();
        let created_at = base["createdAt"].clone();
        merge_patch(&mut base, &patch);
        // Force updated_at and preserve id/created_at
        base["id"] = original_id;
        base["createdAt"] = created_at;
        base["updatedAt"] = serde_json::json!(now);

        let updated: T = serde_json::from_value(base)
            .map_err(|e| ServiceError::Validation(format!("invalid {} mail patch: {}", kind, e)))?;

        self.update_record(kind.table(), id, &updated, &index_fn(&updated))?;
        self.mirror.update(kind.table(), id, &updated);
        Ok(updated)
    }

    // ── Ledger-wide operations ──

    /// Dashboard counters over the whole ledger.
    pub fn stats(&self) -> Result<MailStats, ServiceError> {
        Ok(MailStats {
            incoming: self.count_rows("SELECT COUNT(*) as cnt FROM incoming_mails", &[])?,
            outgoing: self.count_rows("SELECT COUNT(*) as cnt FROM outgoing_mails", &[])?,
            dispositions: self.count_rows("SELECT COUNT(*) as cnt FROM dispositions", &[])?,
            pending_dispositions: self.count_rows(
                "SELECT COUNT(*) as cnt FROM dispositions WHERE status = ?1",
                &[Value::Text("pending".to_string())],
            )?,
            outgoing_not_uploaded: self
                .count_rows("SELECT COUNT(*) as cnt FROM outgoing_mails WHERE uploaded = 0", &[])?,
        })
    }

    /// Clear the whole ledger: all three tables plus both number
    /// counters, so numbering restarts at 1. The classification catalog
    /// is left in place.
    pub fn reset_ledger(&self) -> Result<LedgerReset, ServiceError> {
        let incoming = self
            .sql
            .exec("DELETE FROM incoming_mails", &[])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let outgoing = self
            .sql
            .exec("DELETE FROM outgoing_mails", &[])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let dispositions = self
            .sql
            .exec("DELETE FROM dispositions", &[])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        self.kv
            .delete(numbering::INCOMING_COUNTER_KEY)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        self.kv
            .delete(numbering::OUTGOING_COUNTER_KEY)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        info!(
            "mail ledger reset: {} incoming, {} outgoing, {} dispositions removed",
            incoming, outgoing, dispositions
        );

        Ok(LedgerReset {
            incoming_mails: incoming,
            outgoing_mails: outgoing,
            dispositions,
        })
    }
}

/// Map storage failures, surfacing UNIQUE violations as conflicts.
pub(crate) fn constraint_error(e: SQLError) -> ServiceError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint") {
        ServiceError::Conflict(msg)
    } else {
        ServiceError::Storage(msg)
    }
}

/// Today's date in the `YYYY-MM-DD` form the ledger stores dates in.
pub(crate) fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Ledger-wide counters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailStats {
    pub incoming: usize,
    pub outgoing: usize,
    pub dispositions: usize,
    pub pending_dispositions: usize,
    pub outgoing_not_uploaded: usize,
}

/// Rows removed by a ledger reset.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReset {
    pub incoming_mails: u64,
    pub outgoing_mails: u64,
    pub dispositions: u64,
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use esurat_core::{Claims, OrgUser, Role, StaticDirectory, UserDirectory};
    use esurat_kv::RedbStore;
    use esurat_sql::SqliteStore;

    use crate::mirror::MirrorHandle;
    use crate::service::{MailConfig, MailService};

    pub(crate) fn org_user(id: &str, name: &str, role: Role, path: &str) -> OrgUser {
        OrgUser {
            id: id.to_string(),
            username: id.to_string(),
            name: name.to_string(),
            role,
            sign_code: None,
            path: path.to_string(),
            can_input_incoming: false,
            can_input_outgoing: false,
        }
    }

    /// A fixed org chart shaped like the seeded court hierarchy.
    pub(crate) fn test_directory() -> Arc<StaticDirectory> {
        let mut adm = org_user("adm-1", "Super Admin", Role::Superadmin, "superadmin");
        adm.can_input_incoming = true;
        adm.can_input_outgoing = true;

        let mut kpa = org_user("kpa-1", "Ketua Pengadilan Agama", Role::Kpa, "kpa");
        kpa.sign_code = Some("KPA".to_string());

        let mut ku = org_user(
            "ku-1",
            "Kasub Umum Keuangan",
            Role::KasubUmum,
            "kpa.sekretaris.kasub_umum",
        );
        ku.can_input_incoming = true;

        let mut pu = org_user(
            "pu-1",
            "Staf Pelaksana Umum",
            Role::Pelaksana,
            "kpa.sekretaris.kasub_umum.pelaksana",
        );
        pu.can_input_outgoing = true;

        Arc::new(StaticDirectory::new(vec![
            adm,
            kpa,
            org_user("sek-1", "Sekretaris", Role::Sekretaris, "kpa.sekretaris"),
            org_user("pan-1", "Panitera", Role::Panitera, "kpa.panitera"),
            ku,
            org_user(
                "kk-1",
                "Kasub Kepegawaian",
                Role::Kasub,
                "kpa.sekretaris.kasub_kepeg",
            ),
            org_user(
                "pm-1",
                "Panmud Hukum",
                Role::Panmud,
                "kpa.panitera.panmud_hukum",
            ),
            pu,
            org_user(
                "pk-1",
                "Staf Pelaksana Kepegawaian",
                Role::Pelaksana,
                "kpa.sekretaris.kasub_kepeg.pelaksana",
            ),
            org_user(
                "ph-1",
                "Staf Pelaksana Hukum",
                Role::Pelaksana,
                "kpa.panitera.panmud_hukum.pelaksana",
            ),
        ]))
    }

    /// Claims as the JWT layer would mint them for a directory user.
    pub(crate) fn claims_for(user: &OrgUser) -> Claims {
        Claims {
            sub: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
            path: user.path.clone(),
            can_input_incoming: user.can_input_incoming,
            can_input_outgoing: user.can_input_outgoing,
            original_user: None,
            sid: "sid-test".to_string(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    pub(crate) fn claims(id: &str) -> Claims {
        let dir = test_directory();
        claims_for(&dir.get_user(id).unwrap())
    }

    /// Service over an in-memory SQL store and a redb file at `kv_path`.
    /// Reusing the path across calls simulates a daemon restart.
    pub(crate) fn service_at(kv_path: &Path) -> Arc<MailService> {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let kv = Arc::new(RedbStore::open(kv_path).unwrap());
        MailService::new(
            sql,
            kv,
            test_directory(),
            MirrorHandle::disabled(),
            MailConfig::default(),
        )
        .unwrap()
    }

    pub(crate) fn test_service() -> (Arc<MailService>, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let svc = service_at(tmp.path());
        (svc, tmp)
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::test_service;
    use crate::model::{CreateIncomingMail, CreateOutgoingMail, RouteCommand};

    fn incoming_input(subject: &str) -> CreateIncomingMail {
        CreateIncomingMail {
            sender: "Pengadilan Tinggi Agama".to_string(),
            subject: subject.to_string(),
            received_date: None,
            mail_date: None,
            file_url: None,
            classification_code: "UM.01".to_string(),
            initial_recipient_id: Some("kpa-1".to_string()),
        }
    }

    fn outgoing_input(subject: &str) -> CreateOutgoingMail {
        CreateOutgoingMail {
            recipient: "Mahkamah Agung".to_string(),
            subject: subject.to_string(),
            date: None,
            file_url: None,
            signatory: "KPA".to_string(),
            classification_code: "UM.01".to_string(),
        }
    }

    #[test]
    fn test_stats_counts_ledger_state() {
        let (svc, _tmp) = test_service();

        let empty = svc.stats().unwrap();
        assert_eq!(empty.incoming, 0);
        assert_eq!(empty.dispositions, 0);

        let (_, d1) = svc.add_incoming_mail(incoming_input("Rapat")).unwrap();
        svc.add_incoming_mail(incoming_input("Undangan")).unwrap();
        svc.add_outgoing_mail(outgoing_input("Balasan")).unwrap();

        // Routing one disposition out of pending.
        svc.route_disposition(
            &d1.id,
            &super::testutil::claims("kpa-1"),
            RouteCommand {
                recipient: Some("sek-1".to_string()),
                status: Some(crate::model::DispositionStatus::Process),
                instruction: "Tindak lanjuti".to_string(),
            },
        )
        .unwrap();

        let stats = svc.stats().unwrap();
        assert_eq!(stats.incoming, 2);
        assert_eq!(stats.outgoing, 1);
        assert_eq!(stats.dispositions, 2);
        assert_eq!(stats.pending_dispositions, 1);
        assert_eq!(stats.outgoing_not_uploaded, 1);
    }

    #[test]
    fn test_reset_ledger_clears_tables_and_counters() {
        let (svc, _tmp) = test_service();

        svc.add_incoming_mail(incoming_input("Pertama")).unwrap();
        svc.add_incoming_mail(incoming_input("Kedua")).unwrap();
        svc.add_outgoing_mail(outgoing_input("Keluar")).unwrap();

        let removed = svc.reset_ledger().unwrap();
        assert_eq!(removed.incoming_mails, 2);
        assert_eq!(removed.outgoing_mails, 1);
        assert_eq!(removed.dispositions, 2);

        let stats = svc.stats().unwrap();
        assert_eq!(stats.incoming, 0);
        assert_eq!(stats.dispositions, 0);

        // Numbering restarts at 1.
        let (mail, _) = svc.add_incoming_mail(incoming_input("Baru")).unwrap();
        assert!(mail.agenda_number.starts_with("SM1/"));

        // Catalog survives the reset.
        assert!(!svc.classifications().unwrap().is_empty());
    }

    /// Intake over the real seeded directory instead of the static
    /// test chart: login as the mail desk, register a letter for the
    /// KPA, and check the companion disposition reaches their desk.
    #[test]
    fn test_seeded_intake_lands_on_the_kpa_desk() {
        use std::sync::Arc;

        use chrono::{Datelike, Utc};
        use directory::service::{DirectoryConfig, DirectoryService};
        use esurat_core::{Role, UserDirectory};
        use esurat_kv::RedbStore;
        use esurat_sql::SqliteStore;

        use crate::mirror::MirrorHandle;
        use crate::model::DispositionStatus;
        use crate::service::numbering::roman_month;
        use crate::service::{MailConfig, MailService};

        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let dir = DirectoryService::new(sql.clone(), DirectoryConfig::default()).unwrap();

        let login = dir.login("kasub_umum", "password").unwrap();
        let claims = dir.verify_token(&login.access_token).unwrap();
        assert!(claims.can_input_incoming);

        let kpa = dir.find_by_role(Role::Kpa).unwrap().remove(0);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        let kv = Arc::new(RedbStore::open(tmp.path()).unwrap());
        let svc = MailService::new(sql, kv, dir, MirrorHandle::disabled(), MailConfig::default())
            .unwrap();

        let mut input = incoming_input("Permintaan Data Perkara");
        input.initial_recipient_id = Some(kpa.id.clone());
        let (mail, disp) = svc.add_incoming_mail(input).unwrap();

        let now = Utc::now();
        assert_eq!(
            mail.agenda_number,
            format!("SM1/UM.01/{}/{}", roman_month(now.month()), now.year())
        );
        assert_eq!(disp.status, DispositionStatus::Pending);
        assert_eq!(disp.recipient_id, kpa.id);
        assert_eq!(disp.recipient_name, "Ketua Pengadilan Agama");
        assert!(disp.history.is_empty());
    }
}

use tracing::info;

use esurat_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use esurat_sql::Value;

use crate::model::{CreateIncomingMail, Disposition, DispositionStatus, IncomingMail, MailKind};
use crate::service::{MailService, constraint_error, disposition, today};

/// Indexed columns kept in sync with the JSON document on every write.
fn index_columns(mail: &IncomingMail) -> Vec<(&'static str, Value)> {
    vec![
        ("sender", Value::Text(mail.sender.clone())),
        ("subject", Value::Text(mail.subject.clone())),
        ("agenda_number", Value::Text(mail.agenda_number.clone())),
        (
            "classification_code",
            Value::Text(mail.classification_code.clone()),
        ),
        ("received_date", Value::Text(mail.received_date.clone())),
        ("updated_at", Value::Text(mail.updated_at.clone())),
    ]
}

impl MailService {
    /// Register a piece of incoming mail. Stamps the next agenda number
    /// and opens the companion disposition; both rows land in one
    /// transaction.
    ///
    /// The disposition starts pending with an empty history. When the
    /// chosen initial recipient cannot be resolved in the directory, it
    /// starts unassigned.
    pub fn add_incoming_mail(
        &self,
        input: CreateIncomingMail,
    ) -> Result<(IncomingMail, Disposition), ServiceError> {
        if input.sender.trim().is_empty() {
            return Err(ServiceError::Validation("sender is required".into()));
        }
        if input.subject.trim().is_empty() {
            return Err(ServiceError::Validation("subject is required".into()));
        }
        if input.classification_code.trim().is_empty() {
            return Err(ServiceError::Validation(
                "classification code is required".into(),
            ));
        }

        let recipient = input
            .initial_recipient_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .and_then(|id| self.directory.get_user(id).ok());

        let agenda_number = self.next_incoming_agenda(&input.classification_code)?;
        let now = now_rfc3339();

        let mail = IncomingMail {
            id: new_id(),
            sender: input.sender,
            subject: input.subject,
            received_date: input
                .received_date
                .filter(|d| !d.is_empty())
                .unwrap_or_else(today),
            mail_date: input.mail_date.unwrap_or_default(),
            file_url: input.file_url.unwrap_or_default(),
            classification_code: input.classification_code,
            initial_recipient_id: input.initial_recipient_id.unwrap_or_default(),
            agenda_number,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let disp = Disposition {
            id: new_id(),
            mail_id: mail.id.clone(),
            mail_subject: mail.subject.clone(),
            date: now.clone(),
            instruction: format!(
                "Mohon disposisi untuk surat masuk perihal \"{}\"",
                mail.subject
            ),
            status: DispositionStatus::Pending,
            recipient_id: recipient.as_ref().map(|u| u.id.clone()).unwrap_or_default(),
            recipient_name: recipient
                .as_ref()
                .map(|u| u.name.clone())
                .unwrap_or_else(|| "Belum Ditentukan".to_string()),
            history: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut mail_indexes = index_columns(&mail);
        mail_indexes.push(("created_at", Value::Text(mail.created_at.clone())));
        let (mail_sql, mail_params) =
            Self::insert_statement("incoming_mails", &mail.id, &mail, &mail_indexes)?;

        let mut disp_indexes = disposition::index_columns(&disp);
        disp_indexes.push(("created_at", Value::Text(disp.created_at.clone())));
        let (disp_sql, disp_params) =
            Self::insert_statement("dispositions", &disp.id, &disp, &disp_indexes)?;

        self.sql
            .exec_many(&[
                (mail_sql.as_str(), mail_params.as_slice()),
                (disp_sql.as_str(), disp_params.as_slice()),
            ])
            .map_err(constraint_error)?;

        self.mirror.insert("incoming_mails", &mail);
        self.mirror.insert("dispositions", &disp);

        info!("registered incoming mail {} ({})", mail.id, mail.agenda_number);
        Ok((mail, disp))
    }

    /// Fetch one incoming mail by id.
    pub fn get_incoming(&self, id: &str) -> Result<IncomingMail, ServiceError> {
        self.get_record("incoming_mails", id)
    }

    /// List incoming mail, newest first, with pagination and an optional
    /// substring search over subject, sender, and agenda number.
    pub fn list_incoming(
        &self,
        params: &ListParams,
    ) -> Result<ListResult<IncomingMail>, ServiceError> {
        let mut where_sql = String::new();
        let mut bind: Vec<Value> = Vec::new();

        if let Some(q) = &params.q {
            let pattern = format!("%{}%", q);
            where_sql =
                " WHERE (subject LIKE ?1 OR sender LIKE ?2 OR agenda_number LIKE ?3)".to_string();
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern));
        }

        let total = self.count_rows(
            &format!("SELECT COUNT(*) as cnt FROM incoming_mails{}", where_sql),
            &bind,
        )?;

        let limit_idx = bind.len() + 1;
        let offset_idx = bind.len() + 2;
        bind.push(Value::Integer(params.limit as i64));
        bind.push(Value::Integer(params.offset as i64));

        let sql = format!(
            "SELECT data FROM incoming_mails{} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_sql, limit_idx, offset_idx,
        );
        let items = self.query_records("incoming mail", &sql, &bind)?;

        Ok(ListResult { items, total })
    }

    /// Update an incoming mail with JSON merge-patch semantics.
    /// The agenda number is stamped at creation and cannot be patched.
    pub fn update_incoming(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<IncomingMail, ServiceError> {
        self.apply_mail_patch(MailKind::Incoming, id, patch, index_columns)
    }
}

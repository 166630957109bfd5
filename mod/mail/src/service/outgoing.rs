use tracing::info;

use esurat_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use esurat_sql::Value;

use crate::model::{CreateOutgoingMail, MailKind, OutgoingMail};
use crate::service::{MailService, today};

/// Indexed columns kept in sync with the JSON document on every write.
fn index_columns(mail: &OutgoingMail) -> Vec<(&'static str, Value)> {
    vec![
        ("recipient", Value::Text(mail.recipient.clone())),
        ("subject", Value::Text(mail.subject.clone())),
        ("mail_number", Value::Text(mail.mail_number.clone())),
        (
            "classification_code",
            Value::Text(mail.classification_code.clone()),
        ),
        ("uploaded", Value::Integer(mail.uploaded as i64)),
        ("updated_at", Value::Text(mail.updated_at.clone())),
    ]
}

impl MailService {
    /// Register a piece of outgoing mail, stamping the next formal mail
    /// number from the outgoing counter.
    pub fn add_outgoing_mail(
        &self,
        input: CreateOutgoingMail,
    ) -> Result<OutgoingMail, ServiceError> {
        if input.recipient.trim().is_empty() {
            return Err(ServiceError::Validation("recipient is required".into()));
        }
        if input.subject.trim().is_empty() {
            return Err(ServiceError::Validation("subject is required".into()));
        }
        if input.signatory.trim().is_empty() {
            return Err(ServiceError::Validation("signatory is required".into()));
        }
        if input.classification_code.trim().is_empty() {
            return Err(ServiceError::Validation(
                "classification code is required".into(),
            ));
        }

        let mail_number =
            self.next_outgoing_number(&input.signatory, &input.classification_code)?;
        let now = now_rfc3339();

        let mail = OutgoingMail {
            id: new_id(),
            recipient: input.recipient,
            subject: input.subject,
            date: input.date.filter(|d| !d.is_empty()).unwrap_or_else(today),
            file_url: input.file_url.unwrap_or_default(),
            signatory: input.signatory,
            classification_code: input.classification_code,
            mail_number,
            uploaded: false,
            file_name: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let mut indexes = index_columns(&mail);
        indexes.push(("created_at", Value::Text(mail.created_at.clone())));
        self.insert_record("outgoing_mails", &mail.id, &mail, &indexes)?;

        self.mirror.insert("outgoing_mails", &mail);

        info!("registered outgoing mail {} ({})", mail.id, mail.mail_number);
        Ok(mail)
    }

    /// Fetch one outgoing mail by id.
    pub fn get_outgoing(&self, id: &str) -> Result<OutgoingMail, ServiceError> {
        self.get_record("outgoing_mails", id)
    }

    /// List outgoing mail, newest first, with pagination and an optional
    /// substring search over subject, recipient, and mail number.
    pub fn list_outgoing(
        &self,
        params: &ListParams,
    ) -> Result<ListResult<OutgoingMail>, ServiceError> {
        let mut where_sql = String::new();
        let mut bind: Vec<Value> = Vec::new();

        if let Some(q) = &params.q {
            let pattern = format!("%{}%", q);
            where_sql =
                " WHERE (subject LIKE ?1 OR recipient LIKE ?2 OR mail_number LIKE ?3)".to_string();
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern));
        }

        let total = self.count_rows(
            &format!("SELECT COUNT(*) as cnt FROM outgoing_mails{}", where_sql),
            &bind,
        )?;

        let limit_idx = bind.len() + 1;
        let offset_idx = bind.len() + 2;
        bind.push(Value::Integer(params.limit as i64));
        bind.push(Value::Integer(params.offset as i64));

        let sql = format!(
            "SELECT data FROM outgoing_mails{} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_sql, limit_idx, offset_idx,
        );
        let items = self.query_records("outgoing mail", &sql, &bind)?;

        Ok(ListResult { items, total })
    }

    /// Update an outgoing mail with JSON merge-patch semantics. Used for
    /// edits and for flagging the signed document as uploaded. The mail
    /// number is stamped at creation and cannot be patched.
    pub fn update_outgoing(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<OutgoingMail, ServiceError> {
        self.apply_mail_patch(MailKind::Outgoing, id, patch, index_columns)
    }
}

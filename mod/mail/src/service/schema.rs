use esurat_core::ServiceError;
use esurat_sql::SQLStore;

/// Initialize the SQLite schema for the mail ledger.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    let statements = [
        // Incoming mail register
        "CREATE TABLE IF NOT EXISTS incoming_mails (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            sender TEXT NOT NULL,
            subject TEXT NOT NULL,
            agenda_number TEXT NOT NULL,
            classification_code TEXT NOT NULL,
            received_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_incoming_created ON incoming_mails(created_at)",

        // Outgoing mail register
        "CREATE TABLE IF NOT EXISTS outgoing_mails (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            recipient TEXT NOT NULL,
            subject TEXT NOT NULL,
            mail_number TEXT NOT NULL,
            classification_code TEXT NOT NULL,
            uploaded INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_outgoing_created ON outgoing_mails(created_at)",

        // Dispositions: one per incoming mail, routed down the hierarchy
        "CREATE TABLE IF NOT EXISTS dispositions (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            mail_id TEXT NOT NULL,
            mail_subject TEXT NOT NULL,
            status TEXT NOT NULL,
            recipient_id TEXT NOT NULL,
            recipient_name TEXT NOT NULL,
            instruction TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_dispositions_mail ON dispositions(mail_id)",
        "CREATE INDEX IF NOT EXISTS idx_dispositions_status ON dispositions(status)",
        "CREATE INDEX IF NOT EXISTS idx_dispositions_recipient ON dispositions(recipient_id)",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
    }

    Ok(())
}

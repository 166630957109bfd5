use serde::{Deserialize, Serialize};

/// A piece of received correspondence ("surat masuk").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMail {
    pub id: String,
    pub sender: String,
    pub subject: String,
    /// Date the office received the document (YYYY-MM-DD).
    pub received_date: String,
    /// Date written on the document itself (YYYY-MM-DD).
    #[serde(default)]
    pub mail_date: String,
    /// Link to the scanned document.
    #[serde(default)]
    pub file_url: String,
    pub classification_code: String,
    /// First disposition target chosen at intake. Empty when the
    /// clerk left it undecided.
    #[serde(default)]
    pub initial_recipient_id: String,
    /// Sequential agenda number, stamped once at creation.
    pub agenda_number: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A piece of sent correspondence ("surat keluar").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMail {
    pub id: String,
    pub recipient: String,
    pub subject: String,
    /// Date written on the document (YYYY-MM-DD).
    pub date: String,
    #[serde(default)]
    pub file_url: String,
    /// Sign code of the official who signs, e.g. `SEK.03`.
    pub signatory: String,
    pub classification_code: String,
    /// Formal reference number, stamped once at creation.
    pub mail_number: String,
    /// Whether the signed document has been uploaded back.
    #[serde(default)]
    pub uploaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Intake payload for incoming mail.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncomingMail {
    pub sender: String,
    pub subject: String,
    /// Defaults to today when absent.
    #[serde(default)]
    pub received_date: Option<String>,
    #[serde(default)]
    pub mail_date: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    pub classification_code: String,
    #[serde(default)]
    pub initial_recipient_id: Option<String>,
}

/// Intake payload for outgoing mail.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutgoingMail {
    pub recipient: String,
    pub subject: String,
    /// Defaults to today when absent.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    pub signatory: String,
    pub classification_code: String,
}

/// Which of the two mail collections an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Incoming,
    Outgoing,
}

impl MailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming_mails",
            Self::Outgoing => "outgoing_mails",
        }
    }

    /// JSON key of the number stamped at creation. Immutable afterwards.
    pub fn number_field(&self) -> &'static str {
        match self {
            Self::Incoming => "agendaNumber",
            Self::Outgoing => "mailNumber",
        }
    }
}

impl std::fmt::Display for MailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_wire_format_is_camel_case() {
        let mail = IncomingMail {
            id: "m1".into(),
            sender: "Pengadilan Tinggi".into(),
            subject: "Undangan Rapat".into(),
            received_date: "2024-01-10".into(),
            mail_date: "2024-01-08".into(),
            file_url: "https://drive.example/abc".into(),
            classification_code: "UM.01".into(),
            initial_recipient_id: "kpa-1".into(),
            agenda_number: "SM1/UM.01/I/2024".into(),
            created_at: "2024-01-10T08:00:00Z".into(),
            updated_at: "2024-01-10T08:00:00Z".into(),
        };
        let json = serde_json::to_value(&mail).unwrap();
        assert_eq!(json["receivedDate"], "2024-01-10");
        assert_eq!(json["classificationCode"], "UM.01");
        assert_eq!(json["agendaNumber"], "SM1/UM.01/I/2024");
        assert_eq!(json["initialRecipientId"], "kpa-1");
        assert!(json.get("received_date").is_none());
    }

    #[test]
    fn test_outgoing_file_name_is_optional() {
        let json = serde_json::json!({
            "id": "o1",
            "recipient": "Kantor Wilayah",
            "subject": "Laporan Bulanan",
            "date": "2024-02-01",
            "signatory": "SEK.03",
            "classificationCode": "KU.01",
            "mailNumber": "1/SEK.03.W3-A7/KU.01/II/2024",
            "createdAt": "2024-02-01T08:00:00Z",
            "updatedAt": "2024-02-01T08:00:00Z"
        });
        let mail: OutgoingMail = serde_json::from_value(json).unwrap();
        assert_eq!(mail.file_name, None);
        assert!(!mail.uploaded);

        let back = serde_json::to_value(&mail).unwrap();
        assert!(back.get("fileName").is_none());
    }
}

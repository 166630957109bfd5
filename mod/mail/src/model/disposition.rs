use serde::{Deserialize, Serialize};

/// Routing state of a disposition task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispositionStatus {
    /// Waiting for the recipient to act.
    Pending,
    /// Being worked on.
    Process,
    /// Done.
    Completed,
}

impl DispositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Process => "process",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "process" => Some(Self::Process),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for DispositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hop in a disposition's routing chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Id of the user who routed the task onward.
    pub from_id: String,
    pub from: String,
    pub to_id: String,
    pub to: String,
    pub timestamp: String,
    pub instruction: String,
}

/// A routing/approval task attached to one incoming mail.
///
/// Created 1:1 with each [`IncomingMail`](crate::model::IncomingMail)
/// at intake time and never deleted in the normal flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disposition {
    pub id: String,
    pub mail_id: String,
    /// Subject of the linked incoming mail.
    pub mail_subject: String,
    pub date: String,
    /// Latest instruction given to the current recipient.
    pub instruction: String,
    pub status: DispositionStatus,
    /// Empty until a recipient is resolved.
    #[serde(default)]
    pub recipient_id: String,
    pub recipient_name: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for routing a disposition onward.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCommand {
    /// Id of the user to hand the task to. Absent for in-place
    /// status/instruction updates.
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub status: Option<DispositionStatus>,
    pub instruction: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            DispositionStatus::Pending,
            DispositionStatus::Process,
            DispositionStatus::Completed,
        ] {
            assert_eq!(DispositionStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DispositionStatus::from_str("done"), None);
        assert!(DispositionStatus::Completed.is_terminal());
        assert!(!DispositionStatus::Process.is_terminal());
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        let json = serde_json::to_string(&DispositionStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let back: DispositionStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(back, DispositionStatus::Completed);
    }

    #[test]
    fn test_disposition_defaults_tolerate_sparse_rows() {
        // Rows written before the history redesign carry no history
        // array and may carry an empty recipient.
        let json = serde_json::json!({
            "id": "d1",
            "mailId": "m1",
            "mailSubject": "Undangan Rapat",
            "date": "2024-01-10T08:00:00Z",
            "instruction": "Mohon ditindaklanjuti",
            "status": "pending",
            "recipientName": "Belum Ditentukan",
            "createdAt": "2024-01-10T08:00:00Z",
            "updatedAt": "2024-01-10T08:00:00Z"
        });
        let disposition: Disposition = serde_json::from_value(json).unwrap();
        assert_eq!(disposition.recipient_id, "");
        assert!(disposition.history.is_empty());
    }
}

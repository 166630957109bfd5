//! Classification catalog and signatory list.
//!
//! Classification codes follow the court administration scheme
//! (UM = umum, HK = hukum, KP = kepegawaian, ...). The catalog is
//! seeded into the KV store on first run under `config:mailtype:{code}`
//! so an operator can amend it without a rebuild; signatories are a
//! fixed list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use esurat_core::ServiceError;

use crate::service::MailService;

pub(crate) const MAILTYPE_PREFIX: &str = "config:mailtype:";

/// A classification entry as stored in the KV catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailType {
    pub code: String,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationItem {
    pub code: String,
    pub name: String,
}

/// Classifications of one category, as served to pickers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationGroup {
    pub category: String,
    pub items: Vec<ClassificationItem>,
}

/// An official authorized to sign outgoing mail. The sign code is the
/// middle segment of the mail number.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signatory {
    pub sign_code: &'static str,
    pub name: &'static str,
}

const CLASSIFICATIONS: &[(&str, &[(&str, &str)])] = &[
    ("Hubungan Masyarakat", &[
        ("HM.00", "Penerangan"),
        ("HM.01", "Hubungan Antar Lembaga"),
    ]),
    ("Hukum", &[
        ("HK.00", "Peraturan Perundang-undangan"),
        ("HK.05", "Perkara"),
    ]),
    ("Kepegawaian", &[
        ("KP.00", "Pengadaan Pegawai"),
        ("KP.02", "Mutasi"),
        ("KP.05", "Cuti"),
    ]),
    ("Keuangan", &[
        ("KU.00", "Anggaran"),
        ("KU.01", "Pertanggungjawaban Keuangan"),
    ]),
    ("Organisasi dan Tata Laksana", &[
        ("OT.00", "Organisasi"),
        ("OT.01", "Tata Laksana"),
    ]),
    ("Pengawasan", &[
        ("PS.00", "Pengaduan Masyarakat"),
        ("PS.01", "Pemeriksaan"),
    ]),
    ("Perlengkapan", &[
        ("PL.00", "Gedung dan Bangunan"),
        ("PL.01", "Peralatan Kantor"),
    ]),
    ("Umum", &[
        ("UM.01", "Ketatausahaan"),
        ("UM.02", "Kerumahtanggaan"),
    ]),
];

const SIGNATORIES: &[Signatory] = &[
    Signatory { sign_code: "KPA", name: "Ketua Pengadilan Agama" },
    Signatory { sign_code: "SEK.PA", name: "Sekretaris Pengadilan Agama" },
    Signatory { sign_code: "SEK.01", name: "Kasub PTIP" },
    Signatory { sign_code: "SEK.02", name: "Kepegawaian Ortala" },
    Signatory { sign_code: "SEK.03", name: "Umum dan Keuangan" },
    Signatory { sign_code: "PAN.PTA", name: "Panitera Pengadilan Agama" },
    Signatory { sign_code: "PAN.01", name: "Panitera Muda Permohonan" },
    Signatory { sign_code: "PAN.02", name: "Panitera Muda Gugatan" },
    Signatory { sign_code: "PAN.03", name: "Panitera Muda Hukum" },
];

impl MailService {
    /// Seed the classification catalog into the KV store. A non-empty
    /// catalog is left untouched.
    pub(crate) fn seed_catalog(&self) -> Result<(), ServiceError> {
        let existing = self
            .kv
            .scan(MAILTYPE_PREFIX)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        if !existing.is_empty() {
            return Ok(());
        }

        let mut count = 0;
        for (category, items) in CLASSIFICATIONS {
            for (code, name) in *items {
                let entry = MailType {
                    code: code.to_string(),
                    name: name.to_string(),
                    category: category.to_string(),
                };
                let raw = serde_json::to_vec(&entry)
                    .map_err(|e| ServiceError::Internal(e.to_string()))?;
                self.kv
                    .set(&format!("{}{}", MAILTYPE_PREFIX, code), &raw)
                    .map_err(|e| ServiceError::Storage(e.to_string()))?;
                count += 1;
            }
        }

        info!("seeded {} mail classifications", count);
        Ok(())
    }

    /// The classification catalog, grouped by category. Categories come
    /// back alphabetically, codes ascending within each.
    pub fn classifications(&self) -> Result<Vec<ClassificationGroup>, ServiceError> {
        let entries = self
            .kv
            .scan(MAILTYPE_PREFIX)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut by_category: BTreeMap<String, Vec<ClassificationItem>> = BTreeMap::new();
        for (key, raw) in &entries {
            match serde_json::from_slice::<MailType>(raw) {
                Ok(entry) => by_category
                    .entry(entry.category)
                    .or_default()
                    .push(ClassificationItem {
                        code: entry.code,
                        name: entry.name,
                    }),
                Err(e) => tracing::warn!("skipping undecodable mail type at {}: {}", key, e),
            }
        }

        Ok(by_category
            .into_iter()
            .map(|(category, mut items)| {
                items.sort_by(|a, b| a.code.cmp(&b.code));
                ClassificationGroup { category, items }
            })
            .collect())
    }

    /// Officials authorized to sign outgoing mail.
    pub fn signatories(&self) -> Vec<Signatory> {
        SIGNATORIES.to_vec()
    }
}

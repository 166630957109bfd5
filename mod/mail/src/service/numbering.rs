//! Sequential mail numbering.
//!
//! Counters live in the KV store under `counter:incoming` and
//! `counter:outgoing`, holding the decimal value of the NEXT number to
//! hand out. Each register counts independently and never resets on its
//! own; numbers carry the month as a Roman numeral.

use chrono::{Datelike, Utc};
use tracing::warn;

use esurat_core::ServiceError;

use crate::service::MailService;

pub const INCOMING_COUNTER_KEY: &str = "counter:incoming";
pub const OUTGOING_COUNTER_KEY: &str = "counter:outgoing";

/// Roman numeral for a month number, as embedded in mail numbers.
pub fn roman_month(month: u32) -> String {
    const NUMERALS: &[(&str, u32)] = &[
        ("M", 1000),
        ("CM", 900),
        ("D", 500),
        ("CD", 400),
        ("C", 100),
        ("XC", 90),
        ("L", 50),
        ("XL", 40),
        ("X", 10),
        ("IX", 9),
        ("V", 5),
        ("IV", 4),
        ("I", 1),
    ];

    let mut n = month;
    let mut out = String::new();
    for (sym, val) in NUMERALS {
        while n >= *val {
            out.push_str(sym);
            n -= val;
        }
    }
    out
}

impl MailService {
    /// Next agenda number for the incoming register:
    /// `SM{n}/{classification}/{roman month}/{year}`.
    pub(crate) fn next_incoming_agenda(
        &self,
        classification_code: &str,
    ) -> Result<String, ServiceError> {
        let n = self.bump_counter(INCOMING_COUNTER_KEY)?;
        let now = Utc::now();
        Ok(format!(
            "SM{}/{}/{}/{}",
            n,
            classification_code,
            roman_month(now.month()),
            now.year()
        ))
    }

    /// Next number for the outgoing register:
    /// `{n}/{sign code}.{office code}/{classification}/{roman month}/{year}`.
    pub(crate) fn next_outgoing_number(
        &self,
        sign_code: &str,
        classification_code: &str,
    ) -> Result<String, ServiceError> {
        let n = self.bump_counter(OUTGOING_COUNTER_KEY)?;
        let now = Utc::now();
        Ok(format!(
            "{}/{}.{}/{}/{}/{}",
            n,
            sign_code,
            self.config.office_code,
            classification_code,
            roman_month(now.month()),
            now.year()
        ))
    }

    /// Read-and-advance a counter key under the counter lock. A missing
    /// or malformed value restarts the sequence at 1.
    fn bump_counter(&self, key: &str) -> Result<u64, ServiceError> {
        let _guard = self
            .counter_lock
            .lock()
            .map_err(|_| ServiceError::Internal("counter lock poisoned".into()))?;

        let n = match self
            .kv
            .get(key)
            .map_err(|e| ServiceError::Storage(e.to_string()))?
        {
            Some(raw) => match std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
            {
                Some(n) => n,
                None => {
                    warn!("counter {} holds a malformed value, restarting at 1", key);
                    1
                }
            },
            None => 1,
        };

        self.kv
            .set(key, (n + 1).to_string().as_bytes())
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use esurat_kv::KVStore;

    use super::*;
    use crate::service::testutil::{service_at, test_service};

    #[test]
    fn test_roman_month_all_values() {
        let expected = [
            (1, "I"),
            (2, "II"),
            (3, "III"),
            (4, "IV"),
            (5, "V"),
            (6, "VI"),
            (7, "VII"),
            (8, "VIII"),
            (9, "IX"),
            (10, "X"),
            (11, "XI"),
            (12, "XII"),
        ];
        for (month, roman) in expected {
            assert_eq!(roman_month(month), roman);
        }
    }

    #[test]
    fn test_counters_are_monotonic_and_independent() {
        let (svc, _tmp) = test_service();

        let a1 = svc.next_incoming_agenda("UM.01").unwrap();
        let a2 = svc.next_incoming_agenda("HK.05").unwrap();
        let a3 = svc.next_incoming_agenda("UM.01").unwrap();
        assert!(a1.starts_with("SM1/UM.01/"));
        assert!(a2.starts_with("SM2/HK.05/"));
        assert!(a3.starts_with("SM3/UM.01/"));

        // The outgoing register counts on its own.
        let o1 = svc.next_outgoing_number("KPA", "UM.01").unwrap();
        assert!(o1.starts_with("1/KPA.W3-A7/UM.01/"));

        let now = Utc::now();
        assert!(o1.ends_with(&format!("/{}/{}", roman_month(now.month()), now.year())));
    }

    #[test]
    fn test_counter_survives_restart() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let svc = service_at(tmp.path());
            svc.next_incoming_agenda("UM.01").unwrap();
            svc.next_incoming_agenda("UM.01").unwrap();
        }

        let svc = service_at(tmp.path());
        let next = svc.next_incoming_agenda("UM.01").unwrap();
        assert!(next.starts_with("SM3/"));
    }

    #[test]
    fn test_malformed_counter_restarts_at_one() {
        let (svc, _tmp) = test_service();

        svc.kv.set(INCOMING_COUNTER_KEY, b"not-a-number").unwrap();
        let first = svc.next_incoming_agenda("UM.01").unwrap();
        assert!(first.starts_with("SM1/"));
        let second = svc.next_incoming_agenda("UM.01").unwrap();
        assert!(second.starts_with("SM2/"));
    }
}

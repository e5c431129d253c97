// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Certmint Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Revocation ledger persistence.
//!
//! The ledger is `revoked.db`: one entry per line in the form
//! `serial,unix-seconds,reason`, serial in decimal. An absent or empty file is
//! an empty ledger. Each revocation performs a full read-modify-write of the
//! file, so entries are never partially written; there is no locking, and
//! concurrent revokers against the same directory are unsupported.

use std::fs;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{CertmintError, Result};
use crate::store::CaDir;

/// A single revoked-certificate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationEntry {
    /// Certificate serial number.
    pub serial: u128,
    /// Revocation time, Unix seconds.
    pub revoked_at: i64,
    /// RFC 5280 CRL reason code.
    pub reason: u32,
}

impl RevocationEntry {
    fn to_line(self) -> String {
        format!("{},{},{}", self.serial, self.revoked_at, self.reason)
    }

    fn parse_line(line: &str) -> Result<Self> {
        let malformed = || CertmintError::LedgerMalformed {
            line: line.to_string(),
        };

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 3 {
            return Err(malformed());
        }

        Ok(Self {
            serial: fields[0].parse().map_err(|_| malformed())?,
            revoked_at: fields[1].parse().map_err(|_| malformed())?,
            reason: fields[2].parse().map_err(|_| malformed())?,
        })
    }
}

/// Revocation ledger bound to one CA directory.
#[derive(Debug)]
pub struct RevocationLedger<'a> {
    dir: &'a CaDir,
}

impl<'a> RevocationLedger<'a> {
    /// Create a ledger handle for the given CA directory.
    pub fn new(dir: &'a CaDir) -> Self {
        Self { dir }
    }

    /// Load all entries. An absent file is an empty ledger; malformed content
    /// fails with the offending line.
    pub fn load(&self) -> Result<Vec<RevocationEntry>> {
        let path = self.dir.revoked_path();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        data.lines()
            .filter(|line| !line.is_empty())
            .map(RevocationEntry::parse_line)
            .collect()
    }

    /// Revoke a serial number, stamping the entry with the current time.
    ///
    /// Fails with an already-revoked error if the serial is present; the
    /// ledger is rewritten in full otherwise.
    pub fn revoke(&self, serial: u128, reason: u32) -> Result<RevocationEntry> {
        let mut entries = self.load()?;

        if entries.iter().any(|e| e.serial == serial) {
            return Err(CertmintError::AlreadyRevoked {
                serial: serial.to_string(),
            });
        }

        let entry = RevocationEntry {
            serial,
            revoked_at: OffsetDateTime::now_utc().unix_timestamp(),
            reason,
        };
        entries.push(entry);

        let mut data = String::new();
        for e in &entries {
            data.push_str(&e.to_line());
            data.push('\n');
        }

        let path = self.dir.revoked_path();
        fs::write(&path, data)
            .map_err(|e| CertmintError::output_write(path.display().to_string(), e))?;

        debug!(serial = %serial, reason, "recorded revocation");
        Ok(entry)
    }
}

/// Parse a user-supplied serial number string: decimal first, then
/// hexadecimal as a fallback.
pub fn parse_serial(input: &str) -> Result<u128> {
    let trimmed = input.trim();
    if let Ok(serial) = trimmed.parse::<u128>() {
        return Ok(serial);
    }
    u128::from_str_radix(trimmed.trim_start_matches("0x"), 16)
        .map_err(|_| CertmintError::invalid_input(format!("invalid serial number: {}", input)))
}

/// Map an RFC 5280 reason code to the rcgen CRL entry reason.
pub fn reason_code(reason: u32) -> rcgen::RevocationReason {
    use rcgen::RevocationReason::*;
    match reason {
        1 => KeyCompromise,
        2 => CaCompromise,
        3 => AffiliationChanged,
        4 => Superseded,
        5 => CessationOfOperation,
        6 => CertificateHold,
        8 => RemoveFromCrl,
        9 => PrivilegeWithdrawn,
        10 => AaCompromise,
        _ => Unspecified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_absent_file_is_empty_ledger() {
        let tmp = tempdir().unwrap();
        let dir = CaDir::new(tmp.path());
        assert!(RevocationLedger::new(&dir).load().unwrap().is_empty());
    }

    #[test]
    fn test_revoke_round_trip() {
        let tmp = tempdir().unwrap();
        let dir = CaDir::new(tmp.path());
        let ledger = RevocationLedger::new(&dir);

        ledger.revoke(7, 1).unwrap();
        ledger.revoke(9, 0).unwrap();

        let entries = ledger.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].serial, 7);
        assert_eq!(entries[0].reason, 1);
        assert_eq!(entries[1].serial, 9);
    }

    #[test]
    fn test_double_revoke_fails() {
        let tmp = tempdir().unwrap();
        let dir = CaDir::new(tmp.path());
        let ledger = RevocationLedger::new(&dir);

        ledger.revoke(42, 0).unwrap();
        let err = ledger.revoke(42, 4).unwrap_err();
        assert!(matches!(err, CertmintError::AlreadyRevoked { .. }));

        // The failed call must not have touched the ledger.
        assert_eq!(ledger.load().unwrap().len(), 1);
    }

    #[test]
    fn test_order_independent_contents() {
        let tmp = tempdir().unwrap();
        let dir = CaDir::new(tmp.path());
        let ledger = RevocationLedger::new(&dir);

        ledger.revoke(2, 0).unwrap();
        ledger.revoke(1, 0).unwrap();

        let mut serials: Vec<u128> = ledger.load().unwrap().iter().map(|e| e.serial).collect();
        serials.sort_unstable();
        assert_eq!(serials, vec![1, 2]);
    }

    #[test]
    fn test_malformed_line_names_offender() {
        let tmp = tempdir().unwrap();
        let dir = CaDir::new(tmp.path());
        fs::write(dir.revoked_path(), "1,1700000000,0\nbogus-line\n").unwrap();

        let err = RevocationLedger::new(&dir).load().unwrap_err();
        match err {
            CertmintError::LedgerMalformed { line } => assert_eq!(line, "bogus-line"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_wrong_field_count_is_malformed() {
        let tmp = tempdir().unwrap();
        let dir = CaDir::new(tmp.path());
        fs::write(dir.revoked_path(), "1,1700000000\n").unwrap();
        assert!(RevocationLedger::new(&dir).load().is_err());
    }

    #[test]
    fn test_parse_serial_decimal_and_hex() {
        assert_eq!(parse_serial("42").unwrap(), 42);
        assert_eq!(parse_serial("ff").unwrap(), 255);
        assert_eq!(parse_serial("0xff").unwrap(), 255);
        assert!(parse_serial("not-a-serial").is_err());
    }

    #[test]
    fn test_reason_code_mapping() {
        assert_eq!(reason_code(1), rcgen::RevocationReason::KeyCompromise);
        assert_eq!(reason_code(4), rcgen::RevocationReason::Superseded);
        assert_eq!(reason_code(0), rcgen::RevocationReason::Unspecified);
        // 7 is unassigned in RFC 5280.
        assert_eq!(reason_code(7), rcgen::RevocationReason::Unspecified);
    }
}

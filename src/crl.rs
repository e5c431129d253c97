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

//! CRL generation from the revocation ledger.

use rcgen::{CertificateRevocationListParams, KeyIdMethod, RevokedCertParams, SerialNumber};
use std::path::PathBuf;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::ca::IntermediateCa;
use crate::error::{CertmintError, Result};
use crate::ledger::{reason_code, RevocationLedger};
use crate::store::{self, CaDir};

/// How long a published CRL stays valid.
const CRL_VALIDITY: Duration = Duration::days(30);

/// A freshly built and signed CRL.
pub struct BuiltCrl {
    /// Where the CRL PEM was written.
    pub path: PathBuf,
    /// PEM encoding of the CRL.
    pub pem: String,
    /// Number of revoked entries it carries.
    pub entry_count: usize,
}

/// Build a CRL from every ledger entry, sign it with the intermediate CA,
/// and write it out. An empty ledger yields a validly signed CRL with no
/// entries.
///
/// The CRL number is the current Unix time, which is strictly increasing
/// across sequential builds.
pub fn build(dir: &CaDir, ca: &IntermediateCa, out: Option<PathBuf>) -> Result<BuiltCrl> {
    let entries = RevocationLedger::new(dir).load()?;
    let now = OffsetDateTime::now_utc();

    let revoked_certs = entries
        .iter()
        .map(|entry| {
            let revocation_time = OffsetDateTime::from_unix_timestamp(entry.revoked_at)
                .map_err(|_| CertmintError::LedgerMalformed {
                    line: format!("{},{},{}", entry.serial, entry.revoked_at, entry.reason),
                })?;
            Ok(RevokedCertParams {
                serial_number: SerialNumber::from(serial_bytes(entry.serial)),
                revocation_time,
                reason_code: Some(reason_code(entry.reason)),
                invalidity_date: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let entry_count = revoked_certs.len();

    let params = CertificateRevocationListParams {
        this_update: now,
        next_update: now + CRL_VALIDITY,
        crl_number: SerialNumber::from(now.unix_timestamp() as u64),
        issuing_distribution_point: None,
        revoked_certs,
        key_identifier_method: KeyIdMethod::Sha256,
    };

    let crl = params
        .signed_by(&ca.issuer()?)
        .map_err(|e| CertmintError::signing(format!("CRL: {}", e)))?;
    let pem = crl
        .pem()
        .map_err(|e| CertmintError::signing(format!("CRL encoding: {}", e)))?;

    let path = out.unwrap_or_else(|| dir.crl_path());
    store::write_public(&path, &pem)?;

    info!(entries = entry_count, path = %path.display(), "CRL written");
    Ok(BuiltCrl {
        path,
        pem,
        entry_count,
    })
}

/// Big-endian bytes of a serial with leading zeros trimmed. Zero stays one
/// byte so the DER integer is never empty.
fn serial_bytes(serial: u128) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(15);
    bytes[first..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_bytes_trims_leading_zeros() {
        assert_eq!(serial_bytes(0), vec![0]);
        assert_eq!(serial_bytes(1), vec![1]);
        assert_eq!(serial_bytes(0x1234), vec![0x12, 0x34]);
        assert_eq!(serial_bytes(u128::from(u64::MAX)).len(), 8);
    }
}

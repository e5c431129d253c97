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

//! CA hierarchy construction and loading.
//!
//! `install` builds exactly two tiers: a self-signed root with a path length
//! constraint of 1, and an intermediate signed by the root with a path length
//! constraint of 0, so the intermediate can only sign end-entity
//! certificates. Both carry the certificate-signing and CRL-signing key
//! usages and nothing else. Installation is not transactional: a failure
//! partway through leaves already-written files in place, and the caller must
//! treat the directory as not installed.

use rcgen::{
    BasicConstraints, CertificateParams, CrlDistributionPoint, DistinguishedName, DnType, IsCa,
    Issuer, KeyPair, KeyUsagePurpose, SerialNumber,
};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::CertificateDer;
use std::fs;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::config::CaConfig;
use crate::error::{CertmintError, Result};
use crate::keys::{KeyAlgorithm, KeyMaterial};
use crate::serial::{init_serial, random_ca_serial};
use crate::store::{self, CaDir};

/// Subject common name of the root CA certificate.
pub const ROOT_COMMON_NAME: &str = "Certmint Root CA";
/// Subject common name of the intermediate CA certificate.
pub const INTERMEDIATE_COMMON_NAME: &str = "Certmint Intermediate CA";
/// Organization carried by both CA subjects.
pub const ORGANIZATION: &str = "Certmint";

/// Result of a successful installation.
#[derive(Debug)]
pub struct InstallSummary {
    /// PEM encoding of the root certificate.
    pub root_cert_pem: String,
    /// PEM encoding of the intermediate certificate.
    pub intermediate_cert_pem: String,
}

/// Create the root and intermediate CA hierarchy in the given directory.
///
/// Rejects a directory that already holds an installed hierarchy unless
/// `force` is set, in which case the existing material is overwritten.
pub fn install(dir: &CaDir, cfg: &CaConfig, force: bool) -> Result<InstallSummary> {
    if dir.is_installed() && !force {
        return Err(CertmintError::AlreadyInstalled {
            dir: dir.path().display().to_string(),
        });
    }

    fs::create_dir_all(dir.path())?;
    cfg.save(dir)?;

    let algorithm = KeyAlgorithm::from_policy(cfg)?;

    info!(algorithm = ?algorithm, "generating root CA");
    let root_key = KeyMaterial::generate(algorithm)?;
    let root_signing = root_key.signing_key()?;
    let root_params = root_params(cfg);
    let root_cert = root_params
        .self_signed(&root_signing)
        .map_err(|e| CertmintError::signing(format!("root certificate: {}", e)))?;

    store::write_public(&dir.root_cert_path(), root_cert.pem())?;
    store::write_secret(&dir.root_key_path(), root_key.to_pem()?.as_bytes())?;

    info!("generating intermediate CA");
    let int_key = KeyMaterial::generate(algorithm)?;
    let int_signing = int_key.signing_key()?;
    let int_params = intermediate_params(cfg);
    let root_issuer = Issuer::new(root_params, root_signing);
    let int_cert = int_params
        .signed_by(&int_signing, &root_issuer)
        .map_err(|e| CertmintError::signing(format!("intermediate certificate: {}", e)))?;

    store::write_public(&dir.intermediate_cert_path(), int_cert.pem())?;
    store::write_secret(&dir.intermediate_key_path(), int_key.to_pem()?.as_bytes())?;

    init_serial(dir)?;

    info!(dir = %dir.path().display(), "CA hierarchy installed");
    Ok(InstallSummary {
        root_cert_pem: root_cert.pem(),
        intermediate_cert_pem: int_cert.pem(),
    })
}

fn ca_distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, ORGANIZATION);
    dn
}

fn root_params(cfg: &CaConfig) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = ca_distinguished_name(ROOT_COMMON_NAME);
    // Path length 1: the root may sign one tier of subordinate CAs.
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(1));
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.serial_number = Some(SerialNumber::from(random_ca_serial()));

    let now = OffsetDateTime::now_utc();
    // Backdate a day to tolerate clock skew between hosts.
    params.not_before = now - Duration::days(1);
    params.not_after = now + Duration::days(i64::from(cfg.root_ca_validity_days));
    params
}

fn intermediate_params(cfg: &CaConfig) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = ca_distinguished_name(INTERMEDIATE_COMMON_NAME);
    // Path length 0: leaf certificates only, no further CA delegation.
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.serial_number = Some(SerialNumber::from(random_ca_serial()));

    if let Some(url) = cfg.crl_url() {
        params.crl_distribution_points = vec![CrlDistributionPoint {
            uris: vec![url.to_string()],
        }];
    }

    let now = OffsetDateTime::now_utc();
    params.not_before = now - Duration::days(1);
    params.not_after = now + Duration::days(i64::from(cfg.intermediate_ca_validity_days));
    params
}

/// Intermediate CA material loaded from disk, ready to sign leaves and CRLs.
#[derive(Debug)]
pub struct IntermediateCa {
    cert_pem: String,
    cert_der: CertificateDer<'static>,
    key: KeyMaterial,
}

impl IntermediateCa {
    /// Load the intermediate key and certificate from the CA directory.
    ///
    /// Absent files surface as a not-installed error; present but unparsable
    /// material surfaces as a CA-material error.
    pub fn load(dir: &CaDir) -> Result<Self> {
        let key_pem = dir.read_ca_file(store::INTERMEDIATE_KEY_FILE)?;
        let key = KeyMaterial::from_pem(&key_pem)?;

        let cert_pem = dir.read_ca_file(store::INTERMEDIATE_CERT_FILE)?;
        let cert_der = CertificateDer::from_pem_slice(cert_pem.as_bytes()).map_err(|e| {
            CertmintError::ca_material(format!("invalid intermediate CA certificate: {}", e))
        })?;

        Ok(Self {
            cert_pem,
            cert_der,
            key,
        })
    }

    /// PEM encoding of the intermediate certificate.
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// DER encoding of the intermediate certificate.
    pub fn cert_der(&self) -> &CertificateDer<'static> {
        &self.cert_der
    }

    /// The intermediate private key.
    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    /// Construct the rcgen issuer used to sign leaf certificates and CRLs.
    pub fn issuer(&self) -> Result<Issuer<'static, KeyPair>> {
        Issuer::from_ca_cert_der(&self.cert_der, self.key.signing_key()?)
            .map_err(|e| CertmintError::ca_material(format!("intermediate CA issuer: {}", e)))
    }
}

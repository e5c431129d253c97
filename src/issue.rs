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

//! Leaf certificate issuance.
//!
//! Two entry points: [`issue`] builds a certificate from a list of subject
//! identifiers (DNS names, IP addresses, email addresses) and generates a
//! fresh key pair for it; [`issue_from_csr`] certifies the public key of an
//! externally supplied signing request, preserving its subject and SANs
//! verbatim. Both sign with the intermediate CA and draw serials from the
//! sequential counter.

use rcgen::string::Ia5String;
use rcgen::{
    CertificateParams, CertificateSigningRequestParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyUsagePurpose, SanType, SerialNumber,
};
use rustls_pki_types::CertificateDer;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::prelude::FromDer;

use crate::ca::IntermediateCa;
use crate::config::CaConfig;
use crate::error::{CertmintError, Result};
use crate::keys::{KeyAlgorithm, KeyMaterial};
use crate::serial::SerialAllocator;
use crate::store::{self, CaDir};

/// A subject identifier classified by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectName {
    /// DNS name, possibly with a wildcard label.
    Dns(String),
    /// IPv4 or IPv6 address.
    Ip(IpAddr),
    /// RFC 822 email address.
    Email(String),
}

/// Classify a raw identifier: IP address if it parses as one, email if it
/// contains `@`, DNS name otherwise.
pub fn classify(input: &str) -> SubjectName {
    if let Ok(ip) = input.parse::<IpAddr>() {
        return SubjectName::Ip(ip);
    }
    if input.contains('@') {
        return SubjectName::Email(input.to_string());
    }
    SubjectName::Dns(input.to_string())
}

/// The profile of an issued leaf certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertClass {
    /// TLS server authentication.
    TlsServer,
    /// TLS client authentication.
    ClientAuth,
    /// S/MIME email protection.
    Smime,
}

impl CertClass {
    /// Pick the class for a list of identifiers. An email as the first input
    /// selects S/MIME; otherwise the client flag selects client auth, and
    /// the default is a TLS server certificate.
    pub fn detect(inputs: &[String], client_auth: bool) -> Self {
        if inputs.first().map(|i| i.contains('@')).unwrap_or(false) {
            return Self::Smime;
        }
        if client_auth {
            return Self::ClientAuth;
        }
        Self::TlsServer
    }

    fn key_usages(self) -> Vec<KeyUsagePurpose> {
        match self {
            Self::TlsServer | Self::Smime => vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ],
            Self::ClientAuth => vec![KeyUsagePurpose::DigitalSignature],
        }
    }

    fn extended_key_usages(self) -> Vec<ExtendedKeyUsagePurpose> {
        match self {
            Self::TlsServer => vec![ExtendedKeyUsagePurpose::ServerAuth],
            Self::ClientAuth => vec![ExtendedKeyUsagePurpose::ClientAuth],
            Self::Smime => vec![ExtendedKeyUsagePurpose::EmailProtection],
        }
    }
}

/// What to issue and where to put it.
#[derive(Debug)]
pub struct IssueRequest<'a> {
    /// Subject identifiers, at least one.
    pub inputs: &'a [String],
    /// Certificate profile.
    pub class: CertClass,
    /// Generate a P-256 key instead of the policy default.
    pub use_ecdsa: bool,
    /// Explicit certificate output path.
    pub cert_file: Option<PathBuf>,
    /// Explicit key output path.
    pub key_file: Option<PathBuf>,
}

/// An issued leaf with its freshly generated key, written to disk.
pub struct IssuedLeaf {
    /// Where the certificate PEM was written.
    pub cert_path: PathBuf,
    /// Where the private key PEM was written.
    pub key_path: PathBuf,
    /// PEM encoding of the certificate.
    pub cert_pem: String,
    /// DER encoding of the certificate.
    pub cert_der: CertificateDer<'static>,
    /// The generated private key.
    pub key: KeyMaterial,
    /// Allocated serial number.
    pub serial: u64,
}

/// Issue a leaf certificate for a list of subject identifiers.
pub fn issue(
    dir: &CaDir,
    cfg: &CaConfig,
    ca: &IntermediateCa,
    req: &IssueRequest<'_>,
) -> Result<IssuedLeaf> {
    if req.inputs.is_empty() {
        return Err(CertmintError::invalid_input(
            "no domains, IP addresses, or email addresses given",
        ));
    }

    let algorithm = if req.use_ecdsa {
        KeyAlgorithm::EcdsaP256
    } else {
        KeyAlgorithm::from_policy(cfg)?
    };
    let key = KeyMaterial::generate(algorithm)?;

    let serial = SerialAllocator::new(dir).allocate()?;
    let names: Vec<SubjectName> = req.inputs.iter().map(|i| classify(i)).collect();
    debug!(serial, class = ?req.class, inputs = req.inputs.len(), "issuing leaf certificate");

    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name(req.inputs, req.class));
    params.is_ca = IsCa::ExplicitNoCa;
    params.serial_number = Some(SerialNumber::from(serial));
    params.key_usages = req.class.key_usages();
    params.extended_key_usages = req.class.extended_key_usages();
    params.subject_alt_names = subject_alt_names(&names)?;

    let now = OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + Duration::days(i64::from(cfg.default_validity_days));

    let cert = params
        .signed_by(&key.signing_key()?, &ca.issuer()?)
        .map_err(|e| CertmintError::signing(format!("leaf certificate: {}", e)))?;

    let (cert_path, key_path) = output_paths(req);
    store::write_public(&cert_path, cert.pem())?;
    store::write_secret(&key_path, key.to_pem()?.as_bytes())?;

    info!(serial, cert = %cert_path.display(), "certificate issued");
    Ok(IssuedLeaf {
        cert_path,
        key_path,
        cert_pem: cert.pem(),
        cert_der: cert.der().clone(),
        key,
        serial,
    })
}

/// A certificate issued from an external CSR. No key is generated.
#[derive(Debug)]
pub struct SignedCsr {
    /// Where the certificate PEM was written.
    pub cert_path: PathBuf,
    /// PEM encoding of the certificate.
    pub cert_pem: String,
    /// Allocated serial number.
    pub serial: u64,
}

/// Certify the public key of a PEM-encoded signing request.
///
/// The CSR's self-signature is verified first; subject and SANs are carried
/// into the certificate unchanged, while validity, serial, key usages, and
/// the CA flag are set by policy.
pub fn issue_from_csr(
    dir: &CaDir,
    cfg: &CaConfig,
    ca: &IntermediateCa,
    csr_path: &Path,
    cert_file: Option<PathBuf>,
) -> Result<SignedCsr> {
    let csr_pem = std::fs::read(csr_path)?;
    verify_csr_signature(&csr_pem)?;

    let mut csr = CertificateSigningRequestParams::from_pem(
        std::str::from_utf8(&csr_pem)
            .map_err(|_| CertmintError::CsrMalformed("CSR file is not UTF-8".to_string()))?,
    )
    .map_err(|e| CertmintError::CsrMalformed(e.to_string()))?;

    let serial = SerialAllocator::new(dir).allocate()?;
    debug!(serial, csr = %csr_path.display(), "signing certificate request");

    // Subject and SANs stay as the requester wrote them; everything else is
    // set by this CA's policy.
    csr.params.is_ca = IsCa::ExplicitNoCa;
    csr.params.serial_number = Some(SerialNumber::from(serial));
    csr.params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    csr.params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];
    let now = OffsetDateTime::now_utc();
    csr.params.not_before = now;
    csr.params.not_after = now + Duration::days(i64::from(cfg.default_validity_days));

    let cert = csr
        .signed_by(&ca.issuer()?)
        .map_err(|e| CertmintError::signing(format!("certificate from CSR: {}", e)))?;

    let cert_path = cert_file.unwrap_or_else(|| csr_output_path(csr_path));
    store::write_public(&cert_path, cert.pem())?;

    info!(serial, cert = %cert_path.display(), "certificate issued from CSR");
    Ok(SignedCsr {
        cert_path,
        cert_pem: cert.pem(),
        serial,
    })
}

/// Verify a CSR's self-signature before anything is issued from it.
fn verify_csr_signature(csr_pem: &[u8]) -> Result<()> {
    let (_, doc) = x509_parser::pem::parse_x509_pem(csr_pem)
        .map_err(|e| CertmintError::CsrMalformed(format!("invalid CSR PEM: {}", e)))?;
    let (_, csr) = X509CertificationRequest::from_der(&doc.contents)
        .map_err(|e| CertmintError::CsrMalformed(format!("invalid CSR structure: {}", e)))?;
    csr.verify_signature()
        .map_err(|e| CertmintError::CsrSignature(e.to_string()))
}

fn subject_alt_names(names: &[SubjectName]) -> Result<Vec<SanType>> {
    names
        .iter()
        .map(|name| match name {
            SubjectName::Dns(dns) => Ia5String::try_from(dns.as_str())
                .map(SanType::DnsName)
                .map_err(|_| {
                    CertmintError::invalid_input(format!("invalid DNS name: {:?}", dns))
                }),
            SubjectName::Ip(ip) => Ok(SanType::IpAddress(*ip)),
            SubjectName::Email(email) => Ia5String::try_from(email.as_str())
                .map(SanType::Rfc822Name)
                .map_err(|_| {
                    CertmintError::invalid_input(format!("invalid email address: {:?}", email))
                }),
        })
        .collect()
}

/// Subject common name: the first input, except S/MIME prefers the first
/// email-typed input when one exists.
fn common_name(inputs: &[String], class: CertClass) -> String {
    if class == CertClass::Smime {
        if let Some(email) = inputs.iter().find(|i| i.contains('@')) {
            return email.clone();
        }
    }
    inputs
        .first()
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string())
}

fn output_paths(req: &IssueRequest<'_>) -> (PathBuf, PathBuf) {
    let mut stem = sanitize_filename(&req.inputs[0]);
    if req.inputs.len() > 1 {
        stem = format!("{}+{}", stem, req.inputs.len() - 1);
    }

    let cert_path = req
        .cert_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("./{}.pem", stem)));
    let key_path = req
        .key_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("./{}-key.pem", stem)));
    (cert_path, key_path)
}

fn csr_output_path(csr_path: &Path) -> PathBuf {
    let stem = csr_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "certificate".to_string());
    PathBuf::from(format!("./{}.pem", stem))
}

/// Make an identifier safe to use as a filename stem.
fn sanitize_filename(input: &str) -> String {
    input
        .replace('*', "wildcard")
        .replace(':', "-")
        .replace('/', "-")
        .replace('\\', "-")
        .replace('@', "-at-")
}

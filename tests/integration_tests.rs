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

//! End-to-end tests over a real CA state directory.

use std::fs;
use std::path::{Path, PathBuf};

use certmint::config::{CaConfig, KeyType};
use certmint::issue::{CertClass, IssueRequest};
use certmint::store::CaDir;
use certmint::{ca, crl, issue, ledger, pkcs12, CertmintError};
use tempfile::TempDir;
use x509_parser::prelude::{CertificateRevocationList, FromDer, GeneralName, X509Certificate};

/// Install a fresh ECDSA-backed CA under the given root.
fn install_ca(root: &Path) -> (CaDir, CaConfig) {
    let dir = CaDir::new(root.join("ca"));
    let mut cfg = CaConfig::default();
    cfg.default_key_type = KeyType::Ecdsa;
    cfg.default_key_size = 256;
    ca::install(&dir, &cfg, false).unwrap();
    (dir, cfg)
}

/// Issue a certificate with output paths under `out`, returning the leaf.
fn issue_cert(
    dir: &CaDir,
    cfg: &CaConfig,
    out: &Path,
    inputs: &[&str],
    client: bool,
) -> issue::IssuedLeaf {
    let intermediate = ca::IntermediateCa::load(dir).unwrap();
    let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
    let class = CertClass::detect(&inputs, client);
    issue::issue(
        dir,
        cfg,
        &intermediate,
        &IssueRequest {
            inputs: &inputs,
            class,
            use_ecdsa: true,
            cert_file: Some(out.join("cert.pem")),
            key_file: Some(out.join("key.pem")),
        },
    )
    .unwrap()
}

#[test]
fn test_install_then_load_round_trips() {
    let tmp = TempDir::new().unwrap();
    let (dir, _cfg) = install_ca(tmp.path());

    assert!(dir.is_installed());
    assert_eq!(fs::read_to_string(dir.serial_path()).unwrap(), "1");

    let intermediate = ca::IntermediateCa::load(&dir).unwrap();
    assert_eq!(
        intermediate.key().algorithm(),
        certmint::keys::KeyAlgorithm::EcdsaP256
    );

    let (_, cert) = X509Certificate::from_der(intermediate.cert_der()).unwrap();
    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .unwrap()
        .as_str()
        .unwrap();
    assert_eq!(cn, ca::INTERMEDIATE_COMMON_NAME);
}

#[test]
fn test_chain_signatures_validate() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    let leaf = issue_cert(&dir, &cfg, tmp.path(), &["example.com"], false);

    let root_pem = fs::read_to_string(dir.root_cert_path()).unwrap();
    let root_der = pem::parse(&root_pem).unwrap().into_contents();
    let (_, root) = X509Certificate::from_der(&root_der).unwrap();

    let intermediate = ca::IntermediateCa::load(&dir).unwrap();
    let (_, int_cert) = X509Certificate::from_der(intermediate.cert_der()).unwrap();

    let (_, leaf_cert) = X509Certificate::from_der(&leaf.cert_der).unwrap();

    root.verify_signature(Some(root.public_key())).unwrap();
    int_cert.verify_signature(Some(root.public_key())).unwrap();
    leaf_cert
        .verify_signature(Some(int_cert.public_key()))
        .unwrap();
}

#[test]
fn test_serials_are_sequential_from_one() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    let mut serials = Vec::new();
    for i in 0..4 {
        let out = tmp.path().join(format!("leaf{}", i));
        let leaf = issue_cert(&dir, &cfg, &out, &["example.com"], false);
        serials.push(leaf.serial);

        let (_, cert) = X509Certificate::from_der(&leaf.cert_der).unwrap();
        assert_eq!(cert.serial.to_u64_digits(), vec![leaf.serial]);
    }
    assert_eq!(serials, vec![1, 2, 3, 4]);
    assert_eq!(fs::read_to_string(dir.serial_path()).unwrap(), "5");
}

#[test]
fn test_tls_server_certificate_profile() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    let leaf = issue_cert(
        &dir,
        &cfg,
        tmp.path(),
        &["example.com", "10.0.0.1", "admin@example.com"],
        false,
    );
    let (_, cert) = X509Certificate::from_der(&leaf.cert_der).unwrap();

    assert!(!cert.is_ca());

    let ku = cert.key_usage().unwrap().unwrap().value;
    assert!(ku.digital_signature());
    assert!(ku.key_encipherment());

    let eku = cert.extended_key_usage().unwrap().unwrap().value;
    assert!(eku.server_auth);
    assert!(!eku.client_auth);

    let san = cert.subject_alternative_name().unwrap().unwrap().value;
    let mut dns = 0;
    let mut ips = 0;
    let mut emails = 0;
    for name in &san.general_names {
        match name {
            GeneralName::DNSName(n) => {
                assert_eq!(*n, "example.com");
                dns += 1;
            }
            GeneralName::IPAddress(bytes) => {
                assert_eq!(*bytes, &[10, 0, 0, 1][..]);
                ips += 1;
            }
            GeneralName::RFC822Name(n) => {
                assert_eq!(*n, "admin@example.com");
                emails += 1;
            }
            other => panic!("unexpected SAN: {:?}", other),
        }
    }
    assert_eq!((dns, ips, emails), (1, 1, 1));
}

#[test]
fn test_client_auth_certificate_profile() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    let leaf = issue_cert(&dir, &cfg, tmp.path(), &["laptop.internal"], true);
    let (_, cert) = X509Certificate::from_der(&leaf.cert_der).unwrap();

    let ku = cert.key_usage().unwrap().unwrap().value;
    assert!(ku.digital_signature());
    assert!(!ku.key_encipherment());

    let eku = cert.extended_key_usage().unwrap().unwrap().value;
    assert!(eku.client_auth);
    assert!(!eku.server_auth);
}

#[test]
fn test_smime_certificate_prefers_email_common_name() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    let leaf = issue_cert(&dir, &cfg, tmp.path(), &["user@example.com"], false);
    let (_, cert) = X509Certificate::from_der(&leaf.cert_der).unwrap();

    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .unwrap()
        .as_str()
        .unwrap();
    assert_eq!(cn, "user@example.com");

    let eku = cert.extended_key_usage().unwrap().unwrap().value;
    assert!(eku.email_protection);
    assert!(!eku.server_auth);
}

#[test]
fn test_issue_without_install_reports_not_installed() {
    let tmp = TempDir::new().unwrap();
    let dir = CaDir::new(tmp.path().join("empty"));
    let err = ca::IntermediateCa::load(&dir).unwrap_err();
    assert!(matches!(err, CertmintError::NotInstalled { .. }));
}

#[test]
fn test_revoke_twice_fails_second_time() {
    let tmp = TempDir::new().unwrap();
    let (dir, _cfg) = install_ca(tmp.path());

    let ledger = ledger::RevocationLedger::new(&dir);
    ledger.revoke(7, 1).unwrap();
    let err = ledger.revoke(7, 0).unwrap_err();
    assert!(matches!(err, CertmintError::AlreadyRevoked { .. }));

    ledger.revoke(9, 0).unwrap();
    let entries = ledger.load().unwrap();
    let serials: Vec<u128> = entries.iter().map(|e| e.serial).collect();
    assert_eq!(serials, vec![7, 9]);
}

#[test]
fn test_empty_ledger_yields_signed_empty_crl() {
    let tmp = TempDir::new().unwrap();
    let (dir, _cfg) = install_ca(tmp.path());

    let intermediate = ca::IntermediateCa::load(&dir).unwrap();
    let built = crl::build(&dir, &intermediate, None).unwrap();
    assert_eq!(built.entry_count, 0);
    assert_eq!(built.path, dir.crl_path());

    let der = pem::parse(&built.pem).unwrap().into_contents();
    let (_, parsed) = CertificateRevocationList::from_der(&der).unwrap();
    assert_eq!(parsed.iter_revoked_certificates().count(), 0);

    let this_update = parsed.last_update().timestamp();
    let next_update = parsed.next_update().unwrap().timestamp();
    assert_eq!(next_update - this_update, 30 * 24 * 3600);
}

#[test]
fn test_crl_lists_revoked_serials() {
    let tmp = TempDir::new().unwrap();
    let (dir, _cfg) = install_ca(tmp.path());

    let ledger = ledger::RevocationLedger::new(&dir);
    for serial in [1u128, 2, 3] {
        ledger.revoke(serial, 0).unwrap();
    }

    let intermediate = ca::IntermediateCa::load(&dir).unwrap();
    let out = tmp.path().join("out.crl");
    let built = crl::build(&dir, &intermediate, Some(out.clone())).unwrap();
    assert_eq!(built.entry_count, 3);
    assert!(out.exists());

    let der = pem::parse(&built.pem).unwrap().into_contents();
    let (_, parsed) = CertificateRevocationList::from_der(&der).unwrap();
    let mut serials: Vec<Vec<u64>> = parsed
        .iter_revoked_certificates()
        .map(|r| r.user_certificate.to_u64_digits())
        .collect();
    serials.sort();
    assert_eq!(serials, vec![vec![1], vec![2], vec![3]]);
}

/// Build a throwaway CSR the way an external requester would.
fn make_csr(common_name: &str, dns: &str) -> String {
    let mut params = rcgen::CertificateParams::default();
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.subject_alt_names = vec![rcgen::SanType::DnsName(
        rcgen::string::Ia5String::try_from(dns).unwrap(),
    )];

    let key_pair = rcgen::KeyPair::generate().unwrap();
    params.serialize_request(&key_pair).unwrap().pem().unwrap()
}

#[test]
fn test_csr_signing_preserves_subject_and_sans() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    let csr_path = tmp.path().join("device.csr");
    fs::write(&csr_path, make_csr("device-42", "device.example.com")).unwrap();

    let intermediate = ca::IntermediateCa::load(&dir).unwrap();
    let out = tmp.path().join("device.pem");
    let signed =
        issue::issue_from_csr(&dir, &cfg, &intermediate, &csr_path, Some(out.clone())).unwrap();
    assert_eq!(signed.cert_path, out);

    let der = pem::parse(&signed.cert_pem).unwrap().into_contents();
    let (_, cert) = X509Certificate::from_der(&der).unwrap();

    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .unwrap()
        .as_str()
        .unwrap();
    assert_eq!(cn, "device-42");

    let san = cert.subject_alternative_name().unwrap().unwrap().value;
    assert!(san
        .general_names
        .iter()
        .any(|n| matches!(n, GeneralName::DNSName("device.example.com"))));

    let eku = cert.extended_key_usage().unwrap().unwrap().value;
    assert!(eku.server_auth);
    assert!(eku.client_auth);

    let (_, int_cert) = X509Certificate::from_der(intermediate.cert_der()).unwrap();
    cert.verify_signature(Some(int_cert.public_key())).unwrap();
}

#[test]
fn test_csr_with_bad_signature_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    // Corrupt the last byte of the CSR's signature.
    let csr_pem = make_csr("tampered", "tampered.example.com");
    let mut der = pem::parse(&csr_pem).unwrap().into_contents();
    let last = der.len() - 1;
    der[last] ^= 0xff;
    let tampered = pem::encode(&pem::Pem::new("CERTIFICATE REQUEST", der));

    let csr_path = tmp.path().join("tampered.csr");
    fs::write(&csr_path, tampered).unwrap();

    let intermediate = ca::IntermediateCa::load(&dir).unwrap();
    let err = issue::issue_from_csr(&dir, &cfg, &intermediate, &csr_path, None).unwrap_err();
    assert!(matches!(err, CertmintError::CsrSignature(_)));

    // Nothing was issued: the serial counter is untouched.
    assert_eq!(fs::read_to_string(dir.serial_path()).unwrap(), "1");
}

#[test]
fn test_pkcs12_export_writes_owner_only_bundle() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    let leaf = issue_cert(&dir, &cfg, tmp.path(), &["example.com"], false);
    let intermediate = ca::IntermediateCa::load(&dir).unwrap();

    let p12_path: PathBuf = tmp.path().join("example.com.p12");
    pkcs12::export(
        &p12_path,
        &leaf.key,
        &leaf.cert_der,
        intermediate.cert_der(),
        "",
    )
    .unwrap();

    let data = fs::read(&p12_path).unwrap();
    assert!(!data.is_empty());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&p12_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_rsa_default_policy_round_trips() {
    let tmp = TempDir::new().unwrap();
    let dir = CaDir::new(tmp.path().join("ca"));
    let cfg = CaConfig::default();
    ca::install(&dir, &cfg, false).unwrap();

    let intermediate = ca::IntermediateCa::load(&dir).unwrap();
    assert_eq!(
        intermediate.key().algorithm(),
        certmint::keys::KeyAlgorithm::Rsa(2048)
    );

    let inputs = vec!["rsa.example.com".to_string()];
    let leaf = issue::issue(
        &dir,
        &cfg,
        &intermediate,
        &IssueRequest {
            inputs: &inputs,
            class: CertClass::detect(&inputs, false),
            use_ecdsa: false,
            cert_file: Some(tmp.path().join("cert.pem")),
            key_file: Some(tmp.path().join("key.pem")),
        },
    )
    .unwrap();
    assert_eq!(
        leaf.key.algorithm(),
        certmint::keys::KeyAlgorithm::Rsa(2048)
    );

    let (_, int_cert) = X509Certificate::from_der(intermediate.cert_der()).unwrap();
    let (_, leaf_cert) = X509Certificate::from_der(&leaf.cert_der).unwrap();
    leaf_cert
        .verify_signature(Some(int_cert.public_key()))
        .unwrap();

    let built = crl::build(&dir, &intermediate, None).unwrap();
    assert_eq!(built.entry_count, 0);
}

#[test]
fn test_issued_key_files_round_trip() {
    let tmp = TempDir::new().unwrap();
    let (dir, cfg) = install_ca(tmp.path());

    let leaf = issue_cert(&dir, &cfg, tmp.path(), &["example.com"], false);

    let key_pem = fs::read_to_string(&leaf.key_path).unwrap();
    assert!(key_pem.contains("BEGIN EC PRIVATE KEY"));

    let loaded = certmint::keys::KeyMaterial::from_pem(&key_pem).unwrap();
    assert_eq!(loaded.algorithm(), certmint::keys::KeyAlgorithm::EcdsaP256);
}

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

//! CA directory layout and file persistence.
//!
//! A [`CaDir`] is an explicit handle to one CA state directory, threaded
//! through every operation rather than held in process-global state. Separate
//! directories are fully independent; nothing in this module locks files, so
//! concurrent writers against the same directory are not supported.
//!
//! On-disk layout:
//!
//! ```text
//! <ca-dir>/
//!   rootCA.pem              root certificate
//!   rootCA-key.pem          root private key            (0600)
//!   intermediateCA.pem      intermediate certificate
//!   intermediateCA-key.pem  intermediate private key    (0600)
//!   serial.txt              decimal leaf serial counter
//!   revoked.db              line-oriented revocation ledger
//!   config.yml              issuance policy
//!   crl.pem                 default CRL output
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CertmintError, Result};

/// Root CA certificate file name.
pub const ROOT_CERT_FILE: &str = "rootCA.pem";
/// Root CA private key file name.
pub const ROOT_KEY_FILE: &str = "rootCA-key.pem";
/// Intermediate CA certificate file name.
pub const INTERMEDIATE_CERT_FILE: &str = "intermediateCA.pem";
/// Intermediate CA private key file name.
pub const INTERMEDIATE_KEY_FILE: &str = "intermediateCA-key.pem";
/// Serial counter file name.
pub const SERIAL_FILE: &str = "serial.txt";
/// Revocation ledger file name.
pub const REVOKED_FILE: &str = "revoked.db";
/// Configuration file name.
pub const CONFIG_FILE: &str = "config.yml";
/// Default CRL output file name.
pub const CRL_FILE: &str = "crl.pem";

/// Handle to a CA state directory.
#[derive(Debug, Clone)]
pub struct CaDir {
    path: PathBuf,
}

impl CaDir {
    /// Create a handle for the given directory. The directory itself is not
    /// created until `install` runs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the CA directory from an optional explicit override, the
    /// `CAROOT` environment variable, or `$HOME/.certmint`, in that order.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }
        if let Some(caroot) = std::env::var_os("CAROOT") {
            if !caroot.is_empty() {
                return Ok(Self::new(PathBuf::from(caroot)));
            }
        }
        let home = std::env::var_os("HOME").ok_or_else(|| {
            CertmintError::config("cannot determine home directory; set CAROOT or pass --ca-dir")
        })?;
        Ok(Self::new(PathBuf::from(home).join(".certmint")))
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path to a file inside the CA directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Path to the root CA certificate.
    pub fn root_cert_path(&self) -> PathBuf {
        self.file(ROOT_CERT_FILE)
    }

    /// Path to the root CA private key.
    pub fn root_key_path(&self) -> PathBuf {
        self.file(ROOT_KEY_FILE)
    }

    /// Path to the intermediate CA certificate.
    pub fn intermediate_cert_path(&self) -> PathBuf {
        self.file(INTERMEDIATE_CERT_FILE)
    }

    /// Path to the intermediate CA private key.
    pub fn intermediate_key_path(&self) -> PathBuf {
        self.file(INTERMEDIATE_KEY_FILE)
    }

    /// Path to the serial counter file.
    pub fn serial_path(&self) -> PathBuf {
        self.file(SERIAL_FILE)
    }

    /// Path to the revocation ledger.
    pub fn revoked_path(&self) -> PathBuf {
        self.file(REVOKED_FILE)
    }

    /// Path to the configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.file(CONFIG_FILE)
    }

    /// Path to the default CRL output.
    pub fn crl_path(&self) -> PathBuf {
        self.file(CRL_FILE)
    }

    /// Whether all four CA key/certificate files are present.
    pub fn is_installed(&self) -> bool {
        [
            ROOT_CERT_FILE,
            ROOT_KEY_FILE,
            INTERMEDIATE_CERT_FILE,
            INTERMEDIATE_KEY_FILE,
        ]
        .iter()
        .all(|f| self.file(f).exists())
    }

    /// Read a CA material file, mapping absence to a not-installed error.
    pub fn read_ca_file(&self, name: &str) -> Result<String> {
        let path = self.file(name);
        match fs::read_to_string(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CertmintError::not_installed(self.path.display().to_string()))
            }
            Err(e) => Err(CertmintError::ca_material(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// Write a world-readable file (certificates, CRLs), creating parent
/// directories as needed.
pub fn write_public(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| CertmintError::output_write(path.display().to_string(), e))?;
        }
    }
    fs::write(path, contents).map_err(|e| CertmintError::output_write(path.display().to_string(), e))
}

/// Write a file readable and writable only by its owner (private keys,
/// PKCS#12 bundles).
pub fn write_secret(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| CertmintError::output_write(path.display().to_string(), e))?;
        }
    }

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| CertmintError::output_write(path.display().to_string(), e))?;
        file.write_all(contents.as_ref())
            .map_err(|e| CertmintError::output_write(path.display().to_string(), e))?;
        // The mode on open only applies to newly created files.
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| CertmintError::output_write(path.display().to_string(), e))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)
            .map_err(|e| CertmintError::output_write(path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_paths() {
        let dir = CaDir::new("/tmp/ca");
        assert_eq!(dir.root_cert_path(), PathBuf::from("/tmp/ca/rootCA.pem"));
        assert_eq!(
            dir.intermediate_key_path(),
            PathBuf::from("/tmp/ca/intermediateCA-key.pem")
        );
        assert_eq!(dir.serial_path(), PathBuf::from("/tmp/ca/serial.txt"));
        assert_eq!(dir.revoked_path(), PathBuf::from("/tmp/ca/revoked.db"));
    }

    #[test]
    fn test_is_installed_requires_all_four_files() {
        let tmp = tempdir().unwrap();
        let dir = CaDir::new(tmp.path());
        assert!(!dir.is_installed());

        for name in [ROOT_CERT_FILE, ROOT_KEY_FILE, INTERMEDIATE_CERT_FILE] {
            fs::write(dir.file(name), "x").unwrap();
        }
        assert!(!dir.is_installed());

        fs::write(dir.file(INTERMEDIATE_KEY_FILE), "x").unwrap();
        assert!(dir.is_installed());
    }

    #[test]
    fn test_read_ca_file_maps_absence_to_not_installed() {
        let tmp = tempdir().unwrap();
        let dir = CaDir::new(tmp.path());
        let err = dir.read_ca_file(INTERMEDIATE_CERT_FILE).unwrap_err();
        assert!(matches!(err, CertmintError::NotInstalled { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_secret_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let path = tmp.path().join("key.pem");
        write_secret(&path, "secret").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_public_creates_parent_dirs() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested/out/cert.pem");
        write_public(&path, "cert").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "cert");
    }
}

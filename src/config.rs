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

//! Issuance policy configuration.
//!
//! The policy lives in `config.yml` inside the CA directory. Missing fields
//! fall back to defaults, so a partial file is valid. Every load and save
//! passes through [`CaConfig::validate`], which enforces the recognized
//! ranges for validity periods and key parameters.

use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{CertmintError, Result};
use crate::store::CaDir;

/// Default CRL distribution point URL embedded in the intermediate CA.
pub const DEFAULT_CRL_URL: &str = "http://crl.local/intermediate.crl";

/// Key algorithm family used for generated key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// RSA with a configurable modulus size (2048, 3072, or 4096 bits).
    Rsa,
    /// NIST elliptic curves P-256, P-384, or P-521.
    Ecdsa,
}

/// Issuance policy for a CA directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaConfig {
    /// Validity of issued leaf certificates, in days (1..=825).
    #[serde(default = "default_validity_days")]
    pub default_validity_days: u32,

    /// Validity of the root CA certificate, in days (365..=7300).
    #[serde(default = "default_root_validity_days")]
    pub root_ca_validity_days: u32,

    /// Validity of the intermediate CA certificate, in days (365..=3650,
    /// strictly less than the root validity).
    #[serde(default = "default_intermediate_validity_days")]
    pub intermediate_ca_validity_days: u32,

    /// Default key algorithm family.
    #[serde(default = "default_key_type")]
    pub default_key_type: KeyType,

    /// Default key size: RSA modulus bits or ECDSA curve size.
    #[serde(default = "default_key_size")]
    pub default_key_size: u32,

    /// CRL distribution point URL embedded in the intermediate CA
    /// certificate. An empty string disables the extension.
    #[serde(default = "default_crl_url")]
    pub crl_url: String,
}

fn default_validity_days() -> u32 {
    365
}

fn default_root_validity_days() -> u32 {
    3650
}

fn default_intermediate_validity_days() -> u32 {
    1825
}

fn default_key_type() -> KeyType {
    KeyType::Rsa
}

fn default_key_size() -> u32 {
    2048
}

fn default_crl_url() -> String {
    DEFAULT_CRL_URL.to_string()
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            default_validity_days: default_validity_days(),
            root_ca_validity_days: default_root_validity_days(),
            intermediate_ca_validity_days: default_intermediate_validity_days(),
            default_key_type: default_key_type(),
            default_key_size: default_key_size(),
            crl_url: default_crl_url(),
        }
    }
}

impl CaConfig {
    /// Load the configuration from `config.yml` in the CA directory,
    /// returning defaults if the file does not exist.
    pub fn load(dir: &CaDir) -> Result<Self> {
        let path = dir.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read_to_string(&path)?;
        let cfg: CaConfig = serde_yaml::from_str(&data)
            .map_err(|e| CertmintError::config(format!("failed to parse config file: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate and save the configuration to `config.yml`.
    pub fn save(&self, dir: &CaDir) -> Result<()> {
        self.validate()?;

        fs::create_dir_all(dir.path())?;
        let data = serde_yaml::to_string(self)
            .map_err(|e| CertmintError::config(format!("failed to serialize config: {}", e)))?;
        let path = dir.config_path();
        fs::write(&path, data)
            .map_err(|e| CertmintError::output_write(path.display().to_string(), e))?;
        Ok(())
    }

    /// The CRL distribution point URL, if one is configured.
    pub fn crl_url(&self) -> Option<&str> {
        if self.crl_url.is_empty() {
            None
        } else {
            Some(&self.crl_url)
        }
    }

    /// Check that all values are within their recognized ranges.
    pub fn validate(&self) -> Result<()> {
        if self.default_validity_days < 1 {
            return Err(CertmintError::config(format!(
                "default_validity_days must be at least 1, got {}",
                self.default_validity_days
            )));
        }
        if self.default_validity_days > 825 {
            return Err(CertmintError::config(format!(
                "default_validity_days cannot exceed 825 (27 months), got {}",
                self.default_validity_days
            )));
        }

        if self.root_ca_validity_days < 365 {
            return Err(CertmintError::config(format!(
                "root_ca_validity_days must be at least 365, got {}",
                self.root_ca_validity_days
            )));
        }
        if self.root_ca_validity_days > 7300 {
            return Err(CertmintError::config(format!(
                "root_ca_validity_days cannot exceed 7300 (20 years), got {}",
                self.root_ca_validity_days
            )));
        }

        if self.intermediate_ca_validity_days < 365 {
            return Err(CertmintError::config(format!(
                "intermediate_ca_validity_days must be at least 365, got {}",
                self.intermediate_ca_validity_days
            )));
        }
        if self.intermediate_ca_validity_days > 3650 {
            return Err(CertmintError::config(format!(
                "intermediate_ca_validity_days cannot exceed 3650 (10 years), got {}",
                self.intermediate_ca_validity_days
            )));
        }
        if self.intermediate_ca_validity_days >= self.root_ca_validity_days {
            return Err(CertmintError::config(format!(
                "intermediate_ca_validity_days ({}) must be less than root_ca_validity_days ({})",
                self.intermediate_ca_validity_days, self.root_ca_validity_days
            )));
        }

        match self.default_key_type {
            KeyType::Rsa => {
                if !matches!(self.default_key_size, 2048 | 3072 | 4096) {
                    return Err(CertmintError::config(format!(
                        "default_key_size for RSA must be 2048, 3072, or 4096, got {}",
                        self.default_key_size
                    )));
                }
            }
            KeyType::Ecdsa => {
                if !matches!(self.default_key_size, 256 | 384 | 521) {
                    return Err(CertmintError::config(format!(
                        "default_key_size for ECDSA must be 256, 384, or 521, got {}",
                        self.default_key_size
                    )));
                }
            }
        }

        Ok(())
    }
}

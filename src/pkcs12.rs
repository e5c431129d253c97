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

//! PKCS#12 bundle export.
//!
//! Packs a leaf's private key together with the leaf and intermediate
//! certificates into a password-protected `.p12` file. The password may be
//! empty, which many consumers treat as "no password". The bundle contains
//! key material and is written with owner-only permissions.

use p12_keystore::{Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain};
use std::path::Path;
use tracing::info;

use crate::error::{CertmintError, Result};
use crate::keys::KeyMaterial;
use crate::store;

const BUNDLE_ALIAS: &str = "certmint";

/// Write a PKCS#12 bundle holding the key, the leaf certificate, and the
/// intermediate CA certificate.
pub fn export(
    path: &Path,
    key: &KeyMaterial,
    leaf_der: &[u8],
    intermediate_der: &[u8],
    password: &str,
) -> Result<()> {
    let leaf = Certificate::from_der(leaf_der)
        .map_err(|e| CertmintError::Pkcs12Export(format!("invalid leaf certificate: {}", e)))?;
    let intermediate = Certificate::from_der(intermediate_der).map_err(|e| {
        CertmintError::Pkcs12Export(format!("invalid intermediate certificate: {}", e))
    })?;

    let key_der = key.to_pkcs8_der()?;
    let chain = PrivateKeyChain::new(key_der.as_bytes(), [], vec![leaf, intermediate]);

    let mut keystore = KeyStore::new();
    keystore.add_entry(BUNDLE_ALIAS, KeyStoreEntry::PrivateKeyChain(chain));

    let bundle = keystore
        .writer(password)
        .write()
        .map_err(|e| CertmintError::Pkcs12Export(e.to_string()))?;

    store::write_secret(path, &bundle)?;
    info!(path = %path.display(), "PKCS#12 bundle written");
    Ok(())
}

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

//! # certmint
//!
//! A local certificate authority for development and internal
//! infrastructure. Certmint maintains a two-tier CA hierarchy (offline-style
//! root plus signing intermediate) in a state directory and issues leaf
//! certificates for TLS servers, TLS clients, and S/MIME, with CRL
//! publication and PKCS#12 export.
//!
//! ## Quick Start
//!
//! ```no_run
//! use certmint::{ca, config::CaConfig, issue, store::CaDir};
//!
//! fn main() -> certmint::Result<()> {
//!     // Install a CA hierarchy under the default directory.
//!     let dir = CaDir::resolve(None)?;
//!     ca::install(&dir, &CaConfig::default(), false)?;
//!
//!     // Issue a TLS server certificate for two names.
//!     let intermediate = ca::IntermediateCa::load(&dir)?;
//!     let cfg = CaConfig::load(&dir)?;
//!     let inputs = vec!["example.com".to_string(), "www.example.com".to_string()];
//!     let issued = issue::issue(
//!         &dir,
//!         &cfg,
//!         &intermediate,
//!         &issue::IssueRequest {
//!             inputs: &inputs,
//!             class: issue::CertClass::detect(&inputs, false),
//!             use_ecdsa: true,
//!             cert_file: None,
//!             key_file: None,
//!         },
//!     )?;
//!     println!("wrote {}", issued.cert_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## State directory
//!
//! All CA material lives in one directory, resolved from an explicit path,
//! the `CAROOT` environment variable, or `$HOME/.certmint`, in that order.
//! Directories are fully independent of each other; see [`store::CaDir`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ca;
pub mod config;
pub mod crl;
pub mod error;
pub mod issue;
pub mod keys;
pub mod ledger;
pub mod pkcs12;
pub mod serial;
pub mod store;

pub use config::CaConfig;
pub use error::{CertmintError, Result};
pub use store::CaDir;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

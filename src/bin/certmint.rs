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

//! Certmint Command-Line Tool
//!
//! A local certificate authority for development and internal infrastructure.
//!
//! # Usage
//!
//! ```text
//! certmint [OPTIONS] <COMMAND>
//!
//! Commands:
//!   install   Create the root and intermediate CA hierarchy
//!   issue     Issue a leaf certificate for domains, IPs, or emails
//!   sign-csr  Sign an externally generated certificate request
//!   revoke    Revoke an issued certificate by serial number
//!   crl       Build and publish the certificate revocation list
//!
//! Options:
//!   --ca-dir <PATH>   CA state directory (default: $CAROOT or ~/.certmint)
//!   -v, --verbose     Enable verbose output
//!   -q, --quiet       Suppress non-error output
//!   -h, --help        Print help
//!   -V, --version     Print version
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Create a new CA
//! certmint install
//!
//! # TLS server certificate for two names and an address
//! certmint issue example.com www.example.com 10.0.0.1
//!
//! # Client-auth certificate with an ECDSA key
//! certmint issue --client --ecdsa laptop.internal
//!
//! # S/MIME certificate, bundled as PKCS#12
//! certmint issue --pkcs12 user@example.com
//!
//! # Revoke serial 7 for key compromise, then publish the CRL
//! certmint revoke 7 --reason 1
//! certmint crl
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use certmint::store::CaDir;
use certmint::{ca, config::CaConfig, crl, issue, ledger, pkcs12};

/// Certmint Command-Line Tool
#[derive(Parser)]
#[command(name = "certmint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Local certificate authority for development", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// CA state directory (default: $CAROOT or ~/.certmint)
    #[arg(long, global = true, value_name = "PATH")]
    ca_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the root and intermediate CA hierarchy
    Install {
        /// Overwrite an existing CA in the state directory
        #[arg(short, long)]
        force: bool,
    },

    /// Issue a leaf certificate for domains, IPs, or emails
    Issue {
        /// Subject identifiers (DNS names, IP addresses, email addresses)
        #[arg(required = true, value_name = "NAME")]
        inputs: Vec<String>,

        /// Issue a client-authentication certificate
        #[arg(long)]
        client: bool,

        /// Generate an ECDSA P-256 key instead of the configured default
        #[arg(long)]
        ecdsa: bool,

        /// Certificate output path
        #[arg(long, value_name = "PATH")]
        cert_file: Option<PathBuf>,

        /// Private key output path
        #[arg(long, value_name = "PATH")]
        key_file: Option<PathBuf>,

        /// Also write a PKCS#12 bundle
        #[arg(long)]
        pkcs12: bool,

        /// PKCS#12 output path (default: certificate path with .p12)
        #[arg(long, value_name = "PATH")]
        p12_file: Option<PathBuf>,

        /// PKCS#12 password (default: empty)
        #[arg(long, value_name = "PASSWORD")]
        p12_password: Option<String>,
    },

    /// Sign an externally generated certificate request
    SignCsr {
        /// Path to a PEM-encoded CSR
        #[arg(value_name = "CSR")]
        csr: PathBuf,

        /// Certificate output path (default: CSR name with .pem)
        #[arg(long, value_name = "PATH")]
        cert_file: Option<PathBuf>,
    },

    /// Revoke an issued certificate by serial number
    Revoke {
        /// Serial number, decimal or hex
        #[arg(value_name = "SERIAL")]
        serial: String,

        /// RFC 5280 reason code
        #[arg(long, default_value = "0")]
        reason: u32,
    },

    /// Build and publish the certificate revocation list
    Crl {
        /// CRL output path (default: crl.pem in the CA directory)
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_command(cli: Cli) -> certmint::Result<()> {
    let dir = CaDir::resolve(cli.ca_dir.as_deref())?;

    match cli.command {
        Commands::Install { force } => cmd_install(&dir, force),
        Commands::Issue {
            inputs,
            client,
            ecdsa,
            cert_file,
            key_file,
            pkcs12,
            p12_file,
            p12_password,
        } => cmd_issue(
            &dir,
            inputs,
            client,
            ecdsa,
            cert_file,
            key_file,
            pkcs12,
            p12_file,
            p12_password,
        ),
        Commands::SignCsr { csr, cert_file } => cmd_sign_csr(&dir, &csr, cert_file),
        Commands::Revoke { serial, reason } => cmd_revoke(&dir, &serial, reason),
        Commands::Crl { out } => cmd_crl(&dir, out),
    }
}

fn cmd_install(dir: &CaDir, force: bool) -> certmint::Result<()> {
    let cfg = CaConfig::load(dir)?;
    let summary = ca::install(dir, &cfg, force)?;

    println!("CA installed in {}", dir.path().display());
    println!("  Root:         {}", dir.root_cert_path().display());
    println!("  Intermediate: {}", dir.intermediate_cert_path().display());
    if let Some(fp) = pem_thumbprint(&summary.root_cert_pem) {
        println!("  Root SHA-256: {}", fp);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_issue(
    dir: &CaDir,
    inputs: Vec<String>,
    client: bool,
    ecdsa: bool,
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
    want_pkcs12: bool,
    p12_file: Option<PathBuf>,
    p12_password: Option<String>,
) -> certmint::Result<()> {
    let cfg = CaConfig::load(dir)?;
    let intermediate = ca::IntermediateCa::load(dir)?;

    let class = issue::CertClass::detect(&inputs, client);
    let issued = issue::issue(
        dir,
        &cfg,
        &intermediate,
        &issue::IssueRequest {
            inputs: &inputs,
            class,
            use_ecdsa: ecdsa,
            cert_file,
            key_file,
        },
    )?;

    println!("Certificate issued (serial {})", issued.serial);
    println!("  Certificate: {}", issued.cert_path.display());
    println!("  Private key: {}", issued.key_path.display());
    if let Some(fp) = pem_thumbprint(&issued.cert_pem) {
        println!("  SHA-256:     {}", fp);
    }

    if want_pkcs12 {
        let p12_path = p12_file.unwrap_or_else(|| issued.cert_path.with_extension("p12"));
        pkcs12::export(
            &p12_path,
            &issued.key,
            &issued.cert_der,
            intermediate.cert_der(),
            p12_password.as_deref().unwrap_or(""),
        )?;
        println!("  PKCS#12:     {}", p12_path.display());
    }

    Ok(())
}

fn cmd_sign_csr(dir: &CaDir, csr: &std::path::Path, cert_file: Option<PathBuf>) -> certmint::Result<()> {
    let cfg = CaConfig::load(dir)?;
    let intermediate = ca::IntermediateCa::load(dir)?;

    let signed = issue::issue_from_csr(dir, &cfg, &intermediate, csr, cert_file)?;

    println!("Certificate issued from CSR (serial {})", signed.serial);
    println!("  Certificate: {}", signed.cert_path.display());
    if let Some(fp) = pem_thumbprint(&signed.cert_pem) {
        println!("  SHA-256:     {}", fp);
    }
    Ok(())
}

fn cmd_revoke(dir: &CaDir, serial: &str, reason: u32) -> certmint::Result<()> {
    let serial = ledger::parse_serial(serial)?;
    let entry = ledger::RevocationLedger::new(dir).revoke(serial, reason)?;

    println!("Certificate {} revoked (reason {})", entry.serial, entry.reason);
    println!("Run 'certmint crl' to publish an updated revocation list.");
    Ok(())
}

fn cmd_crl(dir: &CaDir, out: Option<PathBuf>) -> certmint::Result<()> {
    let intermediate = ca::IntermediateCa::load(dir)?;
    let built = crl::build(dir, &intermediate, out)?;

    println!(
        "CRL written to {} ({} revoked certificate(s))",
        built.path.display(),
        built.entry_count
    );
    Ok(())
}

fn pem_thumbprint(cert_pem: &str) -> Option<String> {
    use sha2::{Digest, Sha256};
    let der = pem::parse(cert_pem).ok()?.into_contents();
    let hash = Sha256::digest(&der);
    Some(
        hash.iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

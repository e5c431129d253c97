//! Error types for the certmint CA toolkit.
//!
//! Every operation is terminal on error: nothing is retried internally and no
//! partially written files are rolled back. The variants below map one-to-one
//! onto the failure modes surfaced to callers.

use thiserror::Error;

/// Result type alias using [`CertmintError`].
pub type Result<T> = std::result::Result<T, CertmintError>;

/// Errors that can occur during CA operations.
#[derive(Debug, Error)]
pub enum CertmintError {
    /// Configuration file contains an invalid or out-of-range value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The CA hierarchy has not been installed in this directory.
    #[error("CA not found in {dir}. Run 'certmint install' first")]
    NotInstalled {
        /// CA directory that was checked.
        dir: String,
    },

    /// The CA directory already contains an installed hierarchy.
    #[error("CA already installed in {dir}; pass --force to overwrite")]
    AlreadyInstalled {
        /// CA directory that was checked.
        dir: String,
    },

    /// Persisted CA key or certificate material could not be read or parsed.
    #[error("CA material unreadable: {0}")]
    CaMaterial(String),

    /// Key pair generation failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Certificate or CRL signing failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A CSR was syntactically valid but its self-signature did not verify.
    #[error("Invalid CSR signature: {0}")]
    CsrSignature(String),

    /// A CSR could not be decoded.
    #[error("Malformed CSR: {0}")]
    CsrMalformed(String),

    /// The serial number is already present in the revocation ledger.
    #[error("Certificate with serial {serial} is already revoked")]
    AlreadyRevoked {
        /// Serial number as supplied by the caller.
        serial: String,
    },

    /// The revocation ledger contains a line that does not parse.
    #[error("Malformed revocation ledger entry: {line}")]
    LedgerMalformed {
        /// The offending line.
        line: String,
    },

    /// The serial counter file does not contain a valid non-negative integer.
    #[error("Malformed serial counter: {0}")]
    SerialStoreMalformed(String),

    /// An output file could not be written.
    #[error("Failed to write {path}: {source}")]
    OutputWrite {
        /// Destination path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// PKCS#12 bundle encoding failed.
    #[error("PKCS#12 export failed: {0}")]
    Pkcs12Export(String),

    /// Caller-supplied input was rejected before any state changed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CertmintError {
    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not-installed error for the given CA directory.
    pub fn not_installed(dir: impl Into<String>) -> Self {
        Self::NotInstalled { dir: dir.into() }
    }

    /// Create a CA material error with the given message.
    pub fn ca_material(msg: impl Into<String>) -> Self {
        Self::CaMaterial(msg.into())
    }

    /// Create a key generation error with the given message.
    pub fn key_generation(msg: impl Into<String>) -> Self {
        Self::KeyGeneration(msg.into())
    }

    /// Create a signing error with the given message.
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Create an output write error for the given path.
    pub fn output_write(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid input error with the given message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

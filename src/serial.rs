//! Monotonic serial number allocation.
//!
//! Leaf certificate serials come from a decimal counter in `serial.txt`.
//! `allocate` reads the counter, returns the current value, and persists the
//! successor, so strictly sequential callers observe 1, 2, 3, ... with no
//! reuse. The read-then-rewrite cycle is not locked; concurrent processes
//! against the same CA directory may duplicate serials, which is an accepted
//! limitation of the design.
//!
//! Root and intermediate CA certificates do not draw from this counter; they
//! use random 128-bit serials (see [`random_ca_serial`]) so the sequential
//! space is reserved for leaves.

use rand::RngCore;
use std::fs;

use crate::error::{CertmintError, Result};
use crate::store::CaDir;

/// Allocator over the persisted serial counter of one CA directory.
#[derive(Debug)]
pub struct SerialAllocator<'a> {
    dir: &'a CaDir,
}

impl<'a> SerialAllocator<'a> {
    /// Create an allocator for the given CA directory.
    pub fn new(dir: &'a CaDir) -> Self {
        Self { dir }
    }

    /// Return the next serial number and persist the incremented counter.
    ///
    /// Initializes the counter file to 1 when absent, in which case 1 is
    /// returned and 2 persisted.
    pub fn allocate(&self) -> Result<u64> {
        let path = self.dir.serial_path();

        let current = match fs::read_to_string(&path) {
            Ok(data) => data.trim().parse::<u64>().map_err(|_| {
                CertmintError::SerialStoreMalformed(format!(
                    "{} does not contain a non-negative integer: {:?}",
                    path.display(),
                    data.trim()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 1,
            Err(e) => return Err(e.into()),
        };

        let next = current.checked_add(1).ok_or_else(|| {
            CertmintError::SerialStoreMalformed("serial counter overflow".to_string())
        })?;
        fs::write(&path, next.to_string())
            .map_err(|e| CertmintError::output_write(path.display().to_string(), e))?;

        Ok(current)
    }
}

/// Initialize the serial counter to 1, overwriting any existing value.
/// Called once at install time.
pub fn init_serial(dir: &CaDir) -> Result<()> {
    let path = dir.serial_path();
    fs::write(&path, "1").map_err(|e| CertmintError::output_write(path.display().to_string(), e))
}

/// A random 128-bit serial for CA certificates, distinct from the sequential
/// leaf space. The top bit is cleared so the DER integer stays positive.
pub fn random_ca_serial() -> Vec<u8> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes[0] &= 0x7f;
    bytes.to_vec()
}

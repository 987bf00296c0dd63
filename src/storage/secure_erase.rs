//! Multi-pass secure file erasure
//!
//! Each pass overwrites the whole file with fresh CSPRNG output and syncs it
//! to disk before the next pass starts. The file is unlinked only after every
//! pass succeeded; any failure aborts with the file still present.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use tracing::{debug, warn};

use crate::error::EraseError;

/// Default number of overwrite passes
pub const DEFAULT_PASSES: u32 = 3;

/// Overwrites files with random data before deleting them
#[derive(Debug, Clone, Copy)]
pub struct SecureEraser {
    passes: u32,
}

impl Default for SecureEraser {
    fn default() -> Self {
        Self::new(DEFAULT_PASSES)
    }
}

impl SecureEraser {
    /// Create an eraser running `passes` overwrite passes (at least one)
    pub fn new(passes: u32) -> Self {
        Self {
            passes: passes.max(1),
        }
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Overwrite `path` `passes` times, then delete it
    ///
    /// A missing path is a successful no-op.
    pub fn securely_delete(&self, path: &Path) -> Result<(), EraseError> {
        self.erase_with(path, |file, buffer, _pass| {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(buffer)?;
            file.sync_all()
        })
    }

    /// Erase with a custom pass writer; the writer must leave the pass durable
    fn erase_with<F>(&self, path: &Path, mut write_pass: F) -> Result<(), EraseError>
    where
        F: FnMut(&mut File, &[u8], u32) -> std::io::Result<()>,
    {
        let fail = |reason: String| EraseError::IoFailure {
            path: path.to_path_buf(),
            reason,
        };

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(fail(format!("Failed to stat file: {}", e))),
        };
        if !metadata.is_file() {
            return Err(fail("Not a regular file".into()));
        }

        let size = usize::try_from(metadata.len())
            .map_err(|_| fail("File too large to overwrite in memory".into()))?;

        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| fail(format!("Failed to open for overwrite: {}", e)))?;

        let mut buffer = vec![0u8; size];
        for pass in 1..=self.passes {
            OsRng.fill_bytes(&mut buffer);
            if let Err(e) = write_pass(&mut file, &buffer, pass) {
                warn!(path = %path.display(), pass, error = %e, "secure erase aborted; file left in place");
                return Err(fail(format!("Overwrite pass {} failed: {}", pass, e)));
            }
            debug!(path = %path.display(), pass, "overwrite pass complete");
        }
        drop(file);

        fs::remove_file(path).map_err(|e| fail(format!("Failed to unlink: {}", e)))?;
        debug!(path = %path.display(), passes = self.passes, "file securely erased");
        Ok(())
    }
}

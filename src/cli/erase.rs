//! Secure erase CLI command

use std::path::Path;

use crate::error::{VaultError, VaultResult};
use crate::storage::SecureEraser;

/// Overwrite and delete a file
pub fn handle_erase_command(path: &Path, passes: u32, force: bool) -> VaultResult<()> {
    if !path.exists() {
        return Err(VaultError::NotFound {
            entity_type: "File",
            identifier: path.display().to_string(),
        });
    }
    if !path.is_file() {
        return Err(VaultError::Validation(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    if !force {
        println!("WARNING: {} will be overwritten and cannot be recovered!", path.display());
        println!("To proceed, run again with --force flag.");
        return Ok(());
    }

    let eraser = SecureEraser::new(passes);
    eraser.securely_delete(path)?;
    println!(
        "Erased {} ({} pass(es)).",
        path.display(),
        eraser.passes()
    );
    Ok(())
}

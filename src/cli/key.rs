//! Master key CLI commands

use clap::Subcommand;

use super::CliContext;
use crate::crypto::key_manager::{DEFAULT_ACCOUNT, DEFAULT_SERVICE};
use crate::crypto::CredentialStore;
use crate::error::VaultResult;

/// Master key commands
#[derive(Subcommand)]
pub enum KeyCommands {
    /// Create the credential store and master key (no-op if they exist)
    Init,

    /// Show whether a master key exists
    Status,
}

pub fn handle_key_command(ctx: &CliContext, cmd: KeyCommands) -> VaultResult<()> {
    match cmd {
        KeyCommands::Init => {
            let existed = ctx.has_credentials();
            ctx.key_manager()?;
            if existed {
                println!("Master key is available.");
            } else {
                println!("Master key created.");
                println!(
                    "Credential store: {}",
                    ctx.paths().credentials_file().display()
                );
            }
        }

        KeyCommands::Status => {
            println!("Key Status");
            println!("==========");
            if !ctx.has_credentials() {
                println!("Master key: not created");
                println!("Create one with: flowkey-vault key init");
                return Ok(());
            }

            let store = ctx.credentials()?;
            let present = store.load(DEFAULT_SERVICE, DEFAULT_ACCOUNT)?.is_some();
            println!(
                "Master key: {}",
                if present { "present" } else { "missing" }
            );
            println!(
                "Credential store: {}",
                ctx.paths().credentials_file().display()
            );
        }
    }

    Ok(())
}

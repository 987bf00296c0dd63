//! Privacy settings CLI commands

use clap::Subcommand;

use super::CliContext;
use crate::error::VaultResult;

/// Settings commands
#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Show the current privacy settings
    Show,

    /// Change one setting
    Set {
        /// encrypt-backups, secure-delete, erase-passes, max-backup-files,
        /// auto-backup or auto-backup-interval
        field: String,
        value: String,
    },
}

pub fn handle_settings_command(ctx: &CliContext, cmd: SettingsCommands) -> VaultResult<()> {
    let keys = ctx.key_manager()?;
    let store = ctx.settings_store(&keys);
    let mut settings = store.load()?;

    match cmd {
        SettingsCommands::Show => {
            println!("Privacy Settings");
            println!("================");
            println!("encrypt-backups:      {}", settings.encrypt_backups);
            println!("secure-delete:        {}", settings.secure_delete);
            println!("erase-passes:         {}", settings.erase_passes);
            println!("max-backup-files:     {}", settings.max_backup_files);
            println!("auto-backup:          {}", settings.auto_backup_enabled);
            println!(
                "auto-backup-interval: {}h",
                settings.auto_backup_interval_hours
            );
        }

        SettingsCommands::Set { field, value } => {
            settings.set_field(&field, &value)?;
            store.save(&settings)?;
            println!("Set {} = {}", field, value);
        }
    }

    Ok(())
}

//! Backup CLI commands
//!
//! Implements CLI commands for backup management.

use clap::Subcommand;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{format_size, CliContext};
use crate::backup::{BackupFile, RestoreOptions};
use crate::error::{VaultError, VaultResult};

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// Write the snapshot unencrypted
        #[arg(long)]
        plain: bool,
    },

    /// List all available backups
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a specific backup
    Info {
        /// Backup id, filename or path (use 'latest' for most recent)
        backup: String,
    },

    /// Restore from a backup
    Restore {
        /// Backup id, filename or path (use 'latest' for most recent)
        backup: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,

        /// Do not back up the current data first
        #[arg(long)]
        no_restore_point: bool,
    },

    /// Delete a backup
    Delete {
        /// Backup id
        id: String,
    },

    /// Delete backups beyond the retention limit
    Prune,

    /// Create a backup if the automatic backup interval has passed
    Auto,
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Backup")]
    id: String,
    #[tabled(rename = "Created (UTC)")]
    created: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Encrypted")]
    encrypted: String,
    #[tabled(rename = "Schema")]
    schema: String,
}

impl BackupRow {
    fn new(index: usize, backup: &BackupFile) -> Self {
        let age = chrono::Utc::now().signed_duration_since(backup.created_at);
        Self {
            index,
            id: backup.id.clone(),
            created: backup.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            age: format_duration(age),
            size: format_size(backup.size_bytes),
            encrypted: if backup.encrypted { "yes" } else { "no" }.to_string(),
            schema: backup
                .schema_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Handle a backup command
pub fn handle_backup_command(ctx: &CliContext, cmd: BackupCommands) -> VaultResult<()> {
    let vault = ctx.open_vault()?;

    match cmd {
        BackupCommands::Create { plain } => {
            let encrypt = !plain && vault.settings().encrypt_backups;
            let backup = vault.create_backup_with(encrypt)?;
            println!("Backup created: {}", backup.file_name);
            println!("Location: {}", backup.path.display());
            if !encrypt {
                println!("Note: this backup is not encrypted.");
            }
        }

        BackupCommands::List { verbose } => {
            let backups = vault.list_backups()?;

            if backups.is_empty() {
                println!("No backups found.");
                println!("Create one with: flowkey-vault backup create");
                return Ok(());
            }

            if verbose {
                let rows: Vec<BackupRow> = backups
                    .iter()
                    .enumerate()
                    .map(|(i, backup)| BackupRow::new(i + 1, backup))
                    .collect();
                let mut table = Table::new(rows);
                table.with(Style::modern());
                println!("{}", table);
                println!("Directory: {}", vault.store().dir().display());
            } else {
                for (i, backup) in backups.iter().enumerate() {
                    println!(
                        "  {}. {} ({}{})",
                        i + 1,
                        backup.id,
                        format_size(backup.size_bytes),
                        if backup.encrypted { ", encrypted" } else { "" }
                    );
                }
            }

            println!();
            println!(
                "Total: {} backup(s), keeping at most {}",
                backups.len(),
                vault.store().config().max_backup_files
            );
        }

        BackupCommands::Info { backup } => {
            let path = vault.resolve_backup(&backup)?;
            let inspection = vault.inspect_backup(&path)?;
            let metadata = std::fs::metadata(&path)?;

            println!("Backup Details");
            println!("==============");
            println!("File: {}", path.display());
            println!("Size: {}", format_size(metadata.len()));
            println!("Snapshot: {}", inspection.snapshot_id);
            println!(
                "Taken: {}",
                inspection.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("Schema version: {}", inspection.schema_version);
            println!(
                "Encrypted: {}",
                if inspection.encrypted { "Yes" } else { "No" }
            );
            println!();
            println!("Contents:");
            println!("  Translations: {}", inspection.translations);
            println!("  Documents:    {}", inspection.documents);
            println!("  Habits:       {}", inspection.habits);
            println!(
                "  Settings:     {}",
                if inspection.has_settings { "Yes" } else { "No" }
            );
        }

        BackupCommands::Restore {
            backup,
            force,
            no_restore_point,
        } => {
            let path = vault.resolve_backup(&backup)?;
            let inspection = vault.inspect_backup(&path)?;

            println!("Backup Information");
            println!("==================");
            println!("File: {}", path.display());
            println!("Status: {}", inspection.summary());
            println!();

            if !force {
                println!("WARNING: This will replace ALL current translations, documents and habits!");
                println!("To proceed, run again with --force flag:");
                println!("  flowkey-vault backup restore {} --force", backup);
                return Ok(());
            }

            let options = RestoreOptions {
                create_restore_point: !no_restore_point,
                encrypt_restore_point: vault.settings().encrypt_backups,
            };

            println!("Restoring from backup...");
            match vault.restore_backup(&path, options) {
                Ok(result) => {
                    println!("Restore complete!");
                    println!("{}", result.summary());
                }
                Err(VaultError::Restore(err)) => {
                    if let Some(point) = &err.restore_point {
                        if err.rolled_back {
                            println!("Restore failed; your previous data was put back.");
                        } else {
                            println!(
                                "Restore failed part way. Recover with: flowkey-vault backup restore {} --force",
                                point.id
                            );
                        }
                    }
                    return Err(VaultError::Restore(err));
                }
                Err(e) => return Err(e),
            }
        }

        BackupCommands::Delete { id } => {
            vault.delete_backup(&id)?;
            println!("Deleted backup: {}", id);
        }

        BackupCommands::Prune => {
            let removed = vault.prune_backups()?;
            if removed.is_empty() {
                println!(
                    "No backups to prune (keeping at most {}).",
                    vault.store().config().max_backup_files
                );
            } else {
                for backup in &removed {
                    println!("  Removed {}", backup.id);
                }
                println!("Deleted {} backup(s).", removed.len());
            }
        }

        BackupCommands::Auto => match vault.run_auto_backup()? {
            Some(backup) => println!("Backup created: {}", backup.file_name),
            None => println!("No backup due."),
        },
    }

    Ok(())
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

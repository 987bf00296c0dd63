use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flowkey_vault::cli::{
    handle_backup_command, handle_erase_command, handle_key_command, handle_settings_command,
    BackupCommands, CliContext, KeyCommands, SettingsCommands,
};
use flowkey_vault::config::FlowKeyPaths;
use flowkey_vault::storage::secure_erase::DEFAULT_PASSES;

/// Environment variable holding the log filter
const LOG_ENV: &str = "FLOWKEY_LOG";

#[derive(Parser)]
#[command(
    name = "flowkey-vault",
    version,
    about = "Encrypted backups and secure deletion for FlowKey user data",
    long_about = "flowkey-vault manages the FlowKey master key, creates encrypted \
                  rolling backups of translation history, knowledge documents and \
                  habits, restores them safely, and securely erases files."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Master key management
    #[command(subcommand)]
    Key(KeyCommands),

    /// Backup and restore commands
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Overwrite a file with random data, then delete it
    Erase {
        /// File to erase
        path: PathBuf,
        /// Number of overwrite passes
        #[arg(short, long, default_value_t = DEFAULT_PASSES)]
        passes: u32,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Privacy settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Show current configuration and paths
    Config,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let paths = FlowKeyPaths::new()?;
    let ctx = CliContext::new(paths.clone());

    match cli.command {
        Some(Commands::Key(cmd)) => handle_key_command(&ctx, cmd)?,
        Some(Commands::Backup(cmd)) => handle_backup_command(&ctx, cmd)?,
        Some(Commands::Erase {
            path,
            passes,
            force,
        }) => handle_erase_command(&path, passes, force)?,
        Some(Commands::Settings(cmd)) => handle_settings_command(&ctx, cmd)?,
        Some(Commands::Config) => {
            println!("FlowKey Vault Configuration");
            println!("===========================");
            println!("Data directory:    {}", paths.base_dir().display());
            println!("Backup directory:  {}", paths.backup_dir().display());
            println!("Preferences file:  {}", paths.preferences_file().display());
            println!("Credential store:  {}", paths.credentials_file().display());
            println!("User data file:    {}", paths.user_data_file().display());
            println!();
            println!(
                "Master key: {}",
                if ctx.has_credentials() {
                    "created"
                } else {
                    "not created (run 'flowkey-vault key init')"
                }
            );
        }
        None => {
            println!("FlowKey Vault - encrypted backups for FlowKey user data");
            println!();
            println!("Run 'flowkey-vault --help' for usage information.");
        }
    }

    Ok(())
}

//! tagstore CLI
//!
//! Command-line interface for tagstore - manage NFC/QR tags and record scans.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use tagstore_core::{BroadcastBus, Config, StorageError, TagComponent};

mod commands;
mod logging;
mod output;

use commands::tag::TagFields;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "tagstore")]
#[command(about = "tagstore - Manage NFC/QR tags and their scans")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all tags
    #[command(alias = "ls")]
    List,
    /// Show tag details
    Show {
        /// Tag ID
        id: String,
    },
    /// Create a new tag
    #[command(alias = "add")]
    Create {
        /// Tag ID (a UUID is generated if omitted)
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Update an existing tag
    Update {
        /// Tag ID
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete a tag
    #[command(alias = "rm")]
    Delete {
        /// Tag ID
        id: String,
    },
    /// Record a scan of a tag
    Scan {
        /// Tag ID as read from the tag
        tag_id: String,
        /// Device that scanned the tag
        #[arg(short, long)]
        device_id: Option<String>,
        /// User to attribute the scan to
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Show storage status and counts
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args, Debug, Clone)]
struct FieldArgs {
    /// Display name
    #[arg(short, long)]
    name: Option<String>,
    /// Description
    #[arg(short = 'D', long)]
    description: Option<String>,
    /// Last scan time (ISO-8601)
    #[arg(long)]
    last_scanned: Option<String>,
    /// Device that last scanned the tag
    #[arg(long)]
    device_id: Option<String>,
}

impl From<FieldArgs> for TagFields {
    fn from(args: FieldArgs) -> Self {
        TagFields {
            name: args.name,
            description: args.description,
            last_scanned: args.last_scanned,
            device_id: args.device_id,
        }
    }
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, backend, log_level, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let result = run(Cli::parse());
    if let Err(err) = &result {
        if let Some(hint) = recovery_hint(err) {
            eprintln!("Hint: {}", hint);
        }
    }
    result
}

/// Recovery suggestion of the first storage error in the chain
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(StorageError::recovery_suggestion)
}

fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the tag store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    logging::init(&config, cli.verbose);

    let bus = Arc::new(BroadcastBus::default());
    let mut events = bus.subscribe();

    let tags = TagComponent::from_config(&config, bus.clone())
        .context("Failed to open tag storage")?;
    tags.setup().context("Failed to load tags")?;

    let result = match cli.command {
        Commands::List => commands::tag::list(&tags, &output),
        Commands::Show { id } => commands::tag::show(&tags, id, &output),
        Commands::Create { id, fields } => {
            commands::tag::create(&tags, id, fields.into(), &output)
        }
        Commands::Update { id, fields } => {
            commands::tag::update(&tags, id, fields.into(), &output)
        }
        Commands::Delete { id } => commands::tag::delete(&tags, id, &output),
        Commands::Scan {
            tag_id,
            device_id,
            user,
        } => commands::tag::scan(&tags, &mut events, tag_id, device_id, user, &output),
        Commands::Status => commands::status::show(&config, &tags, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    tags.shutdown();
    result
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_recovery_hint_found_through_context() {
        let err = tagstore_core::TagError::Storage(StorageError::InvalidFormat {
            key: "tag".to_string(),
            details: "expected value".to_string(),
        });
        let err = anyhow::Error::new(err).context("Failed to load tags");
        assert!(recovery_hint(&err).is_some());

        assert!(recovery_hint(&anyhow::anyhow!("plain failure")).is_none());
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from(["tagstore", "scan", "04:A2:19", "-d", "phone"]).unwrap();
        match cli.command {
            Commands::Scan {
                tag_id, device_id, ..
            } => {
                assert_eq!(tag_id, "04:A2:19");
                assert_eq!(device_id.as_deref(), Some("phone"));
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_parse_create_fields() {
        let cli = Cli::try_parse_from([
            "tagstore",
            "--json",
            "create",
            "--id",
            "abc",
            "--name",
            "Front Door",
            "-D",
            "Porch",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Create { id, fields } => {
                assert_eq!(id.as_deref(), Some("abc"));
                let fields: TagFields = fields.into();
                assert_eq!(fields.name.as_deref(), Some("Front Door"));
                assert_eq!(fields.description.as_deref(), Some("Porch"));
            }
            _ => panic!("expected create"),
        }
    }
}

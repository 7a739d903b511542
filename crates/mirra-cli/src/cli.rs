use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mirra",
    about = "Mirror packages from an npm-compatible registry",
    version,
    arg_required_else_help = true
)]
pub struct Args {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to an alternate config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Keep all state in memory; nothing is written to disk
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync packages from the upstream registry
    Sync {
        /// Package names
        #[arg(required = true)]
        names: Vec<String>,

        /// Do not sync dependencies of changed packages
        #[arg(long)]
        no_dep: bool,

        /// Rebuild packages from backup records instead of the upstream
        #[arg(long)]
        from_backup: bool,

        /// Store the run log under this identifier
        #[arg(long)]
        log_id: Option<String>,

        /// Name recorded as the actor of the run
        #[arg(long)]
        username: Option<String>,
    },

    /// Sync user accounts from the upstream registry
    #[command(name = "sync-user")]
    SyncUser {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the document stored in the backup records of a package
    Restore { name: String },

    /// Print the document served for a package
    Show {
        name: String,

        /// Print the abbreviated install representation
        #[arg(short, long)]
        abbreviated: bool,
    },

    /// Print the log of a sync run
    Log { log_id: String },

    /// Print the active configuration
    Config,

    /// Write a default configuration file
    #[command(name = "defconfig")]
    DefConfig,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_sync_flags() {
        let args = Args::parse_from([
            "mirra",
            "sync",
            "lodash",
            "@types/node",
            "--no-dep",
            "--log-id",
            "run-1",
        ]);
        match args.command {
            Commands::Sync {
                names,
                no_dep,
                from_backup,
                log_id,
                username,
            } => {
                assert_eq!(names, vec!["lodash", "@types/node"]);
                assert!(no_dep);
                assert!(!from_backup);
                assert_eq!(log_id.as_deref(), Some("run-1"));
                assert!(username.is_none());
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["mirra", "show", "react", "-a", "--ephemeral", "-vv"]);
        assert!(args.ephemeral);
        assert_eq!(args.verbose, 2);
        assert!(matches!(
            args.command,
            Commands::Show {
                abbreviated: true,
                ..
            }
        ));
    }

    #[test]
    fn test_sync_requires_names() {
        assert!(Args::try_parse_from(["mirra", "sync"]).is_err());
    }
}

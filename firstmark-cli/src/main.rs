//! Firstmark CLI - media fingerprinting and first-registrant ownership.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use firstmark_core::{ExactHash, MediaKind, Principal};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid arguments or configuration)
  65  Data error (undecodable media, corrupt registry file)
  66  Input file or registry not found
  67  Content already registered (duplicate)
  74  I/O error writing the registry
  77  Not authorized for this operation";

/// Snapshot encoding used when writing the registry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SnapshotFormat {
    Cbor,
    Json,
}

#[derive(Parser)]
#[command(name = "firstmark")]
#[command(author, version, about = "Media fingerprinting and first-registrant ownership registry", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Registry file to operate on
    #[arg(long, global = true, env = "FIRSTMARK_REGISTRY", default_value = "registry.firstmark")]
    pub registry: PathBuf,

    /// Encoding for registry writes (defaults to the file's current encoding)
    #[arg(long, global = true, value_enum)]
    pub format: Option<SnapshotFormat>,

    /// Print machine-readable JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress formatted output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty registry
    Init {
        /// Administrator identity
        #[arg(long, value_parser = parse_principal)]
        admin: Principal,

        /// Overwrite an existing registry file
        #[arg(long)]
        force: bool,
    },

    /// Compute and print the fingerprint of a file
    Fingerprint {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Media kind (video, image, audio, other); guessed from the extension
        #[arg(long)]
        kind: Option<MediaKind>,
    },

    /// Check a file against the registry without registering it
    Detect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long)]
        kind: Option<MediaKind>,
    },

    /// Register a file if it is original, otherwise report the original owner
    Submit {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Registering owner
        #[arg(long, value_parser = parse_principal)]
        owner: Principal,

        /// Where the full object can be fetched (stored verbatim)
        #[arg(long)]
        locator: String,

        #[arg(long)]
        kind: Option<MediaKind>,
    },

    /// Show a registered record
    Show {
        /// Exact hash (64 hex chars)
        #[arg(value_name = "EXACT")]
        exact: ExactHash,
    },

    /// List the records registered by an owner
    Owner {
        #[arg(value_name = "ID", value_parser = parse_principal)]
        owner: Principal,
    },

    /// Print registry-wide counters
    Stats,

    /// Record a view of a registered record
    Views {
        #[arg(value_name = "EXACT")]
        exact: ExactHash,
    },

    /// Raise, resolve and list ownership disputes
    #[command(subcommand)]
    Dispute(DisputeCommand),

    /// Manage the admin and arbitrator roles
    #[command(subcommand)]
    Role(RoleCommand),

    /// Find registered records visually close to a file
    Similar {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Largest Hamming distance to report
        #[arg(long, default_value_t = firstmark_core::DEFAULT_SIMILARITY_THRESHOLD)]
        max_distance: u32,

        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        kind: Option<MediaKind>,
    },
}

#[derive(Subcommand)]
pub enum DisputeCommand {
    /// Challenge the ownership of a record
    Raise {
        #[arg(value_name = "EXACT")]
        target: ExactHash,

        #[arg(long, value_parser = parse_principal)]
        accuser: Principal,

        #[arg(long)]
        reason: String,
    },

    /// Settle an open dispute (arbitrators only)
    Resolve {
        #[arg(value_name = "ID")]
        id: u64,

        #[arg(long, value_parser = parse_principal)]
        actor: Principal,

        /// Side with the accuser
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        uphold: bool,

        /// Side with the owner and clear the disputed flag
        #[arg(long)]
        reject: bool,
    },

    /// List disputes, optionally only those against one record
    List {
        #[arg(value_name = "EXACT")]
        target: Option<ExactHash>,

        /// Only unresolved disputes
        #[arg(long)]
        open: bool,
    },
}

#[derive(Subcommand)]
pub enum RoleCommand {
    /// Grant the arbitrator role
    AddArbitrator {
        #[arg(value_name = "ID", value_parser = parse_principal)]
        who: Principal,

        #[arg(long, value_parser = parse_principal)]
        actor: Principal,
    },

    /// Revoke the arbitrator role
    RemoveArbitrator {
        #[arg(value_name = "ID", value_parser = parse_principal)]
        who: Principal,

        #[arg(long, value_parser = parse_principal)]
        actor: Principal,
    },

    /// Hand the admin role to another identity
    TransferAdmin {
        #[arg(value_name = "ID", value_parser = parse_principal)]
        who: Principal,

        #[arg(long, value_parser = parse_principal)]
        actor: Principal,
    },

    /// Show the admin and the arbitrators
    List,
}

fn parse_principal(s: &str) -> Result<Principal, String> {
    Principal::parse(s).map_err(|e| e.to_string())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Init { admin, force } => commands::init::execute(&global, admin, force),
        Commands::Fingerprint { file, kind } => {
            commands::fingerprint::execute(&global, file, kind).await
        }
        Commands::Detect { file, kind } => commands::detect::execute(&global, file, kind).await,
        Commands::Submit {
            file,
            owner,
            locator,
            kind,
        } => commands::submit::execute(&global, file, owner, locator, kind).await,
        Commands::Show { exact } => commands::records::show(&global, exact),
        Commands::Owner { owner } => commands::records::owner(&global, owner),
        Commands::Stats => commands::records::stats(&global),
        Commands::Views { exact } => commands::records::views(&global, exact),
        Commands::Dispute(cmd) => commands::dispute::execute(&global, cmd),
        Commands::Role(cmd) => commands::role::execute(&global, cmd),
        Commands::Similar {
            file,
            max_distance,
            limit,
            kind,
        } => commands::similar::execute(&global, file, max_distance, limit, kind).await,
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_tracing(cli.global.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} Failed to start async runtime: {}", "error:".red().bold(), e);
            return ExitCode::from(exit_codes::GENERAL_ERROR);
        }
    };
    let outcome = runtime.block_on(run(cli));
    // Do not wait on a decode worker abandoned by a timeout
    runtime.shutdown_background();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let exit = exit_codes::CliExit::from_anyhow(&err);
            if let Some(message) = &exit.message {
                eprintln!("{} {}", "error:".red().bold(), message);
            }
            ExitCode::from(exit.code)
        }
    }
}

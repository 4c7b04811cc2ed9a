use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mrl",
    about = "MedRecord Ledger — consent, audit, and integrity registries",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Ledger directory.
    #[arg(short, long, global = true, default_value = ".mrl")]
    pub dir: String,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new ledger directory
    Init,
    /// Record a consent grant
    Grant(GrantArgs),
    /// Revoke a consent grant
    Revoke(PairArgs),
    /// Check consent between two principals
    Check(CheckArgs),
    /// Append an access event to the audit log
    Log(LogArgs),
    /// Show a patient's audit history
    History(HistoryArgs),
    /// Show entries recorded for an accessor
    Accesses(AccessesArgs),
    /// Register or update a content digest
    Store(StoreArgs),
    /// Verify a candidate digest against the stored one
    Verify(VerifyArgs),
    /// Show the integrity record for a content id
    Details(DetailsArgs),
    /// List content ids registered by an owner
    Owned(OwnedArgs),
    /// Replay the notification journal
    Events(EventsArgs),
}

#[derive(Args)]
pub struct GrantArgs {
    /// Grantor principal (hex).
    pub grantor: String,
    /// Grantee principal (hex).
    pub grantee: String,
    /// Access level: full, limited, or temporary.
    #[arg(short, long, default_value = "limited")]
    pub level: String,
    /// Window start, milliseconds since the UNIX epoch.
    #[arg(long)]
    pub from: u64,
    /// Window end, milliseconds since the UNIX epoch.
    #[arg(long)]
    pub until: u64,
    /// Purpose for data access.
    #[arg(short, long, default_value = "")]
    pub purpose: String,
}

#[derive(Args)]
pub struct PairArgs {
    pub grantor: String,
    pub grantee: String,
}

#[derive(Args)]
pub struct CheckArgs {
    pub grantor: String,
    pub grantee: String,
    /// Check at this instant instead of now (milliseconds).
    #[arg(long)]
    pub at: Option<u64>,
}

#[derive(Args)]
pub struct LogArgs {
    pub patient: String,
    pub accessor: String,
    #[arg(short, long)]
    pub resource: String,
    #[arg(short = 't', long, default_value = "view")]
    pub access_type: String,
    /// Event instant (milliseconds); defaults to now.
    #[arg(long)]
    pub at: Option<u64>,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub patient: String,
    /// Range start (milliseconds).
    #[arg(long)]
    pub start: Option<u64>,
    /// Range end (milliseconds).
    #[arg(long)]
    pub end: Option<u64>,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct AccessesArgs {
    pub accessor: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct StoreArgs {
    pub content_id: String,
    pub digest: String,
    #[arg(short = 't', long, default_value = "record")]
    pub content_type: String,
    /// Owner principal (hex).
    #[arg(short, long)]
    pub owner: String,
    /// Registration instant (milliseconds); defaults to now.
    #[arg(long)]
    pub at: Option<u64>,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub content_id: String,
    pub digest: String,
}

#[derive(Args)]
pub struct DetailsArgs {
    pub content_id: String,
}

#[derive(Args)]
pub struct OwnedArgs {
    pub owner: String,
}

#[derive(Args)]
pub struct EventsArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    /// Only events from this registry: consent, audit, or integrity.
    #[arg(short, long)]
    pub registry: Option<String>,
}

use clap::{Args, Subcommand};

/// Connector options shared by the streaming commands.
#[derive(Args, Debug)]
pub struct OptionsArgs {
    #[arg(long, help = "JSON file with connector options")]
    pub options: Option<String>,

    #[arg(
        long = "option",
        value_name = "KEY=VALUE",
        help = "Connector option, overrides the options file (repeatable)"
    )]
    pub overrides: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull rows in micro-batches and commit progress after each one
    Stream {
        #[command(flatten)]
        options: OptionsArgs,

        #[arg(long, help = "Stop after this many batches")]
        batches: Option<u64>,

        #[arg(
            long,
            help = "Write rows as JSON lines to this file instead of stdout"
        )]
        output: Option<String>,

        #[arg(
            long,
            help = "Keep polling after the source runs dry instead of exiting"
        )]
        follow: bool,

        #[arg(
            long,
            default_value_t = 5000,
            help = "Pause between polls in follow mode, in milliseconds"
        )]
        idle_ms: u64,
    },
    /// Show or reset the stored checkpoint
    Progress {
        #[command(flatten)]
        options: OptionsArgs,

        #[arg(long, help = "Overwrite the checkpoint with this offset")]
        reset: Option<u64>,

        #[arg(
            long,
            help = "If set, prints the progress information as JSON instead of a table"
        )]
        json: bool,
    },
    /// Print the fixed source schema
    Schema {
        #[arg(long)]
        json: bool,
    },
    /// Manage workspace repos
    Repos {
        #[command(subcommand)]
        command: ReposCommand,
    },
    /// List SQL query history
    QueryHistory {
        #[arg(long = "status", help = "Query status filter (repeatable)")]
        statuses: Vec<String>,

        #[arg(long = "user-id", help = "User id filter (repeatable)")]
        user_ids: Vec<u64>,

        #[arg(long = "warehouse-id", help = "Warehouse id filter (repeatable)")]
        warehouse_ids: Vec<String>,

        #[arg(long, requires = "end_time_ms")]
        start_time_ms: Option<u64>,

        #[arg(long, requires = "start_time_ms")]
        end_time_ms: Option<u64>,

        #[arg(long, help = "Page size requested from the API")]
        max_results: Option<u32>,

        #[arg(long, help = "Do not request query metrics")]
        no_metrics: bool,

        #[arg(long, help = "Print one JSON object per query instead of a table")]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ReposCommand {
    /// Show the single repo matching a path prefix
    Get {
        #[arg(long)]
        path_prefix: String,
    },
    /// Update a repo to a branch, a tag, or the head of its current branch
    Pull {
        #[arg(long)]
        path_prefix: String,

        #[arg(long, conflicts_with = "tag")]
        branch: Option<String>,

        #[arg(long)]
        tag: Option<String>,
    },
    /// Clone a repo into /Repos/<folder>/<repo>
    Clone {
        #[arg(long, help = "(/Repos/)<folder>/<repo>")]
        path: String,

        #[arg(long, help = "Git provider, e.g. gitHub")]
        provider: String,

        #[arg(long)]
        url: String,
    },
    /// Clone into /Repos/jobs if missing, then pull
    Sync {
        #[arg(long)]
        provider: String,

        #[arg(long)]
        url: String,

        #[arg(long, default_value = "")]
        branch: String,
    },
}

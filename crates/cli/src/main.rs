use crate::{
    commands::{Commands, OptionsArgs, ReposCommand},
    env::EnvManager,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::http::build_client;
use engine_config::{
    file::{parse_override, read_options_file},
    options::ConnectorOptions,
};
use engine_core::{
    connector::CustomApiSource,
    progress::ProgressService,
    source::DataSource,
    state::open_progress_store,
};
use engine_runtime::{
    driver::{DriverSettings, MicroBatchDriver, StopReason},
    sink::{JsonLinesSink, RowSink},
};
use model::core::schema::Schema;
use std::{collections::HashMap, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use workspace_client::{
    repos::{PullTarget, RepoHandler},
    sql::{DbsqlHandler, QueryHistoryFilter, TimeRange},
};

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "pullstream",
    version,
    about = "Incremental HTTP pull connector with offset checkpointing"
)]
struct Cli {
    #[arg(long, global = true, help = "Load variables from this .env file first")]
    env_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so rows can be piped from stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = &cli.env_file {
        env.load_from_file(path)?;
        info!("Loaded environment from {}", path);
    }

    match cli.command {
        Commands::Stream {
            options,
            batches,
            output,
            follow,
            idle_ms,
        } => {
            let options = load_options(&env, &options)?;
            let settings = DriverSettings {
                max_batches: batches,
                stop_when_drained: !follow,
                idle_interval: Duration::from_millis(idle_ms),
            };
            return stream(options, settings, output).await;
        }
        Commands::Progress {
            options,
            reset,
            json,
        } => {
            let options = load_options(&env, &options)?;
            show_progress(&options, reset, json).await?;
        }
        Commands::Schema { json } => {
            let schema = Schema::rows();
            if json {
                output::print_json(&schema)?;
            } else {
                println!("{schema}");
            }
        }
        Commands::Repos { command } => {
            let mut repos = RepoHandler::new(&env.workspace_context()?)?;
            let details = match command {
                ReposCommand::Get { path_prefix } => repos.get_repo(&path_prefix).await?,
                ReposCommand::Pull {
                    path_prefix,
                    branch,
                    tag,
                } => {
                    repos.get_repo(&path_prefix).await?;
                    let target = match (branch, tag) {
                        (Some(branch), _) => PullTarget::Branch(branch),
                        (None, Some(tag)) => PullTarget::Tag(tag),
                        (None, None) => PullTarget::Current,
                    };
                    repos.pull(target).await?
                }
                ReposCommand::Clone {
                    path,
                    provider,
                    url,
                } => repos.clone(&path, &provider, &url).await?,
                ReposCommand::Sync {
                    provider,
                    url,
                    branch,
                } => repos.update_or_create(&provider, &url, &branch).await?,
            };
            output::print_json(details)?;
        }
        Commands::QueryHistory {
            statuses,
            user_ids,
            warehouse_ids,
            start_time_ms,
            end_time_ms,
            max_results,
            no_metrics,
            json,
        } => {
            let filter = QueryHistoryFilter {
                statuses,
                user_ids,
                warehouse_ids,
                query_start_time_range: start_time_ms.zip(end_time_ms).map(
                    |(start_time_ms, end_time_ms)| TimeRange {
                        start_time_ms,
                        end_time_ms,
                    },
                ),
                include_metrics: Some(!no_metrics),
                max_results,
            };
            let sql = DbsqlHandler::new(&env.workspace_context()?)?;
            let history = sql.list_query_history(&filter).await?;
            output::print_query_history(&history, json)?;
        }
    }

    Ok(ExitCode::Success)
}

/// Options file, then `--option` overrides, then `${VAR}` expansion.
fn load_options(env: &EnvManager, args: &OptionsArgs) -> Result<ConnectorOptions, CliError> {
    let mut raw = match &args.options {
        Some(path) => read_options_file(path)?,
        None => HashMap::new(),
    };
    for entry in &args.overrides {
        let (key, value) = parse_override(entry)?;
        raw.insert(key, value);
    }

    let mut expanded = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let value = env.expand(&value)?;
        info!("Option {} = {}", key, env.display_value(&key, &value));
        expanded.insert(key, value);
    }

    Ok(ConnectorOptions::from_map(&expanded)?)
}

async fn stream(
    options: ConnectorOptions,
    settings: DriverSettings,
    output: Option<String>,
) -> Result<ExitCode, CliError> {
    let source = CustomApiSource::new(options);
    info!("Source '{}' with schema: {}", source.name(), source.schema());
    let reader = source.stream_reader().await?;

    let sink: Box<dyn RowSink> = match output {
        Some(path) => Box::new(JsonLinesSink::new(tokio::fs::File::create(path).await?)),
        None => Box::new(JsonLinesSink::new(tokio::io::stdout())),
    };

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let report = MicroBatchDriver::new(reader, sink, settings, shutdown.cancel_token())
        .run()
        .await?;
    info!("Stream finished: {}", output::stream_summary(&report));

    if report.reason == StopReason::Cancelled || shutdown.is_shutdown_requested() {
        return Ok(ExitCode::ShutdownRequested);
    }
    Ok(ExitCode::Success)
}

async fn show_progress(
    options: &ConnectorOptions,
    reset: Option<u64>,
    as_json: bool,
) -> Result<(), CliError> {
    let client = build_client(&options.http).map_err(|e| CliError::Config(e.to_string()))?;
    let store = open_progress_store(
        &options.progress,
        &client,
        options.token.clone(),
        options.http.retry.clone(),
    )?;
    let service = ProgressService::new(store);

    if let Some(offset) = reset {
        service.reset(offset).await?;
    }

    let status = service.status().await?;
    if as_json {
        output::print_json(&status)?;
    } else {
        output::print_progress_table(&status);
    }
    Ok(())
}

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::cleanup::run_cleanup;
use crate::commands::common::resolve_data_dir;
use crate::commands::completions::run_completions;
use crate::commands::export_config::run_export_config;
use crate::commands::info::run_info;
use crate::commands::media::{run_clear, run_delete, run_get, run_put};
use crate::commands::resolve::run_resolve;
use crate::commands::search::run_search;
use crate::commands::settings::{run_save, run_settings};
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "suiyuan=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);

    match cli.command {
        Commands::Info { json } => run_info(json, &data_dir).await?,
        Commands::Cleanup { keep } => run_cleanup(keep, &data_dir).await?,
        Commands::Put { slot, file, mime } => {
            run_put(slot.into(), &file, mime.as_deref(), &data_dir).await?;
        }
        Commands::Get { slot, output } => {
            run_get(slot.into(), output.as_deref(), &data_dir).await?;
        }
        Commands::Delete { slot } => run_delete(slot.into(), &data_dir).await?,
        Commands::Clear => run_clear(&data_dir).await?,
        Commands::Settings { json } => run_settings(json, &data_dir).await?,
        Commands::Save { file } => run_save(&file, &data_dir).await?,
        Commands::Resolve { background, theme } => {
            run_resolve(background.map(Into::into), theme.into(), &data_dir).await?;
        }
        Commands::ExportConfig { theme, output } => {
            run_export_config(theme.into(), output.as_deref(), &data_dir).await?;
        }
        Commands::Search { engine, query } => run_search(&engine, &query, &data_dir).await?,
        Commands::Watch { interval_ms } => run_watch(interval_ms, &data_dir).await?,
        Commands::Sync => run_sync(&data_dir).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}

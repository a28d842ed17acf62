//! Rack CLI - keep a clothing inventory offline and sync it when connected

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{open_store, resolve_db_path, restore_store, OpenStoreMode};
use crate::commands::completions::run_completions;
use crate::commands::duplicate::run_duplicate;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::remove::run_remove;
use crate::commands::show::run_show;
use crate::commands::sync::{run_pending, run_resolve, run_status, run_sync, session_for};
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
    init_tracing()?;

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path)?;
    let mode = match cli.command {
        Commands::Sync { .. } | Commands::Resolve { .. } => OpenStoreMode::RequireSync,
        _ => OpenStoreMode::Standard,
    };
    let store = open_store(&db_path, mode).await?;
    restore_store(&store).await?;

    match cli.command {
        Commands::Add {
            name,
            fields,
            local_only,
        } => {
            run_add(&name, &fields, local_only, &store).await?;
        }
        Commands::Edit {
            id,
            name,
            fields,
            local_only,
        } => run_edit(&id, name.as_deref(), &fields, local_only, &store).await?,
        Commands::Duplicate { id, local_only } => {
            run_duplicate(&id, local_only, &store).await?;
        }
        Commands::List { limit, json } => run_list(limit, json, &store)?,
        Commands::Show { id, json } => run_show(&id, json, &store)?,
        Commands::Remove { id, local_only } => {
            run_remove(&id, local_only, &store).await?;
        }
        Commands::Sync { json } => {
            let session = session_for(&store)?;
            run_sync(&session, json).await?;
        }
        Commands::Resolve { id, resolution } => {
            let session = session_for(&store)?;
            run_resolve(&id, resolution.into(), &session).await?;
        }
        Commands::Pending { drain } => run_pending(drain, &store).await?,
        Commands::Status => run_status(&store).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn init_tracing() -> Result<(), CliError> {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["rack_core=info", "rack_cli=info"] {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?,
        );
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

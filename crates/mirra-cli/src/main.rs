use std::{env, path::PathBuf, sync::Arc};

use clap::Parser;
use cli::{Args, Commands};
use inspect::{print_log, restore_package, show_package};
use logging::setup_logging;
use miette::IntoDiagnostic;
use mirra_backup::FsBlobStore;
use mirra_config::config::{self, generate_default_config, get_config, Config, CONFIG_PATH};
use mirra_events::{ChannelSink, EventSinkHandle};
use mirra_operations::SyncContext;
use mirra_registry::HttpUpstream;
use mirra_store::FileStore;
use mirra_utils::path::resolve_path;
use progress::{spawn_event_handler, ProgressGuard};
use sync::{sync_packages, sync_users, SyncArgs};
use tracing::{debug, info};

mod cli;
mod inspect;
mod logging;
mod progress;
mod sync;
mod utils;

/// Builds the context for a command. An ephemeral context keeps every store
/// in memory and forgets it on exit.
pub async fn create_context(
    config: Config,
    ephemeral: bool,
) -> miette::Result<(SyncContext, ProgressGuard)> {
    let upstream = Arc::new(
        HttpUpstream::new(&config.upstream_registry, config.request_timeout())?,
    );

    let ctx = if ephemeral {
        debug!("using in-memory stores");
        SyncContext::in_memory(config, upstream)
    } else {
        let data_path = config.get_data_path()?;
        let backup_path = config.get_backup_path()?;
        debug!(
            "data: {}, backup: {}",
            data_path.display(),
            backup_path.display()
        );

        let store = Arc::new(FileStore::open(data_path).await?);
        let blobs = Arc::new(FsBlobStore::open(backup_path).await?);
        SyncContext::new(config, store.clone(), store.clone(), store, blobs, upstream)
    };

    let (sink, receiver) = ChannelSink::new();
    let events: EventSinkHandle = Arc::new(sink);
    let guard = spawn_event_handler(receiver);

    Ok((ctx.with_events(events), guard))
}

fn override_config_path(path: &str) -> miette::Result<()> {
    let path = resolve_path(path).into_diagnostic()?;
    let path = if path.is_absolute() {
        path
    } else {
        env::current_dir().into_diagnostic()?.join(path)
    };
    *CONFIG_PATH
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner) = path;
    Ok(())
}

fn print_config(config: &Config) -> miette::Result<()> {
    let document = config.to_annotated_document()?;
    print!("{document}");
    Ok(())
}

async fn handle_cli() -> miette::Result<bool> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        utils::disable_color();
    }

    if let Some(ref path) = args.config {
        override_config_path(path)?;
    }

    if let Commands::DefConfig = args.command {
        let path: PathBuf = generate_default_config()?;
        info!("Default config written to {}", path.display());
        return Ok(true);
    }

    config::init()?;
    let config = get_config();

    if let Commands::Config = args.command {
        print_config(&config)?;
        return Ok(true);
    }

    let (ctx, guard) = create_context(config, args.ephemeral).await?;

    let outcome = match args.command {
        Commands::Sync {
            names,
            no_dep,
            from_backup,
            log_id,
            username,
        } => {
            sync_packages(
                &ctx,
                names,
                SyncArgs {
                    no_dep,
                    from_backup,
                    log_id,
                    username,
                },
            )
            .await
        }
        Commands::SyncUser { names } => sync_users(&ctx, names).await,
        Commands::Restore { name } => restore_package(&ctx, &name).await.map(|_| true),
        Commands::Show { name, abbreviated } => {
            show_package(&ctx, &name, abbreviated).await.map(|_| true)
        }
        Commands::Log { log_id } => print_log(&ctx, &log_id).await.map(|_| true),
        Commands::Config | Commands::DefConfig => Ok(true),
    };

    // The event thread exits once the last sender is gone.
    drop(ctx);
    guard.finish();

    outcome
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    match handle_cli().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::exit(1);
        }
    }
}

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod cli;
mod command;
mod config;
mod domain;
mod tags;
#[cfg(test)]
mod testing;
mod twitter;
mod upload;

use cli::{Cli, Commands, ConfigAction};
use config::{ConfigOverrides, ConfigStore};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = ConfigStore::new(cli.config_dir.as_deref())?;
    let mut overrides = ConfigOverrides {
        server_url: cli.server.clone(),
        ..ConfigOverrides::default()
    };

    match cli.command {
        Commands::Upload {
            paths,
            quota,
            concurrency,
            md5,
            any_type,
            interactive,
            tags,
            source,
            description,
            date,
        } => {
            overrides.daily_quota = quota;
            overrides.upload_concurrency = concurrency;
            overrides.compute_md5 = md5;
            let config = store.effective(&overrides)?;

            let args = command::UploadArgs {
                paths,
                any_type,
                interactive,
                tags,
                source,
                description,
                date,
            };
            command::run_upload(&config, args).await
        }
        Commands::Suggest {
            text,
            caret,
            pick,
            search,
        } => {
            let config = store.effective(&overrides)?;
            command::run_suggest(&config, text, caret, pick, search).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Twitter { url, tags, open } => {
            let config = store.effective(&overrides)?;
            command::run_twitter(&config, &url, &tags, open).await
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => command::run_config_show(&store, &overrides)?,
                ConfigAction::Init { force } => command::run_config_init(&store, force)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

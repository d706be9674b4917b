mod config;
mod suggest;
mod twitter;
mod upload;

pub use config::{run_config_init, run_config_show};
pub use suggest::run_suggest;
pub use twitter::run_twitter;
pub use upload::{run_upload, UploadArgs};

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::time::Duration;

use crate::api::ApiClient;
use crate::config::ClientConfig;

fn api_client(config: &ClientConfig) -> Result<ApiClient> {
    ApiClient::new(&config.server_url, Duration::from_secs(config.timeout_secs))
        .with_context(|| format!("Invalid server URL: {}", config.server_url))
}

/// Print `label` and read one trimmed line from stdin.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim_end_matches(['\r', '\n']).to_string())
}

fn confirm(label: &str) -> Result<bool> {
    let answer = prompt(label)?.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

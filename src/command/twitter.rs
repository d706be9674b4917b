use anyhow::Result;
use std::process::ExitCode;

use super::api_client;
use crate::config::ClientConfig;
use crate::twitter::{TwitterImport, TwitterImportError};

pub async fn run_twitter(
    config: &ClientConfig,
    url: &str,
    tags: &str,
    open_browser: bool,
) -> Result<ExitCode> {
    let client = api_client(config)?;

    println!("🐦 Importing {}", url.trim());

    match client.upload_from_twitter(url, tags).await {
        Ok(TwitterImport::Created { url }) => {
            let location = client.build_url(&url)?;
            println!("✅ Imported: {}", location);

            if open_browser && open::that(location.as_str()).is_err() {
                println!("⚠️  Could not open browser automatically.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(TwitterImport::Rejected { reason }) => {
            println!("❌ {}", reason);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            if let TwitterImportError::Server(source) = &e {
                tracing::debug!("Import failed: {}", source);
            }
            println!("❌ {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

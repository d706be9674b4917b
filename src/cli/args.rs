use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mediashare-upload - upload videos to a media-sharing server
#[derive(Parser)]
#[command(name = "mediashare-upload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Server base URL
    #[arg(long, global = true, env = "MEDIASHARE_SERVER_URL")]
    pub server: Option<String>,

    /// Directory holding config.json. Defaults to ~/.mediashare
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload video files and publish them with tags
    Upload {
        /// Files or directories to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Uploads left today (0 blocks uploading)
        #[arg(long)]
        quota: Option<u32>,

        /// Maximum number of files uploading at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Send an MD5 checksum with each upload request
        #[arg(long)]
        md5: bool,

        /// Upload files that are not videos
        #[arg(long)]
        any_type: bool,

        /// Prompt for the metadata of each file
        #[arg(short, long)]
        interactive: bool,

        /// Space-separated tags for every file
        #[arg(short, long, default_value = "")]
        tags: String,

        /// Source link for every file
        #[arg(long, default_value = "")]
        source: String,

        /// Description for every file
        #[arg(long, default_value = "")]
        description: String,

        /// Original upload date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show tag suggestions for the token before the caret
    Suggest {
        /// Text of the tag input
        text: String,

        /// Caret position in characters. Defaults to the end of the text
        #[arg(long)]
        caret: Option<usize>,

        /// Insert the suggestion at this position of the list
        #[arg(long)]
        pick: Option<usize>,

        /// Print the search URL for the text instead
        #[arg(long)]
        search: bool,
    },
    /// Import the video of a tweet
    Twitter {
        /// Tweet link
        url: String,

        /// Space-separated tags
        #[arg(short, long, default_value = "")]
        tags: String,

        /// Open the new upload in the browser
        #[arg(long)]
        open: bool,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::process::ExitCode;

use super::suggest::highlight_and_insert;
use super::{api_client, confirm, prompt};
use crate::api::{TagSuggestionSource, UploadBackend};
use crate::cli;
use crate::config::ClientConfig;
use crate::domain::{FileStatus, SelectedFile, UploadMeta};
use crate::tags::SuggestionBox;
use crate::upload::{BatchProgress, PageState, UploadPage};

/// Shown once every file was handed off for publishing.
const DONE_MESSAGE: &str = "Videos are now processing. They should be published shortly.";

const QUOTA_MESSAGE: &str = "You have reached your daily upload limit. Try again tomorrow.";

pub struct UploadArgs {
    pub paths: Vec<PathBuf>,
    pub any_type: bool,
    pub interactive: bool,
    pub tags: String,
    pub source: String,
    pub description: String,
    pub date: Option<NaiveDate>,
}

/// Prints one line per file status change.
struct ConsoleProgress {
    total: usize,
}

impl BatchProgress for ConsoleProgress {
    fn on_status(&self, index: usize, file: &SelectedFile, status: FileStatus) {
        let marker = match status {
            FileStatus::Complete => "✅",
            s if s.is_failure() => "❌",
            _ => "⏳",
        };
        println!(
            "{} [{}/{}] {} {}",
            marker,
            index + 1,
            self.total,
            file.name,
            status
        );
    }
}

pub async fn run_upload(config: &ClientConfig, args: UploadArgs) -> Result<ExitCode> {
    let client = api_client(config)?;
    let mut page = UploadPage::new(
        &client,
        config.daily_quota,
        config.limits(),
        config.resolve_options(),
    );

    if page.state() == &PageState::QuotaExhausted {
        println!("⛔ {}", QUOTA_MESSAGE);
        return Ok(ExitCode::FAILURE);
    }
    if let Some(line) = quota_notice(config.daily_quota) {
        println!("{}", line);
    }

    let mut files = cli::collect_files(&args.paths, args.any_type)?;
    if files.is_empty() {
        println!("No video files to upload. Use --any-type to upload other files.");
        return Ok(ExitCode::FAILURE);
    }

    loop {
        publish_round(&mut page, &client, files, &args).await?;

        match page.state() {
            PageState::Done => {
                println!("✅ {}", DONE_MESSAGE);
                return Ok(ExitCode::SUCCESS);
            }
            PageState::Error { message } => {
                println!("❌ {}", message);
                if args.interactive && confirm("Retry? [y/N]: ")? {
                    files = retry_selection(&mut page)?;
                    continue;
                }
                return Ok(ExitCode::FAILURE);
            }
            state => anyhow::bail!("Unexpected page state after publish: {}", state.name()),
        }
    }
}

fn quota_notice(daily_quota: Option<u32>) -> Option<String> {
    daily_quota.map(|left| format!("Daily uploads left: {}", left))
}

/// Upload `files`, collect their metadata and publish them. Leaves the page
/// in `Done` or `Error`.
async fn publish_round<B, S>(
    page: &mut UploadPage<'_, B>,
    source: &S,
    files: Vec<SelectedFile>,
    args: &UploadArgs,
) -> Result<()>
where
    B: UploadBackend,
    S: TagSuggestionSource,
{
    let progress = ConsoleProgress { total: files.len() };
    println!("📤 Uploading {} file(s)...\n", files.len());

    let outcome = page.upload(files, &progress).await?;
    println!(
        "\n{} uploaded, {} failed",
        outcome.completed,
        outcome.failed()
    );

    edit_metadata(page, source, args).await?;

    println!("\n📢 Publishing...");
    let finalized = page.publish().await?;
    for (index, error) in &finalized.failed {
        let name = &page.batch().entries()[*index].file.name;
        println!("❌ {}: {}", name, error);
    }

    Ok(())
}

/// Files to send again after an error, then back to `Upload`. Files that
/// were already published are left out.
fn retry_selection<B>(page: &mut UploadPage<'_, B>) -> Result<Vec<SelectedFile>>
where
    B: UploadBackend,
{
    let files = page.batch().unpublished_files();
    let published = page.batch().len() - files.len();
    if published > 0 {
        println!("Skipping {} file(s) that were already published.", published);
    }

    page.reset()?;
    Ok(files)
}

/// Fill in the metadata of every file, either from the flags or by asking.
async fn edit_metadata<B, S>(
    page: &mut UploadPage<'_, B>,
    source: &S,
    args: &UploadArgs,
) -> Result<()>
where
    B: UploadBackend,
    S: TagSuggestionSource,
{
    let defaults = UploadMeta {
        tags: args.tags.clone(),
        source: args.source.clone(),
        description: args.description.clone(),
        original_upload_date: args.date,
        ..UploadMeta::default()
    };

    for index in 0..page.batch().len() {
        let entry = &page.batch().entries()[index];
        let meta = if args.interactive && entry.meta.status == FileStatus::Complete {
            println!("\n📝 {}", entry.file.name);
            ask_metadata(source, &defaults).await?
        } else {
            defaults.clone()
        };

        page.edit(index, |m| {
            m.tags = meta.tags;
            m.source = meta.source;
            m.description = meta.description;
            m.original_upload_date = meta.original_upload_date;
        })?;
    }

    Ok(())
}

async fn ask_metadata<S>(suggestions: &S, defaults: &UploadMeta) -> Result<UploadMeta>
where
    S: TagSuggestionSource,
{
    let tags = ask_tags(suggestions, &defaults.tags).await?;
    let source = ask_or(&format!("Source [{}]: ", defaults.source), &defaults.source)?;
    let description = ask_or(
        &format!("Description [{}]: ", defaults.description),
        &defaults.description,
    )?;

    let date_default = defaults
        .original_upload_date
        .map(|d| d.to_string())
        .unwrap_or_default();
    let original_upload_date = loop {
        let raw = ask_or(
            &format!("Original upload date, YYYY-MM-DD [{}]: ", date_default),
            &date_default,
        )?;
        if raw.trim().is_empty() {
            break None;
        }
        match raw.trim().parse::<NaiveDate>() {
            Ok(date) => break Some(date),
            Err(e) => println!("⚠️  {}", e),
        }
    };

    Ok(UploadMeta {
        tags,
        source,
        description,
        original_upload_date,
        ..UploadMeta::default()
    })
}

/// Tag prompt. A line ending in `?` lists suggestions for the token before
/// it; an empty line accepts the current value.
async fn ask_tags<S>(suggestions: &S, initial: &str) -> Result<String>
where
    S: TagSuggestionSource,
{
    let mut input = SuggestionBox::new(initial);

    loop {
        let line = prompt(&format!("Tags [{}] (end with ? for suggestions): ", input.text()))?;

        let Some(partial) = line.strip_suffix('?') else {
            if !line.trim().is_empty() {
                let caret = line.chars().count();
                input.set_input(line, caret);
            }
            return Ok(input.text().to_string());
        };

        let caret = partial.chars().count();
        input.on_change(suggestions, partial, caret).await;

        if input.suggestions().is_empty() {
            println!("   No suggestions.");
            continue;
        }
        for (i, tag) in input.suggestions().iter().enumerate() {
            println!("  {:>2}) {} ({})", i + 1, tag.name, tag.upload_count);
        }

        let choice = prompt("Pick a number, or Enter to skip: ")?;
        let picked = choice
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=input.suggestions().len()).contains(n));
        match picked {
            Some(n) => {
                highlight_and_insert(&mut input, n - 1);
            }
            None if choice.trim().is_empty() => {}
            None => println!("⚠️  Not a suggestion number: {}", choice.trim()),
        }
    }
}

fn ask_or(label: &str, default: &str) -> Result<String> {
    let answer = prompt(label).context("Failed to read answer")?;
    if answer.trim().is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.trim().to_string())
    }
}

// UI layer: confirmation prompt, progress bar and the final summary.
// The synchronizer does the work; these functions only decide what the
// user sees on stdout while it runs.

use std::io::IsTerminal;

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use crate::assets::AssetRecord;
use crate::config::Settings;
use crate::store::ContentStore;
use crate::sync::{
    RunSummary, Synchronizer, UpsertAction, UpsertOutcome, EXIT_PRECONDITION, EXIT_PUBLISHED,
};

/// Options for [`publish`] coming from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
    pub dry_run: bool,
}

/// Ask before writing. Non-interactive sessions proceed without asking.
pub fn confirm_publish(settings: &Settings, count: usize) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(true);
    }
    let prompt = format!(
        "Publish {count} file(s) to {}@{} under {}/?",
        settings.credentials.slug(),
        settings.credentials.branch,
        settings.remote_dir
    );
    Ok(Confirm::new().with_prompt(prompt).default(true).interact()?)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// One line per file, e.g. `+ assets/images/a.jpg (created, 3f2a...)`.
pub fn outcome_line(outcome: &UpsertOutcome, dry_run: bool) -> String {
    let verb = match (outcome.action, dry_run) {
        (Some(UpsertAction::Create), false) => "created",
        (Some(UpsertAction::Update), false) => "updated",
        (Some(UpsertAction::Create), true) => "would create",
        (Some(UpsertAction::Update), true) => "would update",
        (None, _) => "probe failed",
    };
    match &outcome.result {
        Ok(Some(version)) => format!("{} {} ({verb}, {version})", "+".green(), outcome.path),
        Ok(None) => format!("{} {} ({verb})", "~".cyan(), outcome.path),
        Err(err) => format!("{} {} ({verb}: {err})", "x".red(), outcome.path),
    }
}

/// Human-readable summary written after the run.
pub fn print_summary(summary: &RunSummary, settings: &Settings) {
    let total = summary.outcomes.len();
    let prefix = if summary.dry_run { "[dry-run] " } else { "" };
    println!();
    println!(
        "{prefix}Succeeded: {}/{total}",
        summary.succeeded().to_string().green()
    );

    let failures = summary.failures();
    if !failures.is_empty() {
        println!("{prefix}Failed: {}", failures.len().to_string().red());
        for (path, err) in failures {
            println!("  - {path}: {err}");
        }
    }

    if summary.dry_run {
        return;
    }
    if summary.is_success() {
        println!(
            "Published to {}",
            settings.credentials.tree_url(&settings.remote_dir)
        );
    } else {
        println!("{}", "All uploads failed".red());
    }
}

/// Confirm, run with a progress bar, then print the summary. Returns
/// `None` when the user declined.
pub fn publish<S: ContentStore>(
    sync: &Synchronizer<S>,
    assets: Vec<AssetRecord>,
    settings: &Settings,
    opts: PublishOptions,
) -> Result<Option<RunSummary>> {
    println!(
        "Repository: {}  branch: {}",
        settings.credentials.slug(),
        settings.credentials.branch
    );
    println!("Found {} image file(s)", assets.len());

    if !opts.dry_run && !opts.assume_yes && !confirm_publish(settings, assets.len())? {
        println!("Aborted, nothing was published.");
        return Ok(None);
    }

    let pb = progress_bar(assets.len());
    let summary = sync.run_with(assets, |outcome| {
        pb.println(outcome_line(outcome, opts.dry_run));
        pb.inc(1);
    })?;
    pb.finish_and_clear();

    print_summary(&summary, settings);
    Ok(Some(summary))
}

/// Process exit code for a finished command. Errors that stop a run
/// before any file is attempted (configuration, preconditions) map to
/// [`EXIT_PRECONDITION`]; a declined or non-publishing command is
/// [`EXIT_PUBLISHED`].
pub fn exit_code(result: &Result<Option<RunSummary>>) -> u8 {
    match result {
        Ok(Some(summary)) => summary.exit_code(),
        Ok(None) => EXIT_PUBLISHED,
        Err(_) => EXIT_PRECONDITION,
    }
}

/// Output of `asset-publish check`.
pub fn print_check(settings: &Settings) {
    let creds = &settings.credentials;
    println!("API:        {}", creds.api_base);
    println!("Repository: {}", creds.slug());
    println!("Branch:     {}", creds.branch);
    println!("Remote dir: {}", settings.remote_dir);
    if creds.token.is_empty() {
        println!("Token:      {}", "(not set)".red());
    } else {
        println!("Token:      {}", creds.masked_token());
        if creds.looks_like_placeholder() {
            println!(
                "{}",
                "Token looks too short to be real; generate a new one with repo scope.".yellow()
            );
        }
    }
}

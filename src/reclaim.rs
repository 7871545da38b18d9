//! Reporting unused assets and deleting them on the operator's say-so.

use crate::errors::SweepError;
use crate::store::{Asset, AssetStore};

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use std::io::Write;
use tracing::{error, info};

/// What the operator wants done with the unused assets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    DeleteAll,
    ChooseEach,
    DoNothing,
}

impl Choice {
    /// Menu order; the first entry is the default
    pub const ALL: [Choice; 3] = [Choice::DeleteAll, Choice::ChooseEach, Choice::DoNothing];

    pub fn label(self) -> &'static str {
        match self {
            Choice::DeleteAll => "Delete all",
            Choice::ChooseEach => "Choose what to delete",
            Choice::DoNothing => "Don't do anything",
        }
    }
}

/// Interactive operator input
pub trait Prompter {
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<usize, SweepError>;
    fn confirm(&mut self, prompt: &str) -> Result<bool, SweepError>;
}

/// Terminal prompts backed by dialoguer
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<usize, SweepError> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
            .map_err(|e| SweepError::Prompt {
                reason: e.to_string(),
            })
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, SweepError> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| SweepError::Prompt {
                reason: e.to_string(),
            })
    }
}

/// Format a byte count as megabytes with two decimals
pub fn readable_filesize(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

fn plural(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

/// Summary line for a set of unused assets, sizes summed before formatting
pub fn summary_line(assets: &[Asset]) -> String {
    let total: u64 = assets.iter().map(|a| a.size).sum();
    format!(
        "Found {} unused {}, taking up {} of storage.",
        assets.len(),
        plural("asset", assets.len()),
        readable_filesize(total)
    )
}

/// Two-column table of asset paths and sizes
pub fn render_table(assets: &[Asset]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Asset", "Size"]);

    for asset in assets {
        table.add_row(vec![asset.path.clone(), readable_filesize(asset.size)]);
    }
    table
}

/// Result of a reclaim run
#[derive(Debug, Default)]
pub struct ReclaimOutcome {
    /// None when nothing was offered (empty set or dry run)
    pub choice: Option<Choice>,
    pub removed: Vec<Asset>,
    pub failed: Vec<(Asset, String)>,
}

impl ReclaimOutcome {
    pub fn freed_bytes(&self) -> u64 {
        self.removed.iter().map(|a| a.size).sum()
    }
}

/// Drives the report, the operator prompt and the deletion loop
pub struct Reclaimer<'a, W: Write> {
    store: &'a dyn AssetStore,
    prompter: &'a mut dyn Prompter,
    out: W,
    dry_run: bool,
}

impl<'a, W: Write> Reclaimer<'a, W> {
    pub fn new(store: &'a dyn AssetStore, prompter: &'a mut dyn Prompter, out: W) -> Self {
        Self {
            store,
            prompter,
            out,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: impl std::fmt::Display) -> Result<(), SweepError> {
        writeln!(self.out, "{line}").map_err(|source| SweepError::Output { source })
    }

    pub fn run(&mut self, unused: &[Asset]) -> Result<ReclaimOutcome, SweepError> {
        let mut outcome = ReclaimOutcome::default();

        if unused.is_empty() {
            self.write_line("No unused assets found.".green())?;
            info!(event = "reclaim.nothing_to_do");
            return Ok(outcome);
        }

        let table = render_table(unused);
        self.write_line(table)?;
        self.write_line(summary_line(unused).yellow())?;

        if self.dry_run {
            self.write_line("Dry run mode: No files were deleted.")?;
            return Ok(outcome);
        }

        let labels: Vec<&str> = Choice::ALL.iter().map(|c| c.label()).collect();
        let index = self
            .prompter
            .select("What would you like to do?", &labels, 0)?;
        let choice = Choice::ALL.get(index).copied().unwrap_or(Choice::DoNothing);
        outcome.choice = Some(choice);
        info!(event = "reclaim.choice_made", choice = choice.label());

        match choice {
            Choice::DeleteAll => {
                for asset in unused {
                    self.remove(asset, &mut outcome)?;
                }
            }
            Choice::ChooseEach => {
                for asset in unused {
                    let prompt = format!("Delete \"{}\" ?", asset.path);
                    if self.prompter.confirm(&prompt)? {
                        self.remove(asset, &mut outcome)?;
                    }
                }
            }
            Choice::DoNothing => {}
        }

        if !outcome.removed.is_empty() {
            let freed = format!("Freed {}.", readable_filesize(outcome.freed_bytes()));
            self.write_line(freed.bold())?;
        }
        if !outcome.failed.is_empty() {
            let count = outcome.failed.len();
            let message = format!("{} {} could not be deleted.", count, plural("asset", count));
            eprintln!("{}", message.red());
        }

        Ok(outcome)
    }

    fn remove(&mut self, asset: &Asset, outcome: &mut ReclaimOutcome) -> Result<(), SweepError> {
        self.write_line(format!("Removing {}", asset.path))?;
        match self.store.delete(asset) {
            Ok(()) => {
                info!(event = "reclaim.asset_removed", path = %asset.path, size = asset.size);
                outcome.removed.push(asset.clone());
            }
            Err(err) if err.is_recoverable() => {
                error!(event = "reclaim.asset_remove_failed", path = %asset.path, error = %err);
                eprintln!("Error removing {}: {}. Skipping.", asset.path, err);
                outcome.failed.push((asset.clone(), err.to_string()));
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

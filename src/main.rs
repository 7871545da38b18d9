use anyhow::{Context, Result};
use assetsweep::{
    AssetStore, Config, EntryStore, FsAssetStore, FsContentSource, JsonEntryStore,
    ReadFailurePolicy, Reclaimer, ReferenceScanner, TerminalPrompter,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Find site assets that no content references and delete them",
    long_about = None
)]
struct Args {
    /// Site root that relative paths are resolved against
    #[arg(long, global = true, default_value = ".")]
    base_path: PathBuf,

    /// Settings file (defaults to <base-path>/assetsweep.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print the report but don't prompt or delete anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Keep assets as deletion candidates even if some content could not be read
    #[arg(long, global = true)]
    ignore_read_errors: bool,

    /// Public URL of the site logo; never deleted
    #[arg(long, global = true, env = "ASSETS_CUSTOM_LOGO_URL", hide_env_values = true)]
    logo_url: Option<String>,

    /// Public URL of the site favicon; never deleted
    #[arg(long, global = true, env = "ASSETS_CUSTOM_FAVICON_URL", hide_env_values = true)]
    favicon_url: Option<String>,

    /// Logo URL as set by existing Statamic sites
    #[arg(long, global = true, hide = true, env = "STATAMIC_CUSTOM_LOGO_URL")]
    statamic_logo_url: Option<String>,

    /// Favicon URL as set by existing Statamic sites
    #[arg(long, global = true, hide = true, env = "STATAMIC_CUSTOM_FAVICON_URL")]
    statamic_favicon_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete unused assets
    Clear,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "assetsweep=debug"
    } else {
        "assetsweep=warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn clear_assets(args: &Args) -> Result<()> {
    let base = &args.base_path;
    let config = Config::load(base, args.config.as_deref())
        .context("Failed to load settings")?
        .with_protected_urls([
            args.logo_url.clone(),
            args.favicon_url.clone(),
            args.statamic_logo_url.clone(),
            args.statamic_favicon_url.clone(),
        ]);
    debug!(event = "cli.config_loaded", config = ?config);

    let store = FsAssetStore::new(config.containers(base));
    let content = FsContentSource::new(config.content_root(base));
    let entries = config.entries_root(base).map(JsonEntryStore::new);

    let assets = store.list_all().context("Failed to list assets")?;

    let policy = if args.ignore_read_errors {
        ReadFailurePolicy::Ignore
    } else {
        ReadFailurePolicy::KeepAll
    };
    let scanner = ReferenceScanner::new(
        &content,
        entries.as_ref().map(|e| e as &dyn EntryStore),
        config.protection(),
    )
    .with_policy(policy)
    .with_progress(std::io::stderr().is_terminal());
    let report = scanner.filter_unused(assets);

    if !report.failures.is_empty() {
        eprintln!(
            "{}",
            format!(
                "Warning: {} content source(s) could not be read.",
                report.failures.len()
            )
            .yellow()
        );
        for failure in &report.failures {
            eprintln!("  - {} ({})", failure.source, failure.reason);
        }
        if report.withheld > 0 {
            eprintln!(
                "  {} asset(s) kept because their use could not be ruled out. Use --ignore-read-errors to list them anyway.",
                report.withheld
            );
        }
    }

    let mut prompter = TerminalPrompter::new();
    let mut reclaimer =
        Reclaimer::new(&store, &mut prompter, std::io::stdout().lock()).dry_run(args.dry_run);
    let outcome = reclaimer.run(&report.unused)?;

    info!(
        event = "cli.clear_completed",
        removed = outcome.removed.len(),
        failed = outcome.failed.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Clear => clear_assets(&args)?,
    }

    Ok(())
}

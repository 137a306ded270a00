use anyhow::Context;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use blockmerge_core::config::{Settings, DEFAULT_CONFIG_FILE};
use blockmerge_core::logging::init_logging;
use blockmerge_engine::{run_merge, MergeReport};

#[derive(Parser)]
#[command(
    name = "blockmerge",
    about = "Merge the blocks of several VEXcode projects into one project file"
)]
struct Cli {
    /// Folder searched recursively for module projects
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Folder containing the project to merge into
    #[arg(long)]
    merge_dir: Option<PathBuf>,

    /// Number of backups kept in PreviousVersions
    #[arg(long)]
    max_backups: Option<usize>,

    /// Settings file (missing file means defaults)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Exit without waiting for Enter
    #[arg(long)]
    no_pause: bool,

    /// Report what would change without backing up or writing
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load_or_default(&self.config)
            .with_context(|| format!("loading settings from {}", self.config.display()))?;
        if let Some(dir) = &self.modules_dir {
            settings.modules_dir = dir.clone();
        }
        if let Some(dir) = &self.merge_dir {
            settings.merge_dir = dir.clone();
        }
        if let Some(n) = self.max_backups {
            settings.max_backups = n;
        }
        if self.no_pause {
            settings.pause_on_exit = false;
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    let guard = init_logging(settings.log_dir.as_deref())?;

    let succeeded = match run_merge(&settings, cli.dry_run) {
        Ok(report) => {
            print_summary(&report);
            println!("Complete!");
            true
        }
        Err(e) => {
            tracing::error!("Merge aborted: {}", e);
            false
        }
    };

    if settings.pause_on_exit && std::io::stdin().is_terminal() {
        wait_for_enter()?;
    }

    if !succeeded {
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(report: &MergeReport) {
    println!();
    println!("Merge summary");
    println!("=============");
    println!("  Destination: {}", report.destination.display());
    println!("  Module files: {}", report.sources.len());
    for source in &report.sources {
        println!("    {} ({} blocks)", source.path.display(), source.blocks);
    }
    println!("  Replaced: {}", report.removed.len());
    println!("  Inserted: {}", report.inserted.len());
    if !report.dropped.is_empty() {
        println!("  Dropped duplicates: {:?}", report.dropped);
    }
    if let Some(backup) = &report.backup {
        println!("  Backup: {}", backup.display());
    }
    if !report.written {
        println!("  (dry run, destination not written)");
    }
    println!();
}

fn wait_for_enter() -> anyhow::Result<()> {
    dialoguer::Input::<String>::new()
        .with_prompt("Press Enter to exit")
        .allow_empty(true)
        .interact_text()?;
    Ok(())
}

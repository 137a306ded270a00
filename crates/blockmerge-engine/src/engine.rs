//! Merge orchestration: scan the module folder, gather the source set, and
//! reconcile it into the destination project.
//!
//! Every read happens before the single write of the destination, so any
//! error leaves the destination untouched.

use std::path::{Path, PathBuf};

use blockmerge_core::{
    first_project_file, scan_project_files, snapshot_and_prune, Error, Platform, Result, Settings,
};

use crate::block::Block;
use crate::codec;
use crate::identity;
use crate::markup::Workspace;
use crate::reconcile::reconcile;

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Reconcile and report, but do not write the destination.
    pub dry_run: bool,
}

/// Blocks contributed by one module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub path: PathBuf,
    pub blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub destination: PathBuf,
    pub platform: Option<Platform>,
    pub sources: Vec<SourceSummary>,
    /// Destination block ids replaced by incoming blocks.
    pub removed: Vec<String>,
    pub inserted: Vec<String>,
    /// Incoming block ids skipped because an earlier module already supplied them.
    pub dropped: Vec<String>,
    pub written: bool,
    /// Snapshot of the destination taken before the merge.
    pub backup: Option<PathBuf>,
}

pub struct MergeEngine {
    options: MergeOptions,
}

impl MergeEngine {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    /// Merge every module project under `modules_dir` into `destination`.
    ///
    /// The destination's extension, when recognized, decides which product
    /// variant is collected from the module folder.
    pub fn merge(&self, modules_dir: &Path, destination: &Path) -> Result<MergeReport> {
        let lock = Platform::from_path(destination);
        let scan = scan_project_files(modules_dir, lock)?;

        let mut source_set: Vec<Block> = Vec::new();
        let mut sources = Vec::with_capacity(scan.files.len());
        for path in &scan.files {
            let workspace = load_workspace(path)?;
            let blocks: Vec<Block> = workspace.blocks().cloned().collect();
            tracing::info!(
                "Found {} block element{} from: {}",
                blocks.len(),
                if blocks.len() == 1 { "" } else { "s" },
                path.display()
            );
            sources.push(SourceSummary {
                path: path.clone(),
                blocks: blocks.len(),
            });
            source_set.extend(blocks);
        }

        let target = load_workspace(destination)?;
        let baseline: Vec<Block> = target.blocks().cloned().collect();
        let outcome = reconcile(&baseline, &source_set).map_err(|e| e.at(destination))?;

        let removed: Vec<String> = outcome
            .superseded
            .iter()
            .filter_map(|&position| baseline[position].attribute(identity::ID_ATTRIBUTE))
            .map(str::to_owned)
            .collect();
        for id in &removed {
            tracing::info!("Removing outdated block: id=\"{}\"", id);
        }
        let inserted: Vec<String> = outcome
            .appended_ids()
            .into_iter()
            .map(str::to_owned)
            .collect();
        for id in &inserted {
            tracing::info!("Inserting block: id=\"{}\"", id);
        }
        let dropped: Vec<String> = outcome
            .dropped_ids()
            .into_iter()
            .map(str::to_owned)
            .collect();
        for id in &dropped {
            tracing::warn!("Omitted adding a duplicate block! Block id: \"{}\"", id);
        }

        let written = if self.options.dry_run {
            tracing::info!("Dry run: {} left unchanged", destination.display());
            false
        } else {
            let merged = target.rebuild(&outcome);
            codec::write_container(destination, &merged.to_markup())?;
            true
        };

        Ok(MergeReport {
            destination: destination.to_path_buf(),
            platform: scan.platform,
            sources,
            removed,
            inserted,
            dropped,
            written,
            backup: None,
        })
    }
}

/// One full run: locate the destination in the merge folder, snapshot it
/// (skipped on a dry run), then merge the module folder into it.
///
/// The snapshot is kept even when the merge itself fails.
pub fn run_merge(settings: &Settings, dry_run: bool) -> Result<MergeReport> {
    let (destination, platform) = first_project_file(&settings.merge_dir)?.ok_or_else(|| {
        Error::io(
            &settings.merge_dir,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no .v5blocks or .iqblocks project found",
            ),
        )
    })?;
    tracing::info!(
        "Merging into {} ({} projects)",
        destination.display(),
        platform
    );

    let backup = if dry_run {
        tracing::info!("Dry run: skipping backup");
        None
    } else {
        Some(snapshot_and_prune(&destination, settings.max_backups)?.created)
    };

    let engine = MergeEngine::new(MergeOptions { dry_run });
    let mut report = engine.merge(&settings.modules_dir, &destination)?;
    report.backup = backup;
    Ok(report)
}

/// Read and parse a project's workspace, checking every block has an id.
pub fn load_workspace(path: &Path) -> Result<Workspace> {
    let payload = codec::read_payload(path)?;
    let workspace = Workspace::parse(&payload).map_err(|e| e.at(path))?;
    let blocks: Vec<Block> = workspace.blocks().cloned().collect();
    identity::require_identities(&blocks).map_err(|e| e.at(path))?;
    Ok(workspace)
}

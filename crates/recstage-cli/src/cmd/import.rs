//! `recstage import` - store harvested payload files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;

use recstage_core::{SharedProgress, fmt_num, is_shutdown_requested};
use recstage_ingest::IngestionPipeline;

use super::Staging;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Source id from [sources]
    #[arg(short, long)]
    pub source: String,

    /// OAI identifier (default: file stem); only with a single input
    #[arg(long)]
    pub oai_id: Option<String>,

    /// Treat the inputs as deletion notifications
    #[arg(long)]
    pub deleted: bool,

    /// Payload files or glob patterns
    #[arg(required = true)]
    pub inputs: Vec<String>,
}

/// Outcome of importing a list of payload files.
#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub records: usize,
    pub failed: usize,
    pub interrupted: bool,
}

pub fn run(args: ImportArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let files = expand_inputs(&args.inputs)?;
    if args.oai_id.is_some() && files.len() > 1 {
        bail!("--oai-id needs exactly one input file, got {}", files.len());
    }

    let staging = Staging::open(config)?;
    staging.sources.get(&args.source)?;
    let pipeline = staging.pipeline().mark_seen(config.ingest.mark_seen);

    let stats = import_files(
        &pipeline,
        &args.source,
        &files,
        args.oai_id.as_deref(),
        args.deleted,
        progress,
    )?;

    let mut table = super::table(&["Source", "Files", "Records", "Failed", "Queued for dedup"]);
    table.add_row(vec![
        args.source.clone(),
        fmt_num(stats.files),
        fmt_num(stats.records),
        fmt_num(stats.failed),
        fmt_num(staging.dedup.queued()),
    ]);
    eprintln!("\n{table}");
    if stats.interrupted {
        eprintln!("Interrupted: {} of {} files processed.", stats.files, files.len());
    }
    Ok(())
}

/// Run `store_record` once per file.
///
/// Failures local to one file are logged and counted; anything else stops
/// the import. Stops early when shutdown was requested.
pub fn import_files(
    pipeline: &IngestionPipeline<'_>,
    source_id: &str,
    files: &[PathBuf],
    oai_id: Option<&str>,
    deleted: bool,
    progress: &SharedProgress,
) -> Result<ImportStats> {
    let pb = progress.unit_bar(source_id, files.len() as u64);
    let mut stats = ImportStats::default();

    for path in files {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping import");
            stats.interrupted = true;
            break;
        }
        pb.set_message(file_label(path));

        let payload =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let oai = oai_id.map(str::to_string).unwrap_or_else(|| file_label(path));

        match pipeline.store_record(source_id, &oai, deleted, &payload) {
            Ok(n) => {
                log::debug!("{}: {n} record(s)", path.display());
                stats.records += n;
            }
            Err(e) if e.is_unit_local() => {
                log::warn!("{}: {e}", path.display());
                stats.failed += 1;
            }
            Err(e) => {
                pb.abandon();
                return Err(e).with_context(|| format!("Failed to import {}", path.display()));
            }
        }
        stats.files += 1;
        pb.inc(1);
    }

    pb.finish_and_clear();
    log::info!(
        "{source_id}: {} files, {} records, {} failed",
        fmt_num(stats.files),
        fmt_num(stats.records),
        fmt_num(stats.failed)
    );
    Ok(stats)
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Expand glob patterns into a sorted, duplicate-free file list.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let matched: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("Invalid glob pattern: {pattern}"))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if matched.is_empty() {
            bail!("No files match {pattern}");
        }
        files.extend(matched);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

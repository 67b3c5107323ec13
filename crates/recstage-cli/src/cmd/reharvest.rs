//! `recstage reharvest` - full reharvest of one source

use anyhow::Result;
use clap::Args;

use recstage_core::{SharedProgress, fmt_num};

use super::Staging;
use super::import::{expand_inputs, import_files};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ReharvestArgs {
    /// Source id from [sources]
    #[arg(short, long)]
    pub source: String,

    /// Payload files or glob patterns making up the complete harvest
    #[arg(required = true)]
    pub inputs: Vec<String>,
}

pub fn run(args: ReharvestArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let files = expand_inputs(&args.inputs)?;
    let staging = Staging::open(config)?;
    let pipeline = staging.pipeline().mark_seen(true);

    let reset = pipeline.reset_marks(&args.source)?;
    log::info!("{}: cleared {} marks", args.source, fmt_num(reset));

    let stats = import_files(&pipeline, &args.source, &files, None, false, progress)?;

    // an incomplete pass must not retire records it simply did not reach
    let retired = if stats.interrupted || stats.failed > 0 {
        log::warn!(
            "{}: reharvest incomplete, keeping records that were not seen",
            args.source
        );
        None
    } else {
        Some(pipeline.retire_unmarked(&args.source)?)
    };

    let mut table = super::table(&["Source", "Files", "Records", "Failed", "Retired"]);
    table.add_row(vec![
        args.source.clone(),
        fmt_num(stats.files),
        fmt_num(stats.records),
        fmt_num(stats.failed),
        retired.map_or_else(|| "skipped".to_string(), fmt_num),
    ]);
    eprintln!("\n{table}");
    Ok(())
}

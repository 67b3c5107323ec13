//! `recstage delete` - retire records by OAI identifier

use anyhow::Result;
use clap::Args;

use super::Staging;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Source id from [sources]
    #[arg(short, long)]
    pub source: String,

    /// OAI identifier the records were harvested under
    pub oai_id: String,
}

pub fn run(args: DeleteArgs, config: &Config) -> Result<()> {
    let staging = Staging::open(config)?;
    staging.sources.get(&args.source)?;

    let n = staging
        .pipeline()
        .delete_by_oai_id(&args.source, &args.oai_id)?;
    eprintln!("Retired {n} record(s) for {} in {}", args.oai_id, args.source);
    Ok(())
}

//! `recstage show` - print one stored record

use anyhow::{Result, bail};
use clap::Args;

use recstage_core::RecordStore;

use super::Staging;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Global record id (`prefix.localid`)
    pub id: String,
}

pub fn run(args: ShowArgs, config: &Config) -> Result<()> {
    let staging = Staging::open(config)?;
    let Some(record) = staging.store.get_by_id(&args.id)? else {
        bail!("record not found: {}", args.id);
    };
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

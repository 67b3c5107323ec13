//! `recstage sources` - configured sources and host linkage

use anyhow::Result;
use comfy_table::{Cell, Color};

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let sources = config.data_sources()?;
    if sources.is_empty() {
        eprintln!("No sources configured.");
        return Ok(());
    }

    let mut table = super::table(&[
        "Source",
        "Institution",
        "Format",
        "Prefix",
        "Dedup",
        "Splitter",
        "Transform",
        "Host sources",
    ]);
    for s in sources.iter() {
        let dedup = if s.dedup {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&s.source_id),
            Cell::new(&s.institution),
            Cell::new(&s.format),
            Cell::new(&s.id_prefix),
            dedup,
            Cell::new(s.record_splitter.as_deref().unwrap_or("-")),
            Cell::new(s.pre_transformation.as_deref().unwrap_or("-")),
            Cell::new(s.linked_host_sources().join(", ")),
        ]);
    }

    eprintln!("\n{table}");
    eprintln!("{} sources total", sources.len());
    Ok(())
}

//! Subcommands and the wiring they share

pub mod delete;
pub mod import;
pub mod reharvest;
pub mod show;
pub mod sources;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use recstage_core::DataSources;
use recstage_formats::{FormatRegistry, SplitterRegistry, TransformRegistry};
use recstage_ingest::{IngestionPipeline, QueueingDedupHandler};
use recstage_store::DuckDbStore;

use crate::config::Config;

/// Store, format registries and dedup hook for one invocation.
pub struct Staging {
    pub store: DuckDbStore,
    pub sources: DataSources,
    pub dedup: QueueingDedupHandler,
    formats: FormatRegistry,
    splitters: SplitterRegistry,
    transforms: TransformRegistry,
}

impl Staging {
    pub fn open(config: &Config) -> Result<Self> {
        let sources = config.data_sources()?;
        let store = DuckDbStore::open(&config.store.path)
            .with_context(|| format!("Failed to open store {}", config.store.path.display()))?;
        log::debug!("Opened store {}", config.store.path.display());
        Ok(Self {
            store,
            sources,
            dedup: QueueingDedupHandler::new(),
            formats: FormatRegistry::new(),
            splitters: SplitterRegistry::new(),
            transforms: TransformRegistry::new(),
        })
    }

    pub fn pipeline(&self) -> IngestionPipeline<'_> {
        IngestionPipeline::new(&self.store, &self.formats, &self.sources)
            .with_splitters(&self.splitters)
            .with_transforms(&self.transforms)
            .with_dedup_handler(&self.dedup)
    }
}

/// Table with the shared preset and cyan headers.
pub fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

//! Data source settings and cross-collection host linkage

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{IngestError, Result};

/// Per-source configuration as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub institution: Option<String>,
    pub format: Option<String>,
    /// Prefix for stored ids; defaults to the source id.
    pub id_prefix: Option<String>,
    pub dedup: bool,
    pub keep_missing_hierarchy_members: bool,
    /// Sources whose records are component parts of this source's records.
    pub component_part_sources: Vec<String>,
    pub record_splitter: Option<String>,
    pub pre_transformation: Option<String>,
}

/// Validated settings for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceSettings {
    pub source_id: String,
    pub institution: String,
    pub format: String,
    pub id_prefix: String,
    pub dedup: bool,
    pub keep_missing_hierarchy_members: bool,
    pub record_splitter: Option<String>,
    pub pre_transformation: Option<String>,
    /// Sources that list this one in `component_part_sources`.
    pub host_record_sources: Vec<String>,
}

impl DataSourceSettings {
    /// Sources to search for host records of this source's component parts.
    ///
    /// Falls back to the source itself when no cross-source linkage exists.
    pub fn linked_host_sources(&self) -> Vec<String> {
        if self.host_record_sources.is_empty() {
            vec![self.source_id.clone()]
        } else {
            self.host_record_sources.clone()
        }
    }

    /// Global record id for a local id.
    pub fn record_id(&self, local_id: &str) -> String {
        format!("{}.{local_id}", self.id_prefix)
    }
}

/// All configured sources, keyed by source id.
#[derive(Debug, Clone, Default)]
pub struct DataSources {
    sources: BTreeMap<String, DataSourceSettings>,
}

impl DataSources {
    /// Validate raw configs and resolve host linkage between sources.
    pub fn resolve(configs: &BTreeMap<String, DataSourceConfig>) -> Result<Self> {
        let mut sources = BTreeMap::new();
        for (source_id, cfg) in configs {
            let institution = required(source_id, "institution", cfg.institution.as_deref())?;
            let format = required(source_id, "format", cfg.format.as_deref())?;
            let id_prefix = cfg
                .id_prefix
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| source_id.clone());
            sources.insert(
                source_id.clone(),
                DataSourceSettings {
                    source_id: source_id.clone(),
                    institution,
                    format,
                    id_prefix,
                    dedup: cfg.dedup,
                    keep_missing_hierarchy_members: cfg.keep_missing_hierarchy_members,
                    record_splitter: cfg.record_splitter.clone(),
                    pre_transformation: cfg.pre_transformation.clone(),
                    host_record_sources: Vec::new(),
                },
            );
        }

        check_prefixes(&sources)?;

        for (host_source, cfg) in configs {
            for component_source in &cfg.component_part_sources {
                let Some(settings) = sources.get_mut(component_source) else {
                    return Err(IngestError::Config(format!(
                        "source '{host_source}' lists unknown component part source '{component_source}'"
                    )));
                };
                if !settings.host_record_sources.contains(host_source) {
                    settings.host_record_sources.push(host_source.clone());
                }
            }
        }

        Ok(Self { sources })
    }

    pub fn get(&self, source_id: &str) -> Result<&DataSourceSettings> {
        self.sources
            .get(source_id)
            .ok_or_else(|| IngestError::Config(format!("no settings for source '{source_id}'")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSourceSettings> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn required(source_id: &str, key: &str, value: Option<&str>) -> Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(IngestError::Config(format!(
            "source '{source_id}' is missing required setting '{key}'"
        ))),
    }
}

/// Disjoint prefixes keep the id namespace collision-free across sources.
fn check_prefixes(sources: &BTreeMap<String, DataSourceSettings>) -> Result<()> {
    let mut seen: rustc_hash::FxHashMap<&str, &str> = rustc_hash::FxHashMap::default();
    for settings in sources.values() {
        if let Some(other) = seen.insert(&settings.id_prefix, &settings.source_id) {
            return Err(IngestError::Config(format!(
                "sources '{other}' and '{}' share id prefix '{}'",
                settings.source_id, settings.id_prefix
            )));
        }
    }
    Ok(())
}

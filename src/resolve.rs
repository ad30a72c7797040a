use std::path::Path;

use tracing::info;

use crate::adf;
use crate::domain::ExperimentAccession;
use crate::error::IngestError;
use crate::fetch::ArrayExpressClient;
use crate::fs_util::open_plain_or_compressed;
use crate::model::{ExperimentRecord, Platform};
use crate::sdrf;
use crate::store::Store;

/// Lookup collaborator for platforms already known to the system.
pub trait PlatformCatalog: Send + Sync {
    fn find_by_name(&self, name: &str) -> Option<Platform>;
    fn find_by_short_name(&self, short_name: &str) -> Option<Platform>;
}

/// Catalog over platform documents persisted in the store.
#[derive(Debug, Clone)]
pub struct StorePlatformCatalog {
    store: Store,
}

impl StorePlatformCatalog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl PlatformCatalog for StorePlatformCatalog {
    fn find_by_name(&self, name: &str) -> Option<Platform> {
        self.store.load_platform(name)
    }

    fn find_by_short_name(&self, short_name: &str) -> Option<Platform> {
        self.store
            .list_platforms()
            .ok()?
            .into_iter()
            .find(|p| p.short_name == short_name)
    }
}

/// In-memory catalog for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlatformCatalog {
    platforms: Vec<Platform>,
}

impl MemoryPlatformCatalog {
    pub fn new(platforms: Vec<Platform>) -> Self {
        Self { platforms }
    }
}

impl PlatformCatalog for MemoryPlatformCatalog {
    fn find_by_name(&self, name: &str) -> Option<Platform> {
        self.platforms.iter().find(|p| p.name == name).cloned()
    }

    fn find_by_short_name(&self, short_name: &str) -> Option<Platform> {
        self.platforms
            .iter()
            .find(|p| p.short_name == short_name)
            .cloned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Caller-selected platform identifier; must already be in the catalog.
    pub selected_platform: Option<String>,
    /// Permit fetching an unknown platform's description file remotely.
    pub allow_platform_acquisition: bool,
    /// Key acquired probes by reporter identifier (set when the data matrix
    /// is reporter-based).
    pub use_reporter_ids: bool,
}

/// Determines the single platform an experiment was run on and attaches a
/// populated probe set to the record.
pub struct PlatformResolver<'a, C: ArrayExpressClient, K: PlatformCatalog> {
    client: &'a C,
    catalog: &'a K,
}

impl<'a, C: ArrayExpressClient, K: PlatformCatalog> PlatformResolver<'a, C, K> {
    pub fn new(client: &'a C, catalog: &'a K) -> Self {
        Self { client, catalog }
    }

    pub fn resolve(
        &self,
        record: &mut ExperimentRecord,
        accession: &ExperimentAccession,
        download_dir: &Path,
        options: &ResolveOptions,
    ) -> Result<(), IngestError> {
        if let Some(selected) = &options.selected_platform {
            return self.use_selected(record, selected);
        }
        if !options.allow_platform_acquisition {
            return Err(IngestError::PlatformAcquisitionDisabled);
        }
        self.acquire(record, accession, download_dir, options)
    }

    /// The caller picked a platform; every assay is re-pointed to it,
    /// overwriting any partial references from metadata conversion.
    fn use_selected(
        &self,
        record: &mut ExperimentRecord,
        selected: &str,
    ) -> Result<(), IngestError> {
        let platform = self
            .catalog
            .find_by_name(selected)
            .or_else(|| self.catalog.find_by_short_name(selected))
            .ok_or_else(|| IngestError::SelectedPlatformNotFound(selected.to_string()))?;
        if !platform.is_resolved() {
            return Err(IngestError::EmptyPlatform(platform.name.clone()));
        }
        info!(platform = %platform.name, "using selected platform");
        record.repoint_assays(&platform.name);
        record.platform = Some(platform);
        Ok(())
    }

    fn acquire(
        &self,
        record: &mut ExperimentRecord,
        accession: &ExperimentAccession,
        download_dir: &Path,
        options: &ResolveOptions,
    ) -> Result<(), IngestError> {
        let mut candidates = record.distinct_platform_refs();
        if candidates.len() > 1 {
            return Err(IngestError::MultiplePlatforms(candidates.len()));
        }
        if candidates.is_empty() {
            info!("no platform on any assay, checking the sample table");
            candidates = self.refs_from_sample_table(accession, download_dir)?;
            if candidates.is_empty() {
                return Err(IngestError::NoPlatform(accession.to_string()));
            }
            if candidates.len() > 1 {
                return Err(IngestError::MultiplePlatforms(candidates.len()));
            }
        }
        let name = candidates.remove(0);

        let platform = match self.catalog.find_by_name(&name) {
            Some(known) if known.is_resolved() => {
                info!(platform = %name, probes = known.probes.len(), "platform already known");
                known
            }
            _ => self.fetch_platform(&name, download_dir, options.use_reporter_ids)?,
        };

        record.repoint_assays(&platform.name);
        record.platform = Some(platform);
        Ok(())
    }

    fn refs_from_sample_table(
        &self,
        accession: &ExperimentAccession,
        download_dir: &Path,
    ) -> Result<Vec<String>, IngestError> {
        let sample_table = self.client.fetch_sample_table(accession, download_dir)?;
        sdrf::platform_refs(open_plain_or_compressed(&sample_table.path)?)
    }

    fn fetch_platform(
        &self,
        name: &str,
        download_dir: &Path,
        use_reporter_ids: bool,
    ) -> Result<Platform, IngestError> {
        info!(platform = %name, "fetching platform description file");
        let design = self.client.fetch_platform_design(name, download_dir)?;
        let probes = adf::parse_adf(open_plain_or_compressed(&design.path)?, use_reporter_ids)?;
        if probes.is_empty() {
            return Err(IngestError::EmptyPlatform(name.to_string()));
        }
        info!(platform = %name, probes = probes.len(), "platform acquired");
        let mut platform = Platform::named(name);
        platform.probes = probes;
        Ok(platform)
    }
}

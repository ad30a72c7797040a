use std::fmt;
use std::io::{BufReader, Read};

use tracing::info;

use crate::domain::ExperimentAccession;
use crate::error::IngestError;
use crate::fetch::ArrayExpressClient;
use crate::fs_util::open_plain_or_compressed;
use crate::matrix::{ProcessedDataTable, parse_matrix};
use crate::merge::{self, MergeSummary};
use crate::metadata::MetadataConverter;
use crate::model::ExperimentRecord;
use crate::resolve::{PlatformCatalog, PlatformResolver, ResolveOptions};
use crate::store::{ExperimentWriter, PersistedExperiment, Store};

/// Pipeline stages, in order. Any error fails the whole run; there is no
/// retry between stages and nothing partial is ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchMetadata,
    ConvertMetadata,
    FetchData,
    ParseData,
    ResolvePlatform,
    Merge,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FetchMetadata => "fetch-metadata",
            Stage::ConvertMetadata => "convert-metadata",
            Stage::FetchData => "fetch-data",
            Stage::ParseData => "parse-data",
            Stage::ResolvePlatform => "resolve-platform",
            Stage::Merge => "merge",
            Stage::Done => "done",
        };
        write!(f, "{name}")
    }
}

fn enter(stage: Stage, accession: &ExperimentAccession) {
    info!(stage = %stage, accession = %accession, "pipeline stage");
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Use this already-known platform instead of acquiring one.
    pub platform: Option<String>,
    /// Permit fetching unknown platform description files remotely.
    pub allow_platform_acquisition: bool,
    /// Hand the finished record to the persistence collaborator.
    pub persist: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            platform: None,
            allow_platform_acquisition: false,
            persist: true,
        }
    }
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub record: ExperimentRecord,
    pub merge: MergeSummary,
    pub persisted: Option<PersistedExperiment>,
}

/// Sequences one experiment's ingestion: fetch the metadata and data files,
/// parse, resolve the platform, merge, persist.
pub struct Pipeline<C, M, K, W>
where
    C: ArrayExpressClient,
    M: MetadataConverter,
    K: PlatformCatalog,
    W: ExperimentWriter,
{
    client: C,
    converter: M,
    catalog: K,
    writer: W,
    store: Store,
}

impl<C, M, K, W> Pipeline<C, M, K, W>
where
    C: ArrayExpressClient,
    M: MetadataConverter,
    K: PlatformCatalog,
    W: ExperimentWriter,
{
    pub fn new(client: C, converter: M, catalog: K, writer: W, store: Store) -> Self {
        Self {
            client,
            converter,
            catalog,
            writer,
            store,
        }
    }

    pub fn load(
        &self,
        accession: &ExperimentAccession,
        options: &LoadOptions,
    ) -> Result<LoadOutcome, IngestError> {
        let download_dir = self.store.experiment_download_dir(accession);
        Store::ensure_dir(&download_dir)?;
        let download_dir = download_dir.as_std_path();

        enter(Stage::FetchMetadata, accession);
        let metadata = self.client.fetch_metadata(accession, download_dir)?;

        enter(Stage::ConvertMetadata, accession);
        let mut reader = open_plain_or_compressed(&metadata.path)?;
        let mut record = self.converter.convert(&mut reader)?;
        record.accession = accession.as_str().to_string();

        enter(Stage::FetchData, accession);
        let files = self.client.fetch_processed_data(accession, download_dir)?;

        enter(Stage::ParseData, accession);
        let mut table = ProcessedDataTable::new();
        for file in &files {
            info!(file = %file.file_name(), "parsing processed data");
            parse_matrix(open_plain_or_compressed(&file.path)?, &mut table)?;
        }
        if table.is_empty() {
            return Err(IngestError::MissingProcessedData(accession.to_string()));
        }

        self.finish(record, &table, accession, options)
    }

    /// Offline variant: raw metadata and data streams instead of an
    /// accession. Platform acquisition may still reach the remote if the
    /// streams reference a platform the catalog does not know.
    pub fn load_from_readers(
        &self,
        metadata: &mut dyn Read,
        data: &mut dyn Read,
        accession: &ExperimentAccession,
        options: &LoadOptions,
    ) -> Result<LoadOutcome, IngestError> {
        enter(Stage::ConvertMetadata, accession);
        let mut record = self.converter.convert(metadata)?;
        record.accession = accession.as_str().to_string();

        enter(Stage::ParseData, accession);
        let mut table = ProcessedDataTable::new();
        parse_matrix(BufReader::new(data), &mut table)?;
        if table.is_empty() {
            return Err(IngestError::MissingProcessedData(accession.to_string()));
        }

        self.finish(record, &table, accession, options)
    }

    fn finish(
        &self,
        mut record: ExperimentRecord,
        table: &ProcessedDataTable,
        accession: &ExperimentAccession,
        options: &LoadOptions,
    ) -> Result<LoadOutcome, IngestError> {
        enter(Stage::ResolvePlatform, accession);
        let download_dir = self.store.experiment_download_dir(accession);
        Store::ensure_dir(&download_dir)?;
        let resolver = PlatformResolver::new(&self.client, &self.catalog);
        let resolve_options = ResolveOptions {
            selected_platform: options.platform.clone(),
            allow_platform_acquisition: options.allow_platform_acquisition,
            use_reporter_ids: table.uses_reporter_ids(),
        };
        resolver.resolve(
            &mut record,
            accession,
            download_dir.as_std_path(),
            &resolve_options,
        )?;

        enter(Stage::Merge, accession);
        let merge = merge::merge(&mut record, table)?;

        let persisted = if options.persist {
            Some(self.writer.persist(&record)?)
        } else {
            None
        };

        enter(Stage::Done, accession);
        Ok(LoadOutcome {
            record,
            merge,
            persisted,
        })
    }
}

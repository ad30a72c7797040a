use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("invalid experiment accession: {0}")]
    InvalidExperimentAccession(String),

    #[error("invalid platform accession: {0}")]
    InvalidPlatformAccession(String),

    #[error("ArrayExpress request failed: {0}")]
    RemoteHttp(String),

    #[error("ArrayExpress returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("no remote file found for {0} under any known naming convention")]
    MissingRemoteFile(String),

    #[error("no metadata document for {0}, halting processing")]
    MissingMetadata(String),

    #[error("no processed data for {0}, halting processing")]
    MissingProcessedData(String),

    #[error("malformed line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("failed to parse metadata document: {0}")]
    MetadataParse(String),

    #[error("sample '{0}' in the data table has no matching assay")]
    UnknownSample(String),

    #[error("probe '{0}' in the data table is not on the platform")]
    UnknownProbe(String),

    #[error("quantitation type '{0}' in the data table is not declared by the experiment")]
    UnknownQuantitationType(String),

    #[error("cannot handle multiple platforms per experiment ({0} found)")]
    MultiplePlatforms(usize),

    #[error("could not determine any platform for {0}")]
    NoPlatform(String),

    #[error("platform '{0}' has no probes")]
    EmptyPlatform(String),

    #[error("experiment declares no quantitation types")]
    NoQuantitationTypes,

    #[error("selected platform not found: {0}")]
    SelectedPlatformNotFound(String),

    #[error("no platform in the system and platform acquisition disabled")]
    PlatformAcquisitionDisabled,

    #[error("unsupported representation: {0}")]
    UnsupportedRepresentation(String),

    #[error("corrupt data vector: {0}")]
    CorruptVector(String),

    #[error("missing config file ae-ingest.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

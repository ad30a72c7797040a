use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::ExperimentAccession;
use crate::error::IngestError;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub experiments: Vec<ExperimentEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ExperimentEntry {
    Shorthand(String),
    Detailed(ExperimentEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExperimentEntryObject {
    pub accession: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub allow_platform_acquisition: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ExperimentRequest {
    pub accession: ExperimentAccession,
    pub platform: Option<String>,
    pub allow_platform_acquisition: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub experiments: Vec<ExperimentRequest>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, IngestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("ae-ingest.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(IngestError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| IngestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| IngestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, IngestError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let experiments = config
            .experiments
            .into_iter()
            .map(|entry| match entry {
                ExperimentEntry::Shorthand(value) => Ok(ExperimentRequest {
                    accession: value.parse()?,
                    platform: None,
                    allow_platform_acquisition: true,
                }),
                ExperimentEntry::Detailed(obj) => Ok(ExperimentRequest {
                    accession: obj.accession.parse()?,
                    platform: obj.platform,
                    allow_platform_acquisition: obj.allow_platform_acquisition.unwrap_or(true),
                }),
            })
            .collect::<Result<Vec<_>, IngestError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            experiments,
        })
    }
}

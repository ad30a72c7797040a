use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::domain::ExperimentAccession;
use crate::error::IngestError;
use crate::model::{ExperimentRecord, Platform};

/// Local warehouse layout: downloaded files under `downloads/`, finished
/// records under `experiments/`, acquired platforms under `platforms/`.
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, IngestError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("ae-ingest")).ok()
            })
            .ok_or_else(|| {
                IngestError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { root })
    }

    pub fn with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn experiment_download_dir(&self, accession: &ExperimentAccession) -> Utf8PathBuf {
        self.root.join("downloads").join(accession.as_str())
    }

    pub fn platform_download_dir(&self, platform: &str) -> Utf8PathBuf {
        self.root.join("downloads").join(platform)
    }

    pub fn experiment_record_path(&self, accession: &str) -> Utf8PathBuf {
        self.root.join("experiments").join(format!("{accession}.json"))
    }

    pub fn platform_record_path(&self, name: &str) -> Utf8PathBuf {
        self.root.join("platforms").join(format!("{name}.json"))
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), IngestError> {
        fs::create_dir_all(path.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))
    }

    pub fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), IngestError> {
        let parent = path
            .parent()
            .ok_or_else(|| IngestError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(value)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("ae-ingest")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), &content)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, IngestError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("read {path}: {err}")))?;
        serde_json::from_str(&content).map_err(|err| IngestError::Filesystem(err.to_string()))
    }

    /// Looks up a previously persisted platform document.
    pub fn load_platform(&self, name: &str) -> Option<Platform> {
        let path = self.platform_record_path(name);
        if !path.as_std_path().exists() {
            return None;
        }
        Store::read_json(&path).ok()
    }

    pub fn save_platform(&self, platform: &Platform) -> Result<(), IngestError> {
        Store::write_json_atomic(&self.platform_record_path(&platform.name), platform)
    }

    /// Platform documents on disk, for short-name lookups.
    pub fn list_platforms(&self) -> Result<Vec<Platform>, IngestError> {
        let dir = self.root.join("platforms");
        if !dir.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut platforms = Vec::new();
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| IngestError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path)
                    .map_err(|err| IngestError::Filesystem(err.to_string()))?;
                let platform: Platform = serde_json::from_str(&content)
                    .map_err(|err| IngestError::Filesystem(err.to_string()))?;
                platforms.push(platform);
            }
        }
        Ok(platforms)
    }
}

/// Persistence collaborator: accepts a finished record exactly once per
/// successful run.
pub trait ExperimentWriter: Send + Sync {
    fn persist(&self, record: &ExperimentRecord) -> Result<PersistedExperiment, IngestError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedExperiment {
    pub accession: String,
    pub path: String,
    pub assays: usize,
    pub vectors: usize,
    pub ingested_at: String,
}

/// Writes the finished record (and its platform, for later catalog lookups)
/// as JSON documents in the store.
#[derive(Debug, Clone)]
pub struct JsonExperimentWriter {
    store: Store,
}

impl JsonExperimentWriter {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl ExperimentWriter for JsonExperimentWriter {
    fn persist(&self, record: &ExperimentRecord) -> Result<PersistedExperiment, IngestError> {
        let path = self.store.experiment_record_path(&record.accession);
        Store::write_json_atomic(&path, record)?;
        if let Some(platform) = &record.platform {
            self.store.save_platform(platform)?;
        }
        Ok(PersistedExperiment {
            accession: record.accession.clone(),
            path: path.to_string(),
            assays: record.assays.len(),
            vectors: record.vectors.len(),
            ingested_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::with_root(Utf8PathBuf::from("/tmp/ae-ingest-test"));
        let acc: ExperimentAccession = "E-MEXP-297".parse().unwrap();

        assert!(
            store
                .experiment_download_dir(&acc)
                .ends_with("downloads/E-MEXP-297")
        );
        assert!(
            store
                .experiment_record_path("E-MEXP-297")
                .ends_with("experiments/E-MEXP-297.json")
        );
        assert!(
            store
                .platform_record_path("A-AFFY-6")
                .ends_with("platforms/A-AFFY-6.json")
        );
    }
}

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{ExperimentAccession, PlatformAccession};
use crate::error::IngestError;
use crate::fs_util::extract_zip;

/// A fetched file on local disk, with the expected byte size where the
/// remote reported one.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub path: PathBuf,
    pub expected_size: Option<u64>,
}

impl LocalFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Retrieval collaborator for the experiment/array repository.
pub trait ArrayExpressClient: Send + Sync {
    /// The structured metadata document for an experiment.
    fn fetch_metadata(
        &self,
        accession: &ExperimentAccession,
        dest_dir: &Path,
    ) -> Result<LocalFile, IngestError>;

    /// The processed-data matrices, unpacked from their archives.
    fn fetch_processed_data(
        &self,
        accession: &ExperimentAccession,
        dest_dir: &Path,
    ) -> Result<Vec<LocalFile>, IngestError>;

    /// The sample-description (SDRF) table.
    fn fetch_sample_table(
        &self,
        accession: &ExperimentAccession,
        dest_dir: &Path,
    ) -> Result<LocalFile, IngestError>;

    /// A platform description (ADF) file.
    fn fetch_platform_design(
        &self,
        platform: &str,
        dest_dir: &Path,
    ) -> Result<LocalFile, IngestError>;
}

/// Processed data is split into enumerated sibling archives; probe this many
/// before falling back to the unnumbered convention.
const MAX_PROCESSED_ARCHIVES: usize = 4;
const DOWNLOAD_POOL_SIZE: usize = 2;

#[derive(Clone)]
pub struct ArrayExpressHttpClient {
    client: Client,
    base_url: String,
    legacy_base_url: String,
}

impl ArrayExpressHttpClient {
    pub fn new() -> Result<Self, IngestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ae-ingest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IngestError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| IngestError::RemoteHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: "https://www.ebi.ac.uk/arrayexpress/files".to_string(),
            legacy_base_url: "https://ftp.ebi.ac.uk/pub/databases/arrayexpress/data".to_string(),
        })
    }

    pub fn with_base_urls(base_url: String, legacy_base_url: String) -> Result<Self, IngestError> {
        let mut client = Self::new()?;
        client.base_url = base_url;
        client.legacy_base_url = legacy_base_url;
        Ok(client)
    }

    /// Primary naming convention first, then the legacy pipe-code layout.
    fn experiment_urls(&self, accession: &ExperimentAccession, file: &str) -> Vec<String> {
        let acc = accession.as_str();
        vec![
            format!("{}/{acc}/{file}", self.base_url),
            format!(
                "{}/experiment/{}/{acc}/{file}",
                self.legacy_base_url,
                accession.pipeline()
            ),
        ]
    }

    fn platform_urls(&self, platform: &str, file: &str) -> Vec<String> {
        let mut urls = vec![format!("{}/{platform}/{file}", self.base_url)];
        if let Ok(accession) = platform.parse::<PlatformAccession>() {
            urls.push(format!(
                "{}/array/{}/{platform}/{file}",
                self.legacy_base_url,
                accession.pipeline()
            ));
        }
        urls
    }

    fn download(&self, url: &str, destination: &Path) -> Result<LocalFile, IngestError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return write_response_to_file(response, destination);
                    }
                    let transient = status.is_server_error() || status.as_u16() == 429;
                    if transient && attempt < MAX_RETRIES {
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * attempt as u64));
                        continue;
                    }
                    let message = response
                        .text()
                        .unwrap_or_else(|_| "ArrayExpress request failed".to_string());
                    return Err(IngestError::RemoteStatus {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(err) => {
                    if attempt < MAX_RETRIES {
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * attempt as u64));
                        continue;
                    }
                    return Err(IngestError::RemoteHttp(err.to_string()));
                }
            }
        }
    }

    /// Tries each URL in order, keeping the first the remote serves.
    fn download_first(
        &self,
        owner: &str,
        urls: &[String],
        destination: &Path,
    ) -> Result<LocalFile, IngestError> {
        for url in urls {
            match self.download(url, destination) {
                Ok(file) => return Ok(file),
                Err(IngestError::RemoteStatus { .. }) | Err(IngestError::RemoteHttp(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Err(IngestError::MissingRemoteFile(owner.to_string()))
    }
}

fn write_response_to_file(
    mut response: reqwest::blocking::Response,
    destination: &Path,
) -> Result<LocalFile, IngestError> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    }
    let expected_size = response.content_length();
    let mut file =
        File::create(destination).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    std::io::copy(&mut response, &mut file)
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    Ok(LocalFile {
        path: destination.to_path_buf(),
        expected_size,
    })
}

/// Runs independent downloads on a fixed-size worker pool, joining on all of
/// them. A failed download does not cancel its siblings.
fn download_pool(
    client: &ArrayExpressHttpClient,
    jobs: Vec<(String, PathBuf)>,
) -> Vec<Result<LocalFile, IngestError>> {
    let queue: Mutex<VecDeque<(usize, String, PathBuf)>> = Mutex::new(
        jobs.into_iter()
            .enumerate()
            .map(|(idx, (url, dest))| (idx, url, dest))
            .collect(),
    );
    let total = queue.lock().unwrap().len();
    let results: Mutex<Vec<Option<Result<LocalFile, IngestError>>>> =
        Mutex::new((0..total).map(|_| None).collect());

    thread::scope(|scope| {
        for _ in 0..DOWNLOAD_POOL_SIZE.min(total) {
            scope.spawn(|| {
                loop {
                    let job = queue.lock().unwrap().pop_front();
                    let Some((idx, url, dest)) = job else {
                        break;
                    };
                    let result = client.download(&url, &dest);
                    results.lock().unwrap()[idx] = Some(result);
                }
            });
        }
    });

    results
        .into_inner()
        .unwrap()
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(IngestError::RemoteHttp(
                    "download worker dropped job".to_string(),
                ))
            })
        })
        .collect()
}

fn is_data_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".txt")
        || name.ends_with(".tsv")
        || name.ends_with(".txt.gz")
        || name.ends_with(".tsv.gz")
}

impl ArrayExpressClient for ArrayExpressHttpClient {
    fn fetch_metadata(
        &self,
        accession: &ExperimentAccession,
        dest_dir: &Path,
    ) -> Result<LocalFile, IngestError> {
        let acc = accession.as_str();
        let name = format!("{acc}.json");
        let urls = self.experiment_urls(accession, &name);
        self.download_first(acc, &urls, &dest_dir.join(&name))
            .map_err(|err| match err {
                IngestError::MissingRemoteFile(_) => IngestError::MissingMetadata(acc.to_string()),
                other => other,
            })
    }

    fn fetch_processed_data(
        &self,
        accession: &ExperimentAccession,
        dest_dir: &Path,
    ) -> Result<Vec<LocalFile>, IngestError> {
        let acc = accession.as_str();
        std::fs::create_dir_all(dest_dir)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;

        // Enumerated sibling archives, fetched concurrently; misses are
        // tolerated as long as something downloads.
        let jobs: Vec<(String, PathBuf)> = (1..=MAX_PROCESSED_ARCHIVES)
            .map(|n| {
                let name = format!("{acc}.processed.{n}.zip");
                let url = self.experiment_urls(accession, &name).remove(0);
                (url, dest_dir.join(&name))
            })
            .collect();
        let mut archives: Vec<LocalFile> = download_pool(self, jobs)
            .into_iter()
            .filter_map(Result::ok)
            .collect();

        if archives.is_empty() {
            let name = format!("{acc}.processed.zip");
            let urls = self.experiment_urls(accession, &name);
            if let Ok(file) = self.download_first(acc, &urls, &dest_dir.join(&name)) {
                archives.push(file);
            }
        }
        if archives.is_empty() {
            return Err(IngestError::MissingProcessedData(acc.to_string()));
        }

        let mut files = Vec::new();
        for archive in &archives {
            for path in extract_zip(&archive.path, dest_dir)? {
                if is_data_file(&path) {
                    files.push(LocalFile {
                        path,
                        expected_size: None,
                    });
                }
            }
        }
        if files.is_empty() {
            return Err(IngestError::MissingProcessedData(acc.to_string()));
        }
        Ok(files)
    }

    fn fetch_sample_table(
        &self,
        accession: &ExperimentAccession,
        dest_dir: &Path,
    ) -> Result<LocalFile, IngestError> {
        let acc = accession.as_str();
        let name = format!("{acc}.sdrf.txt");
        let urls = self.experiment_urls(accession, &name);
        self.download_first(acc, &urls, &dest_dir.join(&name))
    }

    fn fetch_platform_design(
        &self,
        platform: &str,
        dest_dir: &Path,
    ) -> Result<LocalFile, IngestError> {
        let name = format!("{platform}.adf.txt");
        let urls = self.platform_urls(platform, &name);
        self.download_first(platform, &urls, &dest_dir.join(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_urls_try_both_conventions() {
        let client = ArrayExpressHttpClient::with_base_urls(
            "https://files.example".to_string(),
            "https://legacy.example".to_string(),
        )
        .unwrap();
        let accession: ExperimentAccession = "E-MEXP-297".parse().unwrap();
        let urls = client.experiment_urls(&accession, "E-MEXP-297.sdrf.txt");
        assert_eq!(
            urls,
            [
                "https://files.example/E-MEXP-297/E-MEXP-297.sdrf.txt",
                "https://legacy.example/experiment/MEXP/E-MEXP-297/E-MEXP-297.sdrf.txt",
            ]
        );
    }

    #[test]
    fn platform_urls_skip_legacy_for_free_form_names() {
        let client = ArrayExpressHttpClient::with_base_urls(
            "https://files.example".to_string(),
            "https://legacy.example".to_string(),
        )
        .unwrap();
        assert_eq!(client.platform_urls("A-AFFY-6", "A-AFFY-6.adf.txt").len(), 2);
        assert_eq!(
            client
                .platform_urls("custom array", "custom array.adf.txt")
                .len(),
            1
        );
    }
}

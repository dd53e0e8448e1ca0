// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Data file downloads.
//!
//! Fetches the published catalog, stack, and status files either over HTTP
//! or from a local directory, gunzips `.gz` payloads, and keeps a disk cache
//! keyed by the SHA256 of the URL. Name resolution goes through the same
//! client.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use skyview_core::lookup::lookup_url;
use skyview_core::FetchFailure;
use thiserror::Error;

use crate::config::{AppConfig, APP_NAME};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("the server responded with status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode {name}: {reason}")]
    Decode { name: String, reason: String },
}

impl FetchError {
    /// Collapse into the viewer's failure vocabulary.
    #[must_use]
    pub fn into_failure(self) -> FetchFailure {
        match self {
            Self::Status(code) => FetchFailure::Status(code),
            Self::Network(e) => FetchFailure::Network(e.to_string()),
            Self::Io(e) => FetchFailure::Network(e.to_string()),
            Self::Decode { reason, .. } => FetchFailure::Decode(reason),
        }
    }
}

/// Where the data files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Http(String),
    Directory(PathBuf),
}

/// Client for the published data files.
#[derive(Debug, Clone)]
pub struct DataClient {
    http: reqwest::Client,
    source: Source,
    lookup_base: String,
    cache_dir: Option<PathBuf>,
}

impl DataClient {
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let source = if config.data_url.starts_with("http://")
            || config.data_url.starts_with("https://")
        {
            let mut base = config.data_url.clone();
            if !base.ends_with('/') {
                base.push('/');
            }
            Source::Http(base)
        } else {
            Source::Directory(PathBuf::from(&config.data_url))
        };

        let cache_dir = match (&source, config.cache_downloads) {
            (Source::Http(_), true) => {
                let dir = dirs::cache_dir().map(|d| d.join(APP_NAME).join("data"));
                if dir.is_none() {
                    warn!("Could not determine cache directory, downloads will not be cached");
                }
                dir
            }
            _ => None,
        };

        Ok(Self {
            http,
            source,
            lookup_base: config.lookup_url.clone(),
            cache_dir,
        })
    }

    /// Fetch a data file as text. Cacheable files are served from the disk
    /// cache when present.
    pub async fn fetch_text(&self, name: &str, cacheable: bool) -> Result<String, FetchError> {
        let bytes = match &self.source {
            Source::Directory(dir) => {
                let path = dir.join(name);
                debug!("Reading {}", path.display());
                tokio::fs::read(&path).await?
            }
            Source::Http(base) => {
                let url = format!("{base}{name}");
                let cache_path = cacheable
                    .then(|| self.cache_dir.as_deref().map(|dir| cache_path(dir, &url)))
                    .flatten();

                match cache_path.as_deref().and_then(|p| fs::read(p).ok()) {
                    Some(bytes) => {
                        debug!("Serving {name} from cache");
                        bytes
                    }
                    None => {
                        let bytes = self.download(&url).await?;
                        if let Some(path) = cache_path {
                            store_cache(&path, &bytes);
                        }
                        bytes
                    }
                }
            }
        };

        decode_body(name, &bytes)
    }

    /// Query the name resolver. The raw JSON body is returned.
    pub async fn lookup(&self, name: &str) -> Result<String, FetchError> {
        let url = lookup_url(&self.lookup_base, name);
        let bytes = self.download(&url).await?;
        decode_body("lookUP response", &bytes)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        info!("Downloading {url}");
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Cache file for a URL, named by the SHA256 of the URL.
fn cache_path(dir: &Path, url: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    dir.join(hash)
}

fn store_cache(path: &Path, bytes: &[u8]) {
    let result = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(path, bytes));
    if let Err(e) = result {
        warn!("Unable to cache {}: {e}", path.display());
    }
}

/// Gunzip `.gz` payloads and check that the text is UTF-8.
fn decode_body(name: &str, bytes: &[u8]) -> Result<String, FetchError> {
    let decode_error = |reason: String| FetchError::Decode {
        name: name.to_owned(),
        reason,
    };

    if Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
    {
        let mut decoder = GzDecoder::new(bytes);
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(|e| decode_error(e.to_string()))?;
        return Ok(text);
    }

    String::from_utf8(bytes.to_vec()).map_err(|e| decode_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_gz_and_plain() {
        let text = r#"{"ntotal": 0}"#;
        assert_eq!(decode_body("wwt_srcprop.1.json.gz", &gzip(text)).unwrap(), text);
        assert_eq!(decode_body("chs.json", text.as_bytes()).unwrap(), text);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_body("xmm.json.gz", b"not gzip"),
            Err(FetchError::Decode { .. })
        ));
        assert!(matches!(
            decode_body("chs.json", &[0xff, 0xfe]),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn test_cache_path_is_stable() {
        let dir = Path::new("/tmp/cache");
        let a = cache_path(dir, "https://example.org/a.json");
        let b = cache_path(dir, "https://example.org/a.json");
        let c = cache_path(dir, "https://example.org/b.json");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.file_name().unwrap().len(), 64);
    }

    #[test]
    fn test_failure_mapping() {
        assert_eq!(
            FetchError::Status(404).into_failure(),
            FetchFailure::Status(404)
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            FetchError::Io(io).into_failure(),
            FetchFailure::Network(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_from_directory() {
        let dir = std::env::temp_dir().join(format!("cscview-fetch-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("xmm.json.gz"), gzip(r#"{"catalog": "x"}"#)).unwrap();

        let config = AppConfig {
            data_url: dir.display().to_string(),
            ..AppConfig::default()
        };
        let client = DataClient::new(&config).unwrap();
        assert!(client.cache_dir.is_none());

        let text = client.fetch_text("xmm.json.gz", true).await.unwrap();
        assert_eq!(text, r#"{"catalog": "x"}"#);
        assert!(matches!(
            client.fetch_text("missing.json", true).await,
            Err(FetchError::Io(_))
        ));

        fs::remove_dir_all(&dir).unwrap();
    }
}

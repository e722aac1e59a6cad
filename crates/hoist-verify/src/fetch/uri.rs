//! Scheme-dispatching fetcher: local files, HTTP(S) and GCS over HTTP.
//!
//! This is the ONLY place that interprets HTTP status codes.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use super::{FetchConfig, FetchError, Fetcher};

/// User-Agent sent on every HTTP request.
pub const FETCH_USER_AGENT: &str = concat!("hoist-verify/", env!("CARGO_PKG_VERSION"));

const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Default [`Fetcher`] for `file`, `gs`, `http` and `https` URLs.
#[derive(Debug, Clone)]
pub struct UriFetcher {
    client: Client,
    config: FetchConfig,
}

impl UriFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        if config.timeout_secs == 0 {
            return Err(FetchError::Client {
                message: "request timeout must be at least 1 second".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(FETCH_USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client {
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, FetchError> {
        Self::new(FetchConfig::from_env())
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn copy_file(&self, source: &Url, destination: &Path) -> Result<(), FetchError> {
        let path = source.to_file_path().map_err(|_| FetchError::InvalidUrl {
            url: source.to_string(),
            message: "not a local file path".to_string(),
        })?;

        match fs::copy(&path, destination) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !path.exists() => {
                Err(FetchError::NotFound {
                    url: source.to_string(),
                })
            }
            Err(e) => Err(FetchError::Io { path, source: e }),
        }
    }

    fn copy_http(&self, source: &Url, destination: &Path) -> Result<(), FetchError> {
        let mut response = self.get_with_retry(source)?;

        let mut file = File::create(destination).map_err(|e| FetchError::Io {
            path: destination.to_path_buf(),
            source: e,
        })?;
        response
            .copy_to(&mut file)
            .map_err(|e| FetchError::Network {
                url: source.to_string(),
                message: format!("failed to read response body: {}", e),
            })?;
        file.flush().map_err(|e| FetchError::Io {
            path: destination.to_path_buf(),
            source: e,
        })
    }

    /// Map `gs://<bucket>/<object>` onto the configured HTTP endpoint.
    fn gcs_http_url(&self, source: &Url) -> Result<Url, FetchError> {
        let bucket = source
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| FetchError::InvalidUrl {
                url: source.to_string(),
                message: "missing bucket".to_string(),
            })?;

        let mut mapped = format!(
            "{}/{}{}",
            self.config.gcs_endpoint.trim_end_matches('/'),
            bucket,
            source.path()
        );
        if let Some(query) = source.query() {
            mapped.push('?');
            mapped.push_str(query);
        }

        Url::parse(&mapped).map_err(|e| FetchError::InvalidUrl {
            url: source.to_string(),
            message: format!("GCS endpoint mapping produced an invalid URL: {}", e),
        })
    }

    fn get_with_retry(&self, url: &Url) -> Result<Response, FetchError> {
        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            match self.get_once(url) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;
                    let backoff = backoff_for(&e, retries);

                    warn!(
                        url = %url,
                        error = %e,
                        retry = retries,
                        max_retries = max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying fetch"
                    );

                    std::thread::sleep(backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get_once(&self, url: &Url) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        match status {
            s if s.is_success() => Ok(response),

            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                url: url.to_string(),
            }),

            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);

                Err(FetchError::RateLimited {
                    url: url.to_string(),
                    retry_after,
                })
            }

            _ => Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

impl Fetcher for UriFetcher {
    fn copy_local(&self, source: &Url, destination: &Path) -> Result<(), FetchError> {
        debug!(url = %source, destination = %destination.display(), "copying to local storage");

        match source.scheme() {
            "file" => self.copy_file(source, destination),
            "http" | "https" => self.copy_http(source, destination),
            "gs" => {
                let mapped = self.gcs_http_url(source)?;
                self.copy_http(&mapped, destination)
            }
            other => Err(FetchError::UnsupportedScheme {
                url: source.to_string(),
                scheme: other.to_string(),
            }),
        }
    }
}

fn backoff_for(error: &FetchError, retries: u32) -> Duration {
    match error {
        FetchError::RateLimited {
            retry_after: Some(retry_after),
            ..
        } => {
            let capped = (*retry_after).min(MAX_RETRY_AFTER);
            let base_ms = capped.as_millis() as u64;
            let jitter_factor: f64 = rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
            let jittered_ms = ((base_ms as f64) * jitter_factor).round() as u64;
            Duration::from_millis(jittered_ms.max(100))
        }
        _ => {
            let base_backoff = Duration::from_secs(1 << retries.min(5));
            let base_backoff = base_backoff.min(MAX_RETRY_AFTER);
            let jittered_ms = rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
            Duration::from_millis(jittered_ms.max(10))
        }
    }
}

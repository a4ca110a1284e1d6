//! URL openers
//!
//! The cache never talks to the network directly; it asks a [`UrlOpener`]
//! for a byte stream. Reads are blocking and run on tokio's blocking pool.

use crate::error::{ReproError, ReproResult};
use crate::filespec::redact;
use std::fs::File;
use std::io::Read;
use tracing::debug;
use url::Url;

/// A source of bytes for a URL
pub trait UrlOpener: Send + Sync {
    /// Open `url` for reading
    fn open(&self, url: &Url) -> ReproResult<Box<dyn Read + Send>>;
}

/// Opener for `file://`, `http://` and `https://` URLs
pub struct DefaultOpener {
    agent: ureq::Agent,
}

impl DefaultOpener {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for DefaultOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlOpener for DefaultOpener {
    fn open(&self, url: &Url) -> ReproResult<Box<dyn Read + Send>> {
        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|()| ReproError::InvalidUrl {
                    url: redact(url),
                    reason: "not a local path".to_string(),
                })?;
                debug!("Opening {}", path.display());
                let file = File::open(&path).map_err(|e| ReproError::Transport {
                    url: redact(url),
                    reason: e.to_string(),
                })?;
                Ok(Box::new(file))
            }
            "http" | "https" => {
                debug!("GET {}", redact(url));
                let response =
                    self.agent
                        .get(url.as_str())
                        .call()
                        .map_err(|e| ReproError::Transport {
                            url: redact(url),
                            reason: e.to_string(),
                        })?;
                Ok(Box::new(response.into_body().into_reader()))
            }
            other => Err(ReproError::UrlScheme {
                scheme: other.to_string(),
                url: redact(url),
                expected: "file, http or https".to_string(),
            }),
        }
    }
}

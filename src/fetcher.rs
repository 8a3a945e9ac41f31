// Image fetcher with a cache-by-filename policy: an existing file at the
// destination is reused as-is and nothing is downloaded.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use reqwest::blocking::Client;

use crate::error::{Error, Result};
use crate::http;

#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    /// `client` decides TLS verification; see `http::build_client`.
    pub fn new(client: Client) -> Self {
        ImageFetcher { client }
    }

    /// Download `url` into `destination` unless a file is already there.
    ///
    /// The body is read completely before anything touches the disk, so a
    /// failed download never leaves a partial file behind.
    pub fn fetch(&self, url: &str, destination: &Path) -> Result<PathBuf> {
        if destination.is_file() {
            info!("{} already exists, not fetching it", destination.display());
            return Ok(destination.to_path_buf());
        }

        let res = http::send(url, self.client.get(url))?;
        let body = res.bytes().map_err(|e| Error::transport(url, e))?;

        if let Err(e) = fs::write(destination, &body) {
            error!("Failed to write {}: {e}", destination.display());
            if let Err(rm) = fs::remove_file(destination) {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial file {}: {rm}", destination.display());
                }
            }
            return Err(e.into());
        }
        info!("Saved {} bytes to {}", body.len(), destination.display());
        Ok(destination.to_path_buf())
    }
}

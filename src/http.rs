// Blocking HTTP plumbing shared by the comic source, the image fetcher and
// the VK client.

use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Build a blocking client with a bounded per-request timeout.
///
/// `verify_tls = false` accepts invalid certificates. Only the comic source
/// path is ever built that way, and real deployments should turn it back on.
pub fn build_client(timeout: Duration, verify_tls: bool) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(!verify_tls)
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))
}

/// Send a request and fail on network errors or a non-2xx status.
pub(crate) fn send(url: &str, request: RequestBuilder) -> Result<Response> {
    debug!("Sending request to {url}");
    let res = request.send().map_err(|e| Error::transport(url, e))?;
    let status = res.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status,
        });
    }
    Ok(res)
}

/// Read the whole body as JSON.
pub(crate) fn read_json(url: &str, res: Response) -> Result<serde_json::Value> {
    let body = res.bytes().map_err(|e| Error::transport(url, e))?;
    serde_json::from_slice(&body).map_err(|e| Error::malformed(url, format!("invalid JSON: {e}")))
}

/// Decode an already-parsed value into a typed response.
pub(crate) fn decode<T: DeserializeOwned>(url: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::malformed(url, e.to_string()))
}

// Comic source client: reads xkcd-style `info.0.json` metadata.

use log::{debug, info};
use percent_encoding::percent_decode_str;
use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::http;

/// One comic issue as published by the source. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comic {
    pub number: u32,
    pub image_url: String,
    pub caption: String,
}

/// Wire shape of `info.0.json`; only the fields we consume.
#[derive(Deserialize, Debug)]
struct ComicInfo {
    num: u32,
    img: String,
    #[serde(default)]
    alt: String,
}

impl From<ComicInfo> for Comic {
    fn from(info: ComicInfo) -> Self {
        Comic {
            number: info.num,
            image_url: info.img,
            caption: info.alt,
        }
    }
}

#[derive(Clone)]
pub struct ComicClient {
    client: Client,
    base_url: String,
}

impl ComicClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        ComicClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the current issue.
    pub fn get_latest(&self) -> Result<Comic> {
        let url = format!("{}/info.0.json", self.base_url);
        self.fetch(&url)
    }

    /// Fetch a specific issue. Some numbers (404 on xkcd) do not exist, so a
    /// transport failure here is an expected outcome rather than a bug.
    pub fn get_by_number(&self, number: u32) -> Result<Comic> {
        let url = format!("{}/{}/info.0.json", self.base_url, number);
        self.fetch(&url)
    }

    fn fetch(&self, url: &str) -> Result<Comic> {
        let res = http::send(url, self.client.get(url))?;
        let value = http::read_json(url, res)?;
        let comic: Comic = http::decode::<ComicInfo>(url, value)?.into();
        info!("Fetched comic #{} ({})", comic.number, comic.image_url);
        Ok(comic)
    }
}

/// Local file name for an image: the percent-decoded last path segment.
pub fn image_file_name(image_url: &str) -> Result<String> {
    let parsed =
        Url::parse(image_url).map_err(|e| Error::malformed(image_url, format!("bad image URL: {e}")))?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let name = percent_decode_str(segment)
        .decode_utf8()
        .map_err(|e| Error::malformed(image_url, format!("bad escape in image URL: {e}")))?
        .into_owned();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::malformed(
            image_url,
            format!("cannot derive a file name from {name:?}"),
        ));
    }
    debug!("Derived file name {name:?} from {image_url}");
    Ok(name)
}

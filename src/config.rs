// Runtime configuration, built once in `main` from `.env` and the process
// environment and then passed down by reference.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_VK_API_URL: &str = "https://api.vk.com/method";
pub const DEFAULT_COMIC_URL: &str = "https://xkcd.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials attached to every VK API call.
#[derive(Clone, PartialEq, Eq)]
pub struct VkCredentials {
    pub access_token: String,
    pub api_version: String,
    /// Positive community id; the wall owner id is its negation.
    pub group_id: i64,
}

impl VkCredentials {
    /// `owner_id` for `wall.post`: the negated group id. Negative ids
    /// address a community wall, so a non-positive group id is rejected.
    pub fn wall_owner_id(&self) -> Result<i64> {
        Some(self.group_id)
            .filter(|id| *id > 0)
            .and_then(i64::checked_neg)
            .ok_or_else(|| Error::Config(format!("group id must be positive, got {}", self.group_id)))
    }
}

impl fmt::Debug for VkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VkCredentials")
            .field("access_token", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("group_id", &self.group_id)
            .finish()
    }
}

/// Which comic a run publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Latest,
    /// Random issue in `[0, latest]`.
    Random,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub vk: VkCredentials,
    pub vk_api_url: String,
    pub comic_url: String,
    pub image_folder: PathBuf,
    /// TLS verification for the comic source and image downloads only.
    pub verify_tls: bool,
    pub timeout: Duration,
    pub mode: RunMode,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        // A missing .env is fine; variables may come from the environment.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };

        let group_id = required("VK_GID")?;
        let group_id = group_id
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| Error::Config(format!("VK_GID must be a positive integer, got {group_id:?}")))?;

        let vk = VkCredentials {
            access_token: required("VK_ACCESS_TOKEN")?,
            api_version: required("VK_API_VER")?,
            group_id,
        };

        let verify_tls = match lookup("XKCD_VERIFY_TLS") {
            None => false,
            Some(v) => parse_bool(&v)
                .ok_or_else(|| Error::Config(format!("XKCD_VERIFY_TLS must be true or false, got {v:?}")))?,
        };

        let timeout = match lookup("HTTP_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| Error::Config(format!("HTTP_TIMEOUT_SECS must be a positive integer, got {v:?}")))?,
        };

        let mode = match lookup("POST_MODE").as_deref().map(str::trim) {
            None | Some("random") => RunMode::Random,
            Some("latest") => RunMode::Latest,
            Some(other) => {
                return Err(Error::Config(format!(
                    "POST_MODE must be random or latest, got {other:?}"
                )))
            }
        };

        Ok(Config {
            vk,
            vk_api_url: lookup("VK_API_URL").unwrap_or_else(|| DEFAULT_VK_API_URL.into()),
            comic_url: lookup("XKCD_URL").unwrap_or_else(|| DEFAULT_COMIC_URL.into()),
            image_folder: lookup("IMAGE_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            verify_tls,
            timeout,
            mode,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
